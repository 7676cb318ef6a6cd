use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::RwLock;

use crate::{
    CatalogItem, Customer, EmailAddress, ErrorReport, LineItem, NewOrder, Order, OrderId,
    OrderStatus, PastOrder, Result, StoreError,
    store::{CatalogStore, CustomerStore, ErrorLog, OrderStore, validate_line_items},
};

/// In-memory store implementation for testing and embedding.
///
/// Provides the same interface as the PostgreSQL implementation. Every
/// mutation happens under a write lock, so conditional decrements are atomic.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    catalog: Arc<RwLock<HashMap<String, CatalogItem>>>,
    customers: Arc<RwLock<HashMap<EmailAddress, Customer>>>,
    /// Orders in insertion order.
    orders: Arc<RwLock<Vec<Order>>>,
    errors: Arc<RwLock<Vec<ErrorReport>>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with catalog items.
    pub async fn with_catalog(items: impl IntoIterator<Item = CatalogItem>) -> Self {
        let store = Self::new();
        {
            let mut catalog = store.catalog.write().await;
            for item in items {
                catalog.insert(item.name.clone(), item);
            }
        }
        store
    }

    /// Makes every subsequent call fail with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }

    /// Returns the total number of customers stored.
    pub async fn customer_count(&self) -> usize {
        self.customers.read().await.len()
    }

    /// Returns a copy of every catalog item.
    pub async fn catalog_snapshot(&self) -> HashMap<String, u32> {
        self.catalog
            .read()
            .await
            .values()
            .map(|item| (item.name.clone(), item.quantity_on_hand))
            .collect()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn catalog_names(&self) -> Result<Vec<String>> {
        self.check_available()?;
        let mut names: Vec<_> = self.catalog.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_item(&self, name: &str) -> Result<Option<CatalogItem>> {
        self.check_available()?;
        Ok(self.catalog.read().await.get(name).cloned())
    }

    async fn put_item(&self, item: CatalogItem) -> Result<()> {
        self.check_available()?;
        self.catalog.write().await.insert(item.name.clone(), item);
        Ok(())
    }

    async fn try_decrement(&self, name: &str, quantity: u32) -> Result<bool> {
        self.check_available()?;
        let mut catalog = self.catalog.write().await;
        match catalog.get_mut(name) {
            Some(item) if item.quantity_on_hand >= quantity => {
                item.quantity_on_hand -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restock(&self, name: &str, quantity: u32) -> Result<()> {
        self.check_available()?;
        let mut catalog = self.catalog.write().await;
        let item = catalog
            .entry(name.to_string())
            .or_insert_with(|| CatalogItem::new(name, 0));
        item.quantity_on_hand = item.quantity_on_hand.saturating_add(quantity);
        Ok(())
    }
}

#[async_trait]
impl CustomerStore for InMemoryStore {
    async fn find_customer(&self, email: &EmailAddress) -> Result<Option<Customer>> {
        self.check_available()?;
        Ok(self.customers.read().await.get(email).cloned())
    }

    async fn insert_customer_if_absent(&self, customer: Customer) -> Result<Customer> {
        self.check_available()?;
        let mut customers = self.customers.write().await;
        let stored = customers
            .entry(customer.email.clone())
            .or_insert(customer);
        Ok(stored.clone())
    }

    async fn append_past_order(&self, email: &EmailAddress, summary: PastOrder) -> Result<()> {
        self.check_available()?;
        let mut customers = self.customers.write().await;
        match customers.get_mut(email) {
            Some(customer) => {
                customer.past_orders.push(summary);
                Ok(())
            }
            None => Err(StoreError::InvalidRecord(format!(
                "no customer with email {email}"
            ))),
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order> {
        self.check_available()?;
        validate_line_items(&order.line_items)?;

        let order = order.into_order(OrderId::new());
        self.orders.write().await.push(order.clone());
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        self.check_available()?;
        Ok(self
            .orders
            .read()
            .await
            .iter()
            .find(|o| o.id == id)
            .cloned())
    }

    async fn orders_submitted_between(
        &self,
        email: &EmailAddress,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Order>> {
        self.check_available()?;
        let orders = self.orders.read().await;
        let mut matching: Vec<_> = orders
            .iter()
            .filter(|o| {
                &o.customer_email == email && o.submitted_at >= from && o.submitted_at <= to
            })
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(matching)
    }

    async fn latest_order_for(&self, email: &EmailAddress) -> Result<Option<Order>> {
        self.check_available()?;
        let orders = self.orders.read().await;
        // Later inserts win ties, matching `ORDER BY submitted_at DESC, seq DESC`.
        Ok(orders
            .iter()
            .enumerate()
            .filter(|(_, o)| &o.customer_email == email)
            .max_by_key(|(seq, o)| (o.submitted_at, *seq))
            .map(|(_, o)| o.clone()))
    }

    async fn set_tracking_link(&self, id: OrderId, link: &str) -> Result<()> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::OrderNotFound(id))?;
        order.tracking_link = link.to_string();
        Ok(())
    }

    async fn replace_line_items(
        &self,
        id: OrderId,
        expected: OrderStatus,
        items: &[LineItem],
    ) -> Result<bool> {
        self.check_available()?;
        validate_line_items(items)?;
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::OrderNotFound(id))?;
        if order.status != expected {
            return Ok(false);
        }
        order.line_items = items.to_vec();
        Ok(true)
    }

    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool> {
        self.check_available()?;
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(StoreError::OrderNotFound(id))?;
        if order.status != expected {
            return Ok(false);
        }
        order.status = next;
        Ok(true)
    }
}

#[async_trait]
impl ErrorLog for InMemoryStore {
    async fn record_error(&self, report: ErrorReport) -> Result<()> {
        self.check_available()?;
        self.errors.write().await.push(report);
        Ok(())
    }

    async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorReport>> {
        self.check_available()?;
        let errors = self.errors.read().await;
        Ok(errors.iter().rev().take(limit).cloned().collect())
    }
}

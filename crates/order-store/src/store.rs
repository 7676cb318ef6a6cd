use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::{
    CatalogItem, Customer, EmailAddress, ErrorReport, LineItem, NewOrder, Order, OrderId,
    OrderStatus, PastOrder, Result, StoreError,
};

/// Product names and stock levels.
///
/// Other writers (replenishment, manual edits) may change stock concurrently,
/// so decrements must be conditional at the store level.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Returns every canonical product name.
    async fn catalog_names(&self) -> Result<Vec<String>>;

    /// Retrieves a catalog item by canonical name.
    async fn get_item(&self, name: &str) -> Result<Option<CatalogItem>>;

    /// Inserts or replaces a catalog item.
    async fn put_item(&self, item: CatalogItem) -> Result<()>;

    /// Decrements stock by `quantity` only if at least `quantity` is on hand.
    ///
    /// The check and the decrement are a single atomic step. Returns false
    /// (and changes nothing) when stock is short or the product is unknown.
    async fn try_decrement(&self, name: &str, quantity: u32) -> Result<bool>;

    /// Adds `quantity` units back to a product's stock.
    async fn restock(&self, name: &str, quantity: u32) -> Result<()>;

    /// Returns the quantity on hand, or None for an unknown product.
    async fn stock_level(&self, name: &str) -> Result<Option<u32>> {
        Ok(self.get_item(name).await?.map(|item| item.quantity_on_hand))
    }
}

/// Customer identities keyed by email.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Looks up a customer by email.
    async fn find_customer(&self, email: &EmailAddress) -> Result<Option<Customer>>;

    /// Inserts the customer unless one with the same email already exists.
    ///
    /// Returns the stored customer, which is the pre-existing one when two
    /// first-time submissions race.
    async fn insert_customer_if_absent(&self, customer: Customer) -> Result<Customer>;

    /// Appends an order summary to a customer's history.
    async fn append_past_order(&self, email: &EmailAddress, summary: PastOrder) -> Result<()>;
}

/// Order records and their lifecycle status.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a new order and assigns its identifier.
    async fn insert_order(&self, order: NewOrder) -> Result<Order>;

    /// Retrieves an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Returns a customer's orders submitted within `[from, to]`, newest first.
    async fn orders_submitted_between(
        &self,
        email: &EmailAddress,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<Order>>;

    /// Returns the customer's most recently submitted order.
    async fn latest_order_for(&self, email: &EmailAddress) -> Result<Option<Order>>;

    /// Sets the order's tracking link.
    async fn set_tracking_link(&self, id: OrderId, link: &str) -> Result<()>;

    /// Replaces the order's line items, preserving the given order, if the
    /// order is still in `expected`.
    ///
    /// Returns false when the status moved on; `OrderNotFound` if the order
    /// doesn't exist.
    async fn replace_line_items(
        &self,
        id: OrderId,
        expected: OrderStatus,
        items: &[LineItem],
    ) -> Result<bool>;

    /// Moves the order from `expected` to `next`.
    ///
    /// Returns false if the order's current status is not `expected`.
    async fn update_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
    ) -> Result<bool>;
}

/// Operator-facing log of intake failures.
#[async_trait]
pub trait ErrorLog: Send + Sync {
    /// Records an error report.
    async fn record_error(&self, report: ErrorReport) -> Result<()>;

    /// Returns up to `limit` reports, newest first.
    async fn recent_errors(&self, limit: usize) -> Result<Vec<ErrorReport>>;
}

/// Everything the intake pipeline needs from its backing store.
pub trait IntakeStore: CatalogStore + CustomerStore + OrderStore + ErrorLog {}

impl<T: CatalogStore + CustomerStore + OrderStore + ErrorLog + ?Sized> IntakeStore for T {}

/// Validates line items before they are written to an order.
pub fn validate_line_items(items: &[LineItem]) -> std::result::Result<(), StoreError> {
    if items.is_empty() {
        return Err(StoreError::InvalidRecord(
            "order must have at least one line item".to_string(),
        ));
    }

    if let Some(line) = items.iter().find(|l| l.quantity == 0) {
        return Err(StoreError::InvalidRecord(format!(
            "line item '{}' has zero quantity",
            line.product
        )));
    }

    Ok(())
}

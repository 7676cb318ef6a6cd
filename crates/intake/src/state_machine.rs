//! Order lifecycle: creation, amendment and status transitions.

use std::sync::Arc;

use chrono::NaiveDateTime;
use common::{OrderId, OrderStatus};
use domain::{ContactDetails, RejectReason, merge_amendment, quantity_deltas};
use order_store::{IntakeStore, LineItem, NewOrder, Order, PastOrder};

use crate::{
    config::IntakeConfig,
    error::{IntakeError, Result},
    reservation::{Reservation, ReservationEngine},
};

/// Either the transition went through or the submitter must act.
pub type Decision<T> = std::result::Result<T, RejectReason>;

/// A fully resolved order waiting for its initial status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderDraft {
    pub customer: ContactDetails,
    pub submitted_at: NaiveDateTime,
    pub line_items: Vec<LineItem>,
}

/// Owns every write to an order after the pipeline has cleared it.
///
/// ```text
/// create ──► PendingInventory ──retry_reservation──► PendingFulfillment
///        └─────────────────────────────────────────► PendingFulfillment
///
/// PendingFulfillment ──advance──► PartiallyFulfilled ──advance──► Fulfilled
///        └──────────────────────advance────────────────────────► Fulfilled
/// ```
///
/// Amendments apply to `PendingFulfillment` and `PartiallyFulfilled` orders.
pub struct OrderStateMachine<S: ?Sized> {
    store: Arc<S>,
    reservations: ReservationEngine<S>,
    config: IntakeConfig,
}

impl<S: ?Sized> Clone for OrderStateMachine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            reservations: self.reservations.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: IntakeStore + ?Sized> OrderStateMachine<S> {
    pub fn new(store: Arc<S>, config: IntakeConfig) -> Self {
        Self {
            reservations: ReservationEngine::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    /// Reserves stock, persists the order, sets its tracking link and
    /// appends it to the customer's history.
    ///
    /// Short stock is not a failure: the order is stored as
    /// `PendingInventory` with nothing decremented.
    #[tracing::instrument(skip(self, draft), fields(customer = %draft.customer.email))]
    pub async fn create(&self, draft: OrderDraft) -> Result<Order> {
        let reserved = self.reservations.reserve(&draft.line_items).await?.is_reserved();
        let status = if reserved {
            OrderStatus::PendingFulfillment
        } else {
            OrderStatus::PendingInventory
        };

        let new_order = NewOrder {
            customer_name: draft.customer.name,
            customer_phone: draft.customer.phone,
            customer_email: draft.customer.email,
            submitted_at: draft.submitted_at,
            line_items: draft.line_items,
            status,
        };

        let mut order = match self.store.insert_order(new_order.clone()).await {
            Ok(order) => order,
            Err(e) => {
                if reserved {
                    self.release_quietly(&new_order.line_items).await;
                }
                return Err(e.into());
            }
        };

        let link = self.config.tracking_link(order.id);
        self.store.set_tracking_link(order.id, &link).await?;
        order.tracking_link = link;

        self.store
            .append_past_order(&order.customer_email, PastOrder::from(&order))
            .await?;

        tracing::info!(order_id = %order.id, status = %order.status, "Order created");
        Ok(order)
    }

    /// Merges `changes` into `order` and settles the stock difference.
    ///
    /// Extra units are reserved before the merged lines are written. The
    /// write only lands if the order is still in the status it was read in;
    /// otherwise the extra units are released and `Conflict` is returned.
    /// Units no longer wanted are restocked afterwards, but only for
    /// `PendingFulfillment` orders: part of a `PartiallyFulfilled` order may
    /// already have shipped, so its reductions are left for fulfillment to
    /// reconcile.
    #[tracing::instrument(skip(self, order, changes), fields(order_id = %order.id))]
    pub async fn amend(&self, mut order: Order, changes: &[LineItem]) -> Result<Decision<Order>> {
        if !order.status.can_amend() {
            return Err(IntakeError::InvalidTransition {
                order_id: order.id,
                from: order.status,
                to: order.status,
            });
        }

        let merged = merge_amendment(&order.line_items, changes);
        if merged.is_empty() {
            return Ok(Err(RejectReason::AmendmentEmptiesOrder(order.id)));
        }

        let deltas = quantity_deltas(&order.line_items, &merged);
        let increases: Vec<LineItem> = deltas
            .iter()
            .filter(|d| d.is_increase())
            .map(|d| LineItem::new(d.product.clone(), d.units()))
            .collect();
        let decreases: Vec<LineItem> = deltas
            .iter()
            .filter(|d| !d.is_increase())
            .map(|d| LineItem::new(d.product.clone(), d.units()))
            .collect();

        let holds_stock = order.status.holds_reservation();
        if holds_stock && !increases.is_empty() {
            if let Reservation::Insufficient { short } =
                self.reservations.reserve(&increases).await?
            {
                return Ok(Err(RejectReason::AmendmentExceedsStock(short)));
            }
        }

        let written = self
            .store
            .replace_line_items(order.id, order.status, &merged)
            .await;
        match written {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(status = %order.status, "Order status changed during amendment");
                if holds_stock {
                    self.release_quietly(&increases).await;
                }
                return Err(IntakeError::Conflict(order.id));
            }
            Err(e) => {
                if holds_stock {
                    self.release_quietly(&increases).await;
                }
                return Err(e.into());
            }
        }

        if !decreases.is_empty() {
            if order.status == OrderStatus::PendingFulfillment {
                self.release_quietly(&decreases).await;
            } else {
                tracing::info!(status = %order.status, "Reductions not restocked");
            }
        }

        order.line_items = merged;
        tracing::info!(deltas = deltas.len(), "Order amended");
        Ok(Ok(order))
    }

    /// Moves a reserved order forward in fulfillment.
    ///
    /// `PendingInventory` orders only leave that state through
    /// [`retry_reservation`](Self::retry_reservation).
    #[tracing::instrument(skip(self))]
    pub async fn advance(&self, order_id: OrderId, to: OrderStatus) -> Result<Order> {
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(IntakeError::OrderNotFound(order_id))?;

        let from = order.status;
        if !from.holds_reservation() || !from.can_transition_to(to) {
            return Err(IntakeError::InvalidTransition { order_id, from, to });
        }

        if !self.store.update_status(order_id, from, to).await? {
            return Err(IntakeError::Conflict(order_id));
        }

        order.status = to;
        tracing::info!(%from, %to, "Order advanced");
        Ok(order)
    }

    /// Tries again to reserve stock for a `PendingInventory` order.
    ///
    /// Returns the order unchanged if stock is still short.
    #[tracing::instrument(skip(self))]
    pub async fn retry_reservation(&self, order_id: OrderId) -> Result<Order> {
        let mut order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(IntakeError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::PendingInventory {
            return Err(IntakeError::InvalidTransition {
                order_id,
                from: order.status,
                to: OrderStatus::PendingFulfillment,
            });
        }

        if !self.reservations.reserve(&order.line_items).await?.is_reserved() {
            tracing::info!("Stock still short");
            return Ok(order);
        }

        let moved = self
            .store
            .update_status(
                order_id,
                OrderStatus::PendingInventory,
                OrderStatus::PendingFulfillment,
            )
            .await;

        match moved {
            Ok(true) => {
                order.status = OrderStatus::PendingFulfillment;
                tracing::info!("Reservation succeeded on retry");
                Ok(order)
            }
            Ok(false) => {
                self.release_quietly(&order.line_items).await;
                Err(IntakeError::Conflict(order_id))
            }
            Err(e) => {
                self.release_quietly(&order.line_items).await;
                Err(e.into())
            }
        }
    }

    async fn release_quietly(&self, lines: &[LineItem]) {
        if let Err(e) = self.reservations.release(lines).await {
            tracing::error!(error = %e, "Failed to restock after aborted write");
        }
    }
}

#[cfg(test)]
mod tests {
    use common::EmailAddress;
    use order_store::{CatalogItem, CatalogStore, Customer, CustomerStore, InMemoryStore, OrderStore};

    use super::*;

    fn email() -> EmailAddress {
        EmailAddress::parse("ada@x.com").unwrap()
    }

    fn draft(lines: Vec<LineItem>) -> OrderDraft {
        OrderDraft {
            customer: ContactDetails {
                name: "Ada".into(),
                email: email(),
                phone: "555".into(),
                address: "1 Loop".into(),
            },
            submitted_at: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            line_items: lines,
        }
    }

    async fn setup(items: Vec<CatalogItem>) -> (Arc<InMemoryStore>, OrderStateMachine<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::with_catalog(items).await);
        store
            .insert_customer_if_absent(Customer::new(email(), "Ada", "555", "1 Loop"))
            .await
            .unwrap();
        let machine = OrderStateMachine::new(store.clone(), IntakeConfig::default());
        (store, machine)
    }

    #[tokio::test]
    async fn test_create_reserves_and_records_history() {
        let (store, machine) = setup(vec![CatalogItem::new("A", 5)]).await;

        let order = machine.create(draft(vec![LineItem::new("A", 2)])).await.unwrap();

        assert_eq!(order.status, OrderStatus::PendingFulfillment);
        assert_eq!(
            order.tracking_link,
            format!("http://localhost:3000/track-order/{}", order.id)
        );
        assert_eq!(store.catalog_snapshot().await["A"], 3);

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.tracking_link, order.tracking_link);

        let customer = store.find_customer(&email()).await.unwrap().unwrap();
        assert_eq!(customer.past_orders.len(), 1);
        assert_eq!(customer.past_orders[0].order_id, order.id);
    }

    #[tokio::test]
    async fn test_create_short_stock_is_pending_inventory() {
        let (store, machine) = setup(vec![CatalogItem::new("MacBook Pro", 1)]).await;

        let order = machine
            .create(draft(vec![LineItem::new("MacBook Pro", 2)]))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::PendingInventory);
        assert_eq!(store.catalog_snapshot().await["MacBook Pro"], 1);
    }

    #[tokio::test]
    async fn test_amend_settles_stock_difference() {
        let (store, machine) = setup(vec![
            CatalogItem::new("A", 10),
            CatalogItem::new("B", 10),
            CatalogItem::new("C", 10),
        ])
        .await;
        let order = machine
            .create(draft(vec![LineItem::new("A", 2), LineItem::new("B", 1)]))
            .await
            .unwrap();

        let amended = machine
            .amend(order, &[LineItem::new("B", 0), LineItem::new("C", 3)])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            amended.line_items,
            vec![LineItem::new("A", 2), LineItem::new("C", 3)]
        );
        let stock = store.catalog_snapshot().await;
        assert_eq!(stock["A"], 8);
        assert_eq!(stock["B"], 10);
        assert_eq!(stock["C"], 7);
    }

    #[tokio::test]
    async fn test_amend_exceeding_stock_changes_nothing() {
        let (store, machine) = setup(vec![CatalogItem::new("A", 3)]).await;
        let order = machine.create(draft(vec![LineItem::new("A", 2)])).await.unwrap();
        let order_id = order.id;

        let decision = machine
            .amend(order, &[LineItem::new("A", 5)])
            .await
            .unwrap();

        assert!(matches!(decision, Err(RejectReason::AmendmentExceedsStock(_))));
        assert_eq!(store.catalog_snapshot().await["A"], 1);
        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.line_items, vec![LineItem::new("A", 2)]);
    }

    #[tokio::test]
    async fn test_amend_after_status_change_is_conflict() {
        let (store, machine) = setup(vec![CatalogItem::new("A", 10)]).await;
        let stale = machine.create(draft(vec![LineItem::new("A", 2)])).await.unwrap();
        machine
            .advance(stale.id, OrderStatus::Fulfilled)
            .await
            .unwrap();

        let order_id = stale.id;
        let result = machine.amend(stale, &[LineItem::new("A", 5)]).await;

        assert!(matches!(result, Err(IntakeError::Conflict(id)) if id == order_id));
        assert_eq!(store.catalog_snapshot().await["A"], 8);
        let stored = store.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.line_items, vec![LineItem::new("A", 2)]);
        assert_eq!(stored.status, OrderStatus::Fulfilled);
    }

    #[tokio::test]
    async fn test_amend_partially_fulfilled_keeps_reduced_units() {
        let (store, machine) =
            setup(vec![CatalogItem::new("A", 10), CatalogItem::new("B", 10)]).await;
        let order = machine.create(draft(vec![LineItem::new("A", 4)])).await.unwrap();
        let order = machine
            .advance(order.id, OrderStatus::PartiallyFulfilled)
            .await
            .unwrap();

        let amended = machine
            .amend(order, &[LineItem::new("A", 1), LineItem::new("B", 2)])
            .await
            .unwrap()
            .unwrap();

        assert_eq!(
            amended.line_items,
            vec![LineItem::new("A", 1), LineItem::new("B", 2)]
        );
        let stock = store.catalog_snapshot().await;
        assert_eq!(stock["A"], 6);
        assert_eq!(stock["B"], 8);
    }

    #[tokio::test]
    async fn test_amend_cannot_empty_order() {
        let (_store, machine) = setup(vec![CatalogItem::new("A", 3)]).await;
        let order = machine.create(draft(vec![LineItem::new("A", 1)])).await.unwrap();
        let order_id = order.id;

        let decision = machine.amend(order, &[LineItem::new("A", 0)]).await.unwrap();
        assert_eq!(decision, Err(RejectReason::AmendmentEmptiesOrder(order_id)));
    }

    #[tokio::test]
    async fn test_advance_follows_transitions() {
        let (_store, machine) = setup(vec![CatalogItem::new("A", 3)]).await;
        let order = machine.create(draft(vec![LineItem::new("A", 1)])).await.unwrap();

        let partial = machine
            .advance(order.id, OrderStatus::PartiallyFulfilled)
            .await
            .unwrap();
        assert_eq!(partial.status, OrderStatus::PartiallyFulfilled);

        let back = machine
            .advance(order.id, OrderStatus::PendingFulfillment)
            .await;
        assert!(matches!(back, Err(IntakeError::InvalidTransition { .. })));

        let done = machine.advance(order.id, OrderStatus::Fulfilled).await.unwrap();
        assert!(done.status.is_terminal());

        let missing = machine.advance(OrderId::new(), OrderStatus::Fulfilled).await;
        assert!(matches!(missing, Err(IntakeError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn test_advance_cannot_skip_reservation() {
        let (_store, machine) = setup(vec![CatalogItem::new("A", 0)]).await;
        let order = machine.create(draft(vec![LineItem::new("A", 1)])).await.unwrap();
        assert_eq!(order.status, OrderStatus::PendingInventory);

        let result = machine
            .advance(order.id, OrderStatus::PendingFulfillment)
            .await;
        assert!(matches!(result, Err(IntakeError::InvalidTransition { .. })));
    }

    #[tokio::test]
    async fn test_retry_reservation_after_restock() {
        let (store, machine) = setup(vec![CatalogItem::new("A", 1)]).await;
        let order = machine.create(draft(vec![LineItem::new("A", 2)])).await.unwrap();

        let still_short = machine.retry_reservation(order.id).await.unwrap();
        assert_eq!(still_short.status, OrderStatus::PendingInventory);

        store.restock("A", 4).await.unwrap();
        let reserved = machine.retry_reservation(order.id).await.unwrap();
        assert_eq!(reserved.status, OrderStatus::PendingFulfillment);
        assert_eq!(store.catalog_snapshot().await["A"], 3);

        let again = machine.retry_reservation(order.id).await;
        assert!(matches!(again, Err(IntakeError::InvalidTransition { .. })));
    }
}

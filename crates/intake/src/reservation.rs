//! Inventory reservation with all-or-nothing semantics.

use std::sync::Arc;

use domain::totals_by_product;
use order_store::{CatalogStore, LineItem};

use crate::error::Result;

/// Result of a reservation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// Every line's stock was decremented.
    Reserved,

    /// Stock is short; nothing was decremented.
    Insufficient { short: Vec<String> },
}

impl Reservation {
    pub fn is_reserved(&self) -> bool {
        matches!(self, Reservation::Reserved)
    }
}

/// Decides whether stock covers a set of lines and decrements it if so.
///
/// Decrements go through [`CatalogStore::try_decrement`], which checks and
/// decrements in one step, so concurrent reservations cannot oversell. If
/// a decrement loses a race after the initial stock read, the lines already
/// taken are restocked in reverse order.
///
/// Between such a decrement and its rollback the taken units are invisible
/// to other reservations. A concurrent order can therefore see stock as
/// short and land in `PendingInventory` even though the units come back a
/// moment later; [`OrderStateMachine::retry_reservation`] picks it up from
/// there.
///
/// [`OrderStateMachine::retry_reservation`]: crate::OrderStateMachine::retry_reservation
pub struct ReservationEngine<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for ReservationEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: CatalogStore + ?Sized> ReservationEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Reserves stock for every line, or for none of them.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn reserve(&self, lines: &[LineItem]) -> Result<Reservation> {
        let wanted = totals_by_product(lines);

        let mut short = Vec::new();
        for line in &wanted {
            let available = self.store.stock_level(&line.product).await?.unwrap_or(0);
            if available < line.quantity {
                short.push(format!(
                    "{} (requested {}, available {})",
                    line.product, line.quantity, available
                ));
            }
        }

        if !short.is_empty() {
            tracing::info!(?short, "Insufficient stock");
            metrics::counter!("inventory_reservations_total", "result" => "insufficient")
                .increment(1);
            return Ok(Reservation::Insufficient { short });
        }

        let mut taken: Vec<&LineItem> = Vec::with_capacity(wanted.len());
        for line in &wanted {
            if self.store.try_decrement(&line.product, line.quantity).await? {
                taken.push(line);
                continue;
            }

            tracing::warn!(product = %line.product, "Stock changed during reservation");
            self.compensate(&taken).await?;
            metrics::counter!("inventory_reservations_total", "result" => "lost_race")
                .increment(1);
            return Ok(Reservation::Insufficient {
                short: vec![format!(
                    "{} (requested {}, no longer available)",
                    line.product, line.quantity
                )],
            });
        }

        metrics::counter!("inventory_reservations_total", "result" => "reserved").increment(1);
        Ok(Reservation::Reserved)
    }

    /// Returns previously reserved stock.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn release(&self, lines: &[LineItem]) -> Result<()> {
        let wanted = totals_by_product(lines);
        let refs: Vec<&LineItem> = wanted.iter().collect();
        self.compensate(&refs).await
    }

    /// Restocks every line even if some restocks fail, then reports the
    /// first failure.
    async fn compensate(&self, taken: &[&LineItem]) -> Result<()> {
        let mut first_error = None;
        for line in taken.iter().rev() {
            match self.store.restock(&line.product, line.quantity).await {
                Ok(()) => {
                    metrics::counter!("inventory_compensations_total", "result" => "restocked")
                        .increment(1);
                }
                Err(e) => {
                    tracing::error!(
                        product = %line.product,
                        quantity = line.quantity,
                        error = %e,
                        "Restock failed"
                    );
                    metrics::counter!("inventory_compensations_total", "result" => "failed")
                        .increment(1);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

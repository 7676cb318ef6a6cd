//! Windowed detection of repeated submissions.

use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use common::{EmailAddress, OrderId};
use order_store::{LineItem, OrderStore};

use crate::error::{RejectReason, Result};

/// Whether a submission repeats an existing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupDecision {
    Unique,
    Duplicate {
        order_id: OrderId,
        submitted_at: NaiveDateTime,
    },
}

impl DedupDecision {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DedupDecision::Duplicate { .. })
    }

    /// Converts a duplicate into its rejection.
    pub fn into_result(self) -> std::result::Result<(), RejectReason> {
        match self {
            DedupDecision::Unique => Ok(()),
            DedupDecision::Duplicate {
                order_id,
                submitted_at,
            } => Err(RejectReason::DuplicateSubmission {
                order_id,
                submitted_at,
            }),
        }
    }
}

/// Compares two line lists as multisets of `(product, quantity)`.
pub fn same_line_multiset(a: &[LineItem], b: &[LineItem]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut left: Vec<(&str, u32)> = a.iter().map(|l| (l.product.as_str(), l.quantity)).collect();
    let mut right: Vec<(&str, u32)> = b.iter().map(|l| (l.product.as_str(), l.quantity)).collect();
    left.sort_unstable();
    right.sort_unstable();
    left == right
}

/// Decides whether a submission repeats a recent order from the same sender.
///
/// A match needs the same customer email, the same line multiset and a
/// submission time within `window` of the existing order. Timestamps are
/// compared as one combined value, so windows crossing midnight work.
pub struct DeduplicationGuard<S: ?Sized> {
    store: Arc<S>,
    window: Duration,
}

impl<S: ?Sized> Clone for DeduplicationGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            window: self.window,
        }
    }
}

impl<S: OrderStore + ?Sized> DeduplicationGuard<S> {
    pub fn new(store: Arc<S>, window: Duration) -> Self {
        Self {
            store,
            window: window.abs(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Looks for a committed order matching this submission.
    #[tracing::instrument(skip(self, lines), fields(customer = %email))]
    pub async fn check(
        &self,
        email: &EmailAddress,
        lines: &[LineItem],
        submitted_at: NaiveDateTime,
    ) -> Result<DedupDecision> {
        let from = submitted_at
            .checked_sub_signed(self.window)
            .unwrap_or(NaiveDateTime::MIN);
        let to = submitted_at
            .checked_add_signed(self.window)
            .unwrap_or(NaiveDateTime::MAX);

        let candidates = self
            .store
            .orders_submitted_between(email, from, to)
            .await?;

        let decision = candidates
            .iter()
            .find(|order| same_line_multiset(&order.line_items, lines))
            .map_or(DedupDecision::Unique, |order| DedupDecision::Duplicate {
                order_id: order.id,
                submitted_at: order.submitted_at,
            });

        if let DedupDecision::Duplicate { order_id, .. } = decision {
            tracing::info!(%order_id, "Submission matches a recent order");
        }

        Ok(decision)
    }
}

//! Intake error types.
//!
//! Only failures an operator has to look at end up here. Anything the
//! submitter can fix is reported as a rejected `OrderOutcome` instead.

use common::{OrderId, OrderStatus};
use domain::ErrorKind;
use order_store::StoreError;
use thiserror::Error;

/// Errors that abort processing of a submission.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// A store call failed.
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),

    /// The submission document is not a usable JSON object.
    #[error("Malformed submission payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The requested status change is not a legal transition.
    #[error("Invalid transition for order {order_id}: {from} -> {to}")]
    InvalidTransition {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    /// The order's status changed between read and write.
    #[error("Order {0} was modified concurrently")]
    Conflict(OrderId),

    /// A notification could not be delivered.
    #[error("Notification failed: {0}")]
    Notification(String),
}

impl IntakeError {
    /// Classification used on error reports.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::StoreUnavailable
    }
}

/// Convenience type alias for intake results.
pub type Result<T> = std::result::Result<T, IntakeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_transition() {
        let order_id = OrderId::new();
        let err = IntakeError::InvalidTransition {
            order_id,
            from: OrderStatus::Fulfilled,
            to: OrderStatus::PendingFulfillment,
        };
        assert_eq!(
            err.to_string(),
            format!("Invalid transition for order {order_id}: Fulfilled -> PendingFulfillment")
        );
    }

    #[test]
    fn test_store_error_converts() {
        let err: IntakeError = StoreError::Unavailable("down".into()).into();
        assert!(matches!(err, IntakeError::Store(_)));
        assert_eq!(err.kind(), ErrorKind::StoreUnavailable);
    }
}

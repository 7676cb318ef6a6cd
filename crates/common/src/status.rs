//! Order lifecycle states.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown order status: {0}")]
pub struct UnknownStatus(pub String);

/// The status of an order in its lifecycle.
///
/// State transitions:
/// ```text
/// PendingInventory ──► PendingFulfillment ──► PartiallyFulfilled ──► Fulfilled
///                              │                                       ▲
///                              └───────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Stock did not cover the order when it was created; nothing is reserved.
    PendingInventory,

    /// Stock is reserved and the order awaits fulfillment.
    PendingFulfillment,

    /// Some of the order has been fulfilled.
    PartiallyFulfilled,

    /// Entire order fulfilled (terminal state).
    Fulfilled,
}

impl OrderStatus {
    /// Returns true if an amendment may be merged into an order in this state.
    pub fn can_amend(&self) -> bool {
        matches!(
            self,
            OrderStatus::PendingFulfillment | OrderStatus::PartiallyFulfilled
        )
    }

    /// Returns true if stock has been reserved for orders in this state.
    pub fn holds_reservation(&self) -> bool {
        !matches!(self, OrderStatus::PendingInventory)
    }

    /// Returns true if `next` is a legal successor of this state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::PendingInventory, OrderStatus::PendingFulfillment)
                | (
                    OrderStatus::PendingFulfillment,
                    OrderStatus::PartiallyFulfilled
                )
                | (OrderStatus::PendingFulfillment, OrderStatus::Fulfilled)
                | (OrderStatus::PartiallyFulfilled, OrderStatus::Fulfilled)
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Fulfilled)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingInventory => "PendingInventory",
            OrderStatus::PendingFulfillment => "PendingFulfillment",
            OrderStatus::PartiallyFulfilled => "PartiallyFulfilled",
            OrderStatus::Fulfilled => "Fulfilled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PendingInventory" => Ok(OrderStatus::PendingInventory),
            "PendingFulfillment" => Ok(OrderStatus::PendingFulfillment),
            "PartiallyFulfilled" => Ok(OrderStatus::PartiallyFulfilled),
            "Fulfilled" => Ok(OrderStatus::Fulfilled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

//! Domain error types.

use chrono::NaiveDateTime;
use common::OrderId;
use order_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A customer detail that a submission must supply for a new customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerField {
    Name,
    Email,
    Phone,
    Address,
}

impl CustomerField {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerField::Name => "name",
            CustomerField::Email => "email",
            CustomerField::Phone => "phone",
            CustomerField::Address => "address",
        }
    }
}

impl std::fmt::Display for CustomerField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a submission was turned away.
///
/// Every variant is something the submitter can act on. None of them leave
/// a store mutation behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    /// The submission has no line items.
    #[error("no order details found")]
    EmptyOrder,

    /// One or more lines lack a product name or a usable quantity.
    #[error("invalid line items: {}", .0.join("; "))]
    InvalidLineItem(Vec<String>),

    /// The same order was already received within the dedup window.
    #[error("duplicate of order {order_id} submitted at {submitted_at}")]
    DuplicateSubmission {
        order_id: OrderId,
        submitted_at: NaiveDateTime,
    },

    /// Some products could not be mapped onto the catalog.
    #[error("unknown products: {}", .0.join(", "))]
    UnknownProducts(Vec<String>),

    /// A new customer is missing required contact details.
    #[error("missing customer fields: {}", join_fields(.0))]
    MissingCustomerFields(Vec<CustomerField>),

    /// Submission date or time is missing or malformed.
    #[error("invalid submission timestamp: {0}")]
    InvalidTimestamp(String),

    /// The amendment would leave the order with no lines.
    #[error("amendment would remove every line item from order {0}")]
    AmendmentEmptiesOrder(OrderId),

    /// Stock does not cover the extra quantity an amendment asks for.
    #[error("insufficient stock for amendment: {}", .0.join(", "))]
    AmendmentExceedsStock(Vec<String>),
}

fn join_fields(fields: &[CustomerField]) -> String {
    fields
        .iter()
        .map(CustomerField::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl RejectReason {
    /// Returns the fieldless classification of this rejection.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RejectReason::EmptyOrder => ErrorKind::EmptyOrder,
            RejectReason::InvalidLineItem(_) => ErrorKind::InvalidLineItem,
            RejectReason::DuplicateSubmission { .. } => ErrorKind::DuplicateSubmission,
            RejectReason::UnknownProducts(_) => ErrorKind::UnknownProducts,
            RejectReason::MissingCustomerFields(_) => ErrorKind::MissingCustomerFields,
            RejectReason::InvalidTimestamp(_) => ErrorKind::InvalidTimestamp,
            RejectReason::AmendmentEmptiesOrder(_) => ErrorKind::AmendmentEmptiesOrder,
            RejectReason::AmendmentExceedsStock(_) => ErrorKind::AmendmentExceedsStock,
        }
    }

    /// Human-readable messages for the submitter, one per problem.
    pub fn messages(&self) -> Vec<String> {
        match self {
            RejectReason::InvalidLineItem(problems) => problems.clone(),
            RejectReason::UnknownProducts(names) => names
                .iter()
                .map(|name| format!("unknown product: {name}"))
                .collect(),
            RejectReason::MissingCustomerFields(fields) => fields
                .iter()
                .map(|field| format!("missing customer {field}"))
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

/// Fieldless error classification carried on outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    EmptyOrder,
    InvalidLineItem,
    DuplicateSubmission,
    UnknownProducts,
    MissingCustomerFields,
    InvalidTimestamp,
    AmendmentEmptiesOrder,
    AmendmentExceedsStock,
    StoreUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmptyOrder => "EmptyOrder",
            ErrorKind::InvalidLineItem => "InvalidLineItem",
            ErrorKind::DuplicateSubmission => "DuplicateSubmission",
            ErrorKind::UnknownProducts => "UnknownProducts",
            ErrorKind::MissingCustomerFields => "MissingCustomerFields",
            ErrorKind::InvalidTimestamp => "InvalidTimestamp",
            ErrorKind::AmendmentEmptiesOrder => "AmendmentEmptiesOrder",
            ErrorKind::AmendmentExceedsStock => "AmendmentExceedsStock",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
        }
    }

    /// Returns true if the submitter, rather than an operator, must act.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ErrorKind::StoreUnavailable)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A store call failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The submission was rejected.
    #[error("Rejected: {0}")]
    Rejected(#[from] RejectReason),
}

/// Result type for domain operations.
pub type Result<T> = std::result::Result<T, DomainError>;

//! Persisted record shapes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EmailAddress, OrderId, OrderStatus};

/// One line of an order, expressed in catalog terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItem {
    /// Canonical catalog name of the product.
    pub product: String,

    /// Quantity ordered (always greater than zero on a persisted order).
    pub quantity: u32,
}

impl LineItem {
    /// Creates a new line item.
    pub fn new(product: impl Into<String>, quantity: u32) -> Self {
        Self {
            product: product.into(),
            quantity,
        }
    }
}

/// An order awaiting its store-assigned identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: EmailAddress,
    pub submitted_at: NaiveDateTime,
    pub line_items: Vec<LineItem>,
    pub status: OrderStatus,
}

impl NewOrder {
    /// Attaches the assigned identifier. The tracking link starts empty.
    pub fn into_order(self, id: OrderId) -> Order {
        Order {
            id,
            customer_name: self.customer_name,
            customer_phone: self.customer_phone,
            customer_email: self.customer_email,
            submitted_at: self.submitted_at,
            line_items: self.line_items,
            status: self.status,
            tracking_link: String::new(),
        }
    }
}

/// A customer submission resolved into catalog terms.
///
/// The customer fields are a snapshot taken at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: EmailAddress,
    pub submitted_at: NaiveDateTime,
    pub line_items: Vec<LineItem>,
    pub status: OrderStatus,
    pub tracking_link: String,
}

impl Order {
    /// Submission date in `YYYY-MM-DD` form.
    pub fn submitted_date(&self) -> String {
        self.submitted_at.format("%Y-%m-%d").to_string()
    }

    /// Submission time in `HH:MM:SS` form.
    pub fn submitted_time(&self) -> String {
        self.submitted_at.format("%H:%M:%S").to_string()
    }

    /// Total units across all lines.
    pub fn total_quantity(&self) -> u64 {
        self.line_items.iter().map(|l| u64::from(l.quantity)).sum()
    }
}

/// Summary of an order kept in a customer's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastOrder {
    pub order_id: OrderId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub line_items: Vec<LineItem>,
    pub status: OrderStatus,
}

impl From<&Order> for PastOrder {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            date: order.submitted_at.date(),
            time: order.submitted_at.time(),
            line_items: order.line_items.clone(),
            status: order.status,
        }
    }
}

/// A contact identity with its order history.
///
/// `email` is the natural key and never changes once the customer exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub email: EmailAddress,
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub past_orders: Vec<PastOrder>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Creates a customer with an empty order history.
    pub fn new(
        email: EmailAddress,
        name: impl Into<String>,
        phone: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            email,
            name: name.into(),
            phone: phone.into(),
            address: address.into(),
            past_orders: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// A sellable product and its stock level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Canonical product name (natural key).
    pub name: String,

    /// Units available to reserve. Never negative.
    pub quantity_on_hand: u32,
}

impl CatalogItem {
    /// Creates a new catalog item.
    pub fn new(name: impl Into<String>, quantity_on_hand: u32) -> Self {
        Self {
            name: name.into(),
            quantity_on_hand,
        }
    }
}

/// Who an error report concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorSource {
    /// The submitter needs to act (resend, complete details, confirm).
    Customer,
    /// Infrastructure failed; the submission was dropped.
    System,
}

impl ErrorSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSource::Customer => "Customer",
            ErrorSource::System => "System",
        }
    }
}

/// How urgently an error report needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Low => "Low",
            ErrorSeverity::Medium => "Medium",
            ErrorSeverity::High => "High",
            ErrorSeverity::Critical => "Critical",
        }
    }
}

/// A recorded intake failure, kept for operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub email: Option<String>,
    pub message: String,
    pub order_id: Option<OrderId>,
    pub source: ErrorSource,
    pub severity: ErrorSeverity,
    pub recorded_at: DateTime<Utc>,
}

impl ErrorReport {
    /// Creates a report stamped with the current time.
    pub fn new(
        email: Option<String>,
        message: impl Into<String>,
        source: ErrorSource,
        severity: ErrorSeverity,
    ) -> Self {
        Self {
            email,
            message: message.into(),
            order_id: None,
            source,
            severity,
            recorded_at: Utc::now(),
        }
    }

    /// Associates the report with an order.
    pub fn with_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }
}

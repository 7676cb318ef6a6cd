//! Pipeline outcomes handed to downstream collaborators.

use chrono::NaiveDateTime;
use common::{OrderId, OrderStatus};
use domain::{ErrorKind, RejectReason};
use order_store::Order;
use serde::{Deserialize, Serialize};

use crate::notify::{Notification, NotificationKind};

/// How a submission ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutcomeKind {
    Created,
    Amended,
    Duplicate,
    Rejected,
}

impl OutcomeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Created => "created",
            OutcomeKind::Amended => "amended",
            OutcomeKind::Duplicate => "duplicate",
            OutcomeKind::Rejected => "rejected",
        }
    }
}

/// Who to tell and what to say.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyDirective {
    pub to: String,
    pub reason: String,
}

/// Result of processing one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOutcome {
    pub kind: OutcomeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<OrderStatus>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracking_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<NotifyDirective>,
}

impl OrderOutcome {
    /// A newly persisted order.
    pub fn created(order: &Order) -> Self {
        let reason = match order.status {
            OrderStatus::PendingInventory => {
                "Some items are out of stock. Please confirm whether to keep the order open or cancel it."
                    .to_string()
            }
            _ => format!(
                "Your order has been received. Track it at {}",
                order.tracking_link
            ),
        };

        Self {
            kind: OutcomeKind::Created,
            order_id: Some(order.id),
            status: Some(order.status),
            errors: Vec::new(),
            error_kind: None,
            tracking_link: Some(order.tracking_link.clone()),
            notify: Some(NotifyDirective {
                to: order.customer_email.to_string(),
                reason,
            }),
        }
    }

    /// An existing order with merged lines.
    pub fn amended(order: &Order) -> Self {
        Self {
            kind: OutcomeKind::Amended,
            order_id: Some(order.id),
            status: Some(order.status),
            errors: Vec::new(),
            error_kind: None,
            tracking_link: Some(order.tracking_link.clone()),
            notify: Some(NotifyDirective {
                to: order.customer_email.to_string(),
                reason: format!(
                    "Your order has been updated. Track it at {}",
                    order.tracking_link
                ),
            }),
        }
    }

    /// A repeat of `order_id`, submitted at `submitted_at`.
    pub fn duplicate(to: &str, order_id: OrderId, submitted_at: NaiveDateTime) -> Self {
        let reason = RejectReason::DuplicateSubmission {
            order_id,
            submitted_at,
        };
        Self {
            kind: OutcomeKind::Duplicate,
            order_id: Some(order_id),
            status: None,
            errors: reason.messages(),
            error_kind: Some(reason.kind()),
            tracking_link: None,
            notify: Some(NotifyDirective {
                to: to.to_string(),
                reason: format!(
                    "We already received this order at {submitted_at}. Reply to confirm if you meant to order again."
                ),
            }),
        }
    }

    /// A submission turned away. `to` is None when there is no one to tell.
    pub fn rejected(to: Option<&str>, reason: &RejectReason) -> Self {
        let errors = reason.messages();
        Self {
            kind: OutcomeKind::Rejected,
            order_id: None,
            status: None,
            notify: to.map(|to| NotifyDirective {
                to: to.to_string(),
                reason: errors.join("; "),
            }),
            errors,
            error_kind: Some(reason.kind()),
            tracking_link: None,
        }
    }

    /// Attaches the order a rejection concerns.
    pub fn for_order(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    /// The notification this outcome calls for.
    pub fn notification(&self) -> Option<Notification> {
        let directive = self.notify.as_ref()?;
        let kind = match (self.kind, self.status) {
            (OutcomeKind::Created, Some(OrderStatus::PendingInventory)) => {
                NotificationKind::NeedsInfo
            }
            (OutcomeKind::Created, _) => NotificationKind::Acknowledged,
            (OutcomeKind::Amended, _) => NotificationKind::Updated,
            (OutcomeKind::Duplicate | OutcomeKind::Rejected, _) => NotificationKind::NeedsInfo,
        };

        Some(Notification {
            to: directive.to.clone(),
            kind,
            reason: directive.reason.clone(),
            order_id: self.order_id,
        })
    }
}

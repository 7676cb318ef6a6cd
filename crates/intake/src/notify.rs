//! Notification dispatcher seam.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::Result;

/// What the submitter is being told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// The order was received and stock is reserved.
    Acknowledged,
    /// The submitter must act: resend, complete details, or confirm.
    NeedsInfo,
    /// An existing order was amended.
    Updated,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Acknowledged => "Acknowledged",
            NotificationKind::NeedsInfo => "NeedsInfo",
            NotificationKind::Updated => "Updated",
        }
    }
}

/// A lifecycle event addressed to a submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub to: String,
    pub kind: NotificationKind,
    pub reason: String,
    pub order_id: Option<OrderId>,
}

/// Forwards notifications to a messaging collaborator.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn dispatch(&self, notification: Notification) -> Result<()>;
}

/// Logs notifications instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        tracing::info!(
            to = %notification.to,
            kind = notification.kind.as_str(),
            order_id = ?notification.order_id,
            reason = %notification.reason,
            "Notification"
        );
        Ok(())
    }
}

/// Records notifications in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDispatcher {
    sent: Arc<RwLock<Vec<Notification>>>,
}

impl InMemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every notification dispatched so far, oldest first.
    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.read().await.clone()
    }

    /// Returns notifications addressed to `to`.
    pub async fn sent_to(&self, to: &str) -> Vec<Notification> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|n| n.to == to)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryDispatcher {
    async fn dispatch(&self, notification: Notification) -> Result<()> {
        self.sent.write().await.push(notification);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_dispatcher_records_in_order() {
        let dispatcher = InMemoryDispatcher::new();
        for (to, kind) in [
            ("a@x.com", NotificationKind::Acknowledged),
            ("b@x.com", NotificationKind::NeedsInfo),
            ("a@x.com", NotificationKind::Updated),
        ] {
            dispatcher
                .dispatch(Notification {
                    to: to.to_string(),
                    kind,
                    reason: "test".to_string(),
                    order_id: None,
                })
                .await
                .unwrap();
        }

        let sent = dispatcher.sent().await;
        assert_eq!(sent.len(), 3);
        let to_a = dispatcher.sent_to("a@x.com").await;
        assert_eq!(to_a.len(), 2);
        assert_eq!(to_a[1].kind, NotificationKind::Updated);
    }

    #[tokio::test]
    async fn test_tracing_dispatcher_never_fails() {
        let result = TracingDispatcher
            .dispatch(Notification {
                to: "a@x.com".to_string(),
                kind: NotificationKind::NeedsInfo,
                reason: "no order details found".to_string(),
                order_id: None,
            })
            .await;
        assert!(result.is_ok());
    }
}

//! Per-customer serialization.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use common::EmailAddress;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Keyed async locks, one per customer email.
///
/// Holding the guard makes dedup-check-then-persist, customer upsert and
/// amendment read-merge-write atomic for that customer within this process.
/// Entries no one holds or waits on are pruned on the next acquisition.
#[derive(Debug, Clone, Default)]
pub struct CustomerLocks {
    inner: Arc<Mutex<HashMap<EmailAddress, Arc<AsyncMutex<()>>>>>,
}

impl CustomerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `email`'s records.
    pub async fn lock(&self, email: &EmailAddress) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.retain(|key, slot| key == email || Arc::strong_count(slot) > 1);
            Arc::clone(map.entry(email.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of customers with a live lock entry.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn email(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_same_customer_is_serialized() {
        let locks = CustomerLocks::new();
        let guard = locks.lock(&email("a@x.com")).await;

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.lock(&email("a@x.com")).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        let second = tokio::time::timeout(Duration::from_secs(1), waiting)
            .await
            .unwrap()
            .unwrap();
        drop(second);
    }

    #[tokio::test]
    async fn test_different_customers_do_not_block() {
        let locks = CustomerLocks::new();
        let _a = locks.lock(&email("a@x.com")).await;
        let b = tokio::time::timeout(Duration::from_secs(1), locks.lock(&email("b@x.com"))).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = CustomerLocks::new();
        drop(locks.lock(&email("a@x.com")).await);
        drop(locks.lock(&email("b@x.com")).await);
        let _c = locks.lock(&email("c@x.com")).await;
        assert_eq!(locks.len(), 1);
    }
}

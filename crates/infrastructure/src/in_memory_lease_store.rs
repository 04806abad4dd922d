//! In-memory task lease store for tests and single-instance development.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use vantry_application::{LeaseStore, TaskLease};
use vantry_core::AppResult;

/// In-memory implementation of the task lease store.
///
/// The map lock serializes concurrent claims the same way the durable stores
/// do, so the store observes the same conditional-upsert semantics: a claim
/// only touches an absent or expired row.
#[derive(Default)]
pub struct InMemoryLeaseStore {
    rows: Mutex<HashMap<String, TaskLease>>,
}

impl InMemoryLeaseStore {
    /// Creates an empty lease store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn try_claim(&self, lease: &TaskLease) -> AppResult<()> {
        let mut rows = self.rows.lock().await;
        match rows.get(lease.task_name.as_str()) {
            Some(existing) if existing.expires_at > Utc::now() => {}
            _ => {
                rows.insert(lease.task_name.clone(), lease.clone());
            }
        }

        Ok(())
    }

    async fn find(&self, task_name: &str) -> AppResult<Option<TaskLease>> {
        Ok(self.rows.lock().await.get(task_name).cloned())
    }

    async fn delete_if_holder(&self, task_name: &str, holder_id: &str) -> AppResult<bool> {
        let mut rows = self.rows.lock().await;
        let matches = rows
            .get(task_name)
            .is_some_and(|row| row.holder_id == holder_id);
        if matches {
            rows.remove(task_name);
        }

        Ok(matches)
    }

    async fn extend_if_holder(
        &self,
        task_name: &str,
        holder_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut rows = self.rows.lock().await;
        match rows.get_mut(task_name) {
            Some(row) if row.holder_id == holder_id && row.expires_at > Utc::now() => {
                row.expires_at = expires_at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        let now = Utc::now();
        rows.retain(|_, row| row.expires_at > now);

        Ok(u64::try_from(before - rows.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use vantry_application::{LeaseStore, TaskLease};

    use super::InMemoryLeaseStore;

    fn lease(task_name: &str, holder_id: &str, ttl: Duration) -> TaskLease {
        let now = Utc::now();
        TaskLease {
            task_name: task_name.to_owned(),
            holder_id: holder_id.to_owned(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    #[tokio::test]
    async fn claim_inserts_when_absent() {
        let store = InMemoryLeaseStore::new();
        let claim = lease("expiry_alert", "instance-a", Duration::minutes(30));

        assert!(store.try_claim(&claim).await.is_ok());
        let stored = store.find("expiry_alert").await;
        assert_eq!(
            stored.ok().flatten().map(|row| row.holder_id),
            Some("instance-a".to_owned())
        );
    }

    #[tokio::test]
    async fn claim_leaves_an_unexpired_row_untouched() {
        let store = InMemoryLeaseStore::new();
        let first = lease("expiry_alert", "instance-a", Duration::minutes(30));
        let second = lease("expiry_alert", "instance-b", Duration::minutes(30));

        assert!(store.try_claim(&first).await.is_ok());
        assert!(store.try_claim(&second).await.is_ok());

        let stored = store.find("expiry_alert").await;
        assert_eq!(
            stored.ok().flatten().map(|row| row.holder_id),
            Some("instance-a".to_owned())
        );
    }

    #[tokio::test]
    async fn claim_overwrites_an_expired_row() {
        let store = InMemoryLeaseStore::new();
        let first = lease("expiry_alert", "instance-a", Duration::milliseconds(-10));
        let second = lease("expiry_alert", "instance-b", Duration::minutes(30));

        assert!(store.try_claim(&first).await.is_ok());
        assert!(store.try_claim(&second).await.is_ok());

        let stored = store.find("expiry_alert").await;
        assert_eq!(
            stored.ok().flatten().map(|row| row.holder_id),
            Some("instance-b".to_owned())
        );
    }

    #[tokio::test]
    async fn delete_if_holder_guards_ownership() {
        let store = InMemoryLeaseStore::new();
        let claim = lease("expiry_alert", "instance-a", Duration::minutes(30));

        assert!(store.try_claim(&claim).await.is_ok());
        assert_eq!(
            store.delete_if_holder("expiry_alert", "instance-b").await.ok(),
            Some(false)
        );
        assert_eq!(
            store.delete_if_holder("expiry_alert", "instance-a").await.ok(),
            Some(true)
        );
    }

    #[tokio::test]
    async fn extend_if_holder_rejects_expired_rows() {
        let store = InMemoryLeaseStore::new();
        let claim = lease("expiry_alert", "instance-a", Duration::milliseconds(-10));

        assert!(store.try_claim(&claim).await.is_ok());
        let extended = store
            .extend_if_holder(
                "expiry_alert",
                "instance-a",
                Utc::now() + Duration::minutes(30),
            )
            .await;
        assert_eq!(extended.ok(), Some(false));
    }

    #[tokio::test]
    async fn delete_expired_counts_removed_rows() {
        let store = InMemoryLeaseStore::new();
        let expired = lease("stale_task", "instance-a", Duration::milliseconds(-10));
        let live = lease("live_task", "instance-b", Duration::minutes(30));

        assert!(store.try_claim(&expired).await.is_ok());
        assert!(store.try_claim(&live).await.is_ok());

        assert_eq!(store.delete_expired().await.ok(), Some(1));
        assert!(store.find("live_task").await.ok().flatten().is_some());
    }
}

use std::sync::Arc;

use chrono::{Duration, Utc};
use vantry_core::{AppError, AppResult, InstanceId};

use crate::scheduler_ports::{LeaseStatus, LeaseStore, TaskLease};

/// Distributed mutual exclusion over named recurring tasks.
///
/// Every instance runs its own local triggers; only the instance holding the
/// task's lease executes the side effect for a given fire window. The service
/// owns the write-then-verify acquisition protocol; the store contributes the
/// single atomic conditional upsert it is built on.
pub struct LeaseService {
    store: Arc<dyn LeaseStore>,
    instance_id: InstanceId,
}

impl LeaseService {
    /// Creates a lease service bound to one process instance identity.
    #[must_use]
    pub fn new(store: Arc<dyn LeaseStore>, instance_id: InstanceId) -> Self {
        Self { store, instance_id }
    }

    /// Returns the identity this service acquires leases under.
    #[must_use]
    pub fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Attempts to take ownership of `task_name` for `ttl` starting now.
    ///
    /// True iff, after the conditional claim, the stored holder is this
    /// instance with an unexpired expiry. Callers must treat an `Err` the
    /// same as `Ok(false)`: when lease state cannot be determined, the safe
    /// assumption is that the window belongs to someone else.
    pub async fn acquire(&self, task_name: &str, ttl: Duration) -> AppResult<bool> {
        validate_task_name(task_name)?;
        validate_ttl(ttl)?;

        let now = Utc::now();
        let lease = TaskLease {
            task_name: task_name.to_owned(),
            holder_id: self.instance_id.as_str().to_owned(),
            acquired_at: now,
            expires_at: now + ttl,
        };

        self.store.try_claim(&lease).await?;

        // The claim touches the row only when it was absent or expired, so a
        // verification read identifies the actual winner.
        let stored = self.store.find(task_name).await?;
        Ok(stored.is_some_and(|row| {
            row.holder_id == self.instance_id.as_str() && row.expires_at > Utc::now()
        }))
    }

    /// Releases the lease when this instance still holds it.
    ///
    /// False when the row was already reclaimed by another instance after
    /// expiry, or was never held; neither case is an error.
    pub async fn release(&self, task_name: &str) -> AppResult<bool> {
        validate_task_name(task_name)?;

        self.store
            .delete_if_holder(task_name, self.instance_id.as_str())
            .await
    }

    /// Extends the expiry by `ttl` from now when this instance still holds an
    /// unexpired lease; false once ownership was lost.
    pub async fn renew(&self, task_name: &str, ttl: Duration) -> AppResult<bool> {
        validate_task_name(task_name)?;
        validate_ttl(ttl)?;

        self.store
            .extend_if_holder(task_name, self.instance_id.as_str(), Utc::now() + ttl)
            .await
    }

    /// Returns a read-only snapshot of the task's lease state; never mutates.
    pub async fn status(&self, task_name: &str) -> AppResult<LeaseStatus> {
        validate_task_name(task_name)?;

        let Some(row) = self.store.find(task_name).await? else {
            return Ok(LeaseStatus {
                held: false,
                holder_id: None,
                acquired_at: None,
                expires_at: None,
                is_mine: false,
            });
        };

        let held = row.expires_at > Utc::now();
        Ok(LeaseStatus {
            held,
            is_mine: held && row.holder_id == self.instance_id.as_str(),
            holder_id: Some(row.holder_id),
            acquired_at: Some(row.acquired_at),
            expires_at: Some(row.expires_at),
        })
    }

    /// Deletes every expired lease row; safe to run before any acquire since
    /// expired rows are already invalid to hold.
    pub async fn collect_expired(&self) -> AppResult<u64> {
        self.store.delete_expired().await
    }
}

fn validate_task_name(task_name: &str) -> AppResult<()> {
    if task_name.trim().is_empty() {
        return Err(AppError::Validation(
            "lease task_name must not be empty".to_owned(),
        ));
    }

    Ok(())
}

fn validate_ttl(ttl: Duration) -> AppResult<()> {
    if ttl <= Duration::zero() {
        return Err(AppError::Validation(
            "lease ttl must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

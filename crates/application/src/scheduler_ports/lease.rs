use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vantry_core::AppResult;

/// Durable record of exclusive ownership of one named recurring task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskLease {
    /// Task name; the unique key of the lease.
    pub task_name: String,
    /// Identity of the process instance that holds the lease.
    pub holder_id: String,
    /// When the current holder acquired the lease.
    pub acquired_at: DateTime<Utc>,
    /// When the lease stops being held and becomes claimable by anyone.
    pub expires_at: DateTime<Utc>,
}

/// Read-only snapshot of one task's lease state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseStatus {
    /// Whether an unexpired lease row exists.
    pub held: bool,
    /// Holder identity of the stored row, when one exists.
    pub holder_id: Option<String>,
    /// Acquisition time of the stored row, when one exists.
    pub acquired_at: Option<DateTime<Utc>>,
    /// Expiry time of the stored row, when one exists.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether the unexpired lease belongs to the inspecting instance.
    pub is_mine: bool,
}

/// Storage port for task leases.
///
/// Implementations must serialize concurrent `try_claim` calls for the same
/// task name (row-level locking or an equivalent single-writer guarantee);
/// the manager's write-then-verify acquisition is only correct under that
/// assumption.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Claims the lease in one atomic conditional upsert: insert when absent,
    /// overwrite holder and expiry when the stored row is expired, leave an
    /// unexpired row untouched. Callers determine the winner with a
    /// subsequent [`LeaseStore::find`].
    async fn try_claim(&self, lease: &TaskLease) -> AppResult<()>;

    /// Returns the stored lease row for one task name.
    async fn find(&self, task_name: &str) -> AppResult<Option<TaskLease>>;

    /// Deletes the row only when `holder_id` holds it; returns whether a row
    /// was deleted.
    async fn delete_if_holder(&self, task_name: &str, holder_id: &str) -> AppResult<bool>;

    /// Moves the expiry only when `holder_id` holds an unexpired row; returns
    /// false once ownership changed or expired.
    async fn extend_if_holder(
        &self,
        task_name: &str,
        holder_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool>;

    /// Deletes every expired row regardless of holder; returns the count.
    async fn delete_expired(&self) -> AppResult<u64>;
}

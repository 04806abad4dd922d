use async_trait::async_trait;
use vantry_core::AppResult;
use vantry_domain::ReminderPolicy;

/// Read access to the externally owned reminder policy store.
#[async_trait]
pub trait ReminderPolicyProvider: Send + Sync {
    /// Returns the current policy for one task name, when one exists.
    async fn find_policy(&self, task_name: &str) -> AppResult<Option<ReminderPolicy>>;
}

use async_trait::async_trait;
use vantry_core::AppResult;

/// Result of one external side-effect invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    /// Whether the side effect succeeded.
    pub success: bool,
    /// Optional human-readable detail for the execution log.
    pub detail: Option<String>,
}

/// The externally owned side effect fired for a task; opaque to the core.
#[async_trait]
pub trait ReminderAction: Send + Sync {
    /// Runs the side effect for one task name.
    async fn run(&self, task_name: &str) -> AppResult<ActionOutcome>;
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vantry_core::{AppError, AppResult};

/// Terminal status of one recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// The side effect reported success.
    Succeeded,
    /// The side effect failed or errored.
    Failed,
}

impl ExecutionStatus {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            _ => Err(AppError::Validation(format!(
                "unknown execution status '{value}'"
            ))),
        }
    }
}

/// One appended run record; written once per run, never read back by the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
    /// Task the run belonged to.
    pub task_name: String,
    /// Task category recorded for the audit trail.
    pub task_type: String,
    /// Fire moment of the run.
    pub ran_at: DateTime<Utc>,
    /// Terminal run status.
    pub status: ExecutionStatus,
    /// Optional detail from the side effect or its error.
    pub detail: Option<String>,
}

/// Append-only audit sink for runs; failures here are logged and non-fatal.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    /// Appends one run record.
    async fn record(&self, record: ExecutionRecord) -> AppResult<()>;
}

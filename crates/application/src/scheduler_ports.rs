//! Ports consumed by the scheduler core.

mod action;
mod execution_log;
mod lease;
mod policy;

pub use action::{ActionOutcome, ReminderAction};
pub use execution_log::{ExecutionLog, ExecutionRecord, ExecutionStatus};
pub use lease::{LeaseStatus, LeaseStore, TaskLease};
pub use policy::ReminderPolicyProvider;

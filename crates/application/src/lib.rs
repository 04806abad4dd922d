//! Application services and ports.

#![forbid(unsafe_code)]

mod lease_service;
mod reminder_executor;
mod reminder_scheduler;
mod scheduler_ports;

pub use lease_service::LeaseService;
pub use reminder_executor::{ExecutorConfig, FireOutcome, ReminderExecutor};
pub use reminder_scheduler::{CompiledTrigger, ReminderScheduler, ScheduleOutcome};
pub use scheduler_ports::{
    ActionOutcome, ExecutionLog, ExecutionRecord, ExecutionStatus, LeaseStatus, LeaseStore,
    ReminderAction, ReminderPolicyProvider, TaskLease,
};

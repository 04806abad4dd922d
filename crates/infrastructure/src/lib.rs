//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod alert_mailer;
mod console_alert_mailer;
mod expiry_alert_action;
mod in_memory_lease_store;
mod postgres_execution_log;
mod postgres_lease_store;
mod postgres_reminder_policy_provider;
mod redis_lease_store;
mod smtp_alert_mailer;

pub use alert_mailer::AlertMailer;
pub use console_alert_mailer::ConsoleAlertMailer;
pub use expiry_alert_action::{ExpiryAlertAction, ExpiryAlertConfig};
pub use in_memory_lease_store::InMemoryLeaseStore;
pub use postgres_execution_log::PostgresExecutionLog;
pub use postgres_lease_store::PostgresLeaseStore;
pub use postgres_reminder_policy_provider::PostgresReminderPolicyProvider;
pub use redis_lease_store::RedisLeaseStore;
pub use smtp_alert_mailer::{SmtpAlertMailer, SmtpMailerConfig};

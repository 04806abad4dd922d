use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use tokio::sync::Mutex;

use vantry_core::{AppError, AppResult, InstanceId};
use vantry_domain::ReminderPolicy;

use crate::lease_service::LeaseService;
use crate::reminder_executor::{ExecutorConfig, ReminderExecutor};
use crate::scheduler_ports::{
    ActionOutcome, ExecutionLog, ExecutionRecord, LeaseStore, ReminderAction,
    ReminderPolicyProvider, TaskLease,
};

use super::{ReminderScheduler, ScheduleOutcome};

const TASK: &str = "inventory_expiry_alert";

#[derive(Default)]
struct FakeLeaseStore {
    rows: Mutex<HashMap<String, TaskLease>>,
}

#[async_trait]
impl LeaseStore for FakeLeaseStore {
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

#[derive(Default)]
struct FakePolicyProvider {
    policy: Mutex<Option<ReminderPolicy>>,
}

impl FakePolicyProvider {
    async fn set_policy(&self, policy: Option<ReminderPolicy>) {
        *self.policy.lock().await = policy;
    }
}

#[async_trait]
impl ReminderPolicyProvider for FakePolicyProvider {
    async fn find_policy(&self, _task_name: &str) -> AppResult<Option<ReminderPolicy>> {
        Ok(self.policy.lock().await.clone())
    }
}

struct NoopAction;

#[async_trait]
impl ReminderAction for NoopAction {
    async fn run(&self, _task_name: &str) -> AppResult<ActionOutcome> {
        Ok(ActionOutcome {
            success: true,
            detail: None,
        })
    }
}

struct NoopExecutionLog;

#[async_trait]
impl ExecutionLog for NoopExecutionLog {
    async fn record(&self, _record: ExecutionRecord) -> AppResult<()> {
        Ok(())
    }
}

fn daily_policy(hour: u32) -> ReminderPolicy {
    ReminderPolicy {
        frequency: "daily".to_owned(),
        hour: Some(hour),
        minute: Some(0),
        weekday: None,
        day_of_month: None,
    }
}

fn build_scheduler(provider: &Arc<FakePolicyProvider>) -> ReminderScheduler {
    let leases = Arc::new(LeaseService::new(
        Arc::new(FakeLeaseStore::default()) as Arc<dyn LeaseStore>,
        InstanceId::from_token("instance-a"),
    ));
    let zone = match FixedOffset::east_opt(0) {
        Some(zone) => zone,
        None => panic!("zero offset must be representable"),
    };
    let executor = Arc::new(ReminderExecutor::new(
        leases,
        Arc::clone(provider) as Arc<dyn ReminderPolicyProvider>,
        Arc::new(NoopAction),
        Arc::new(NoopExecutionLog),
        ExecutorConfig {
            lease_ttl: Duration::minutes(30),
            renew_interval: Duration::minutes(10),
            fire_tolerance: Duration::minutes(5),
            zone,
        },
    ));

    ReminderScheduler::new(
        Arc::clone(provider) as Arc<dyn ReminderPolicyProvider>,
        executor,
    )
}

#[tokio::test]
async fn start_without_policy_reports_invalid_policy() {
    let provider = Arc::new(FakePolicyProvider::default());
    let scheduler = build_scheduler(&provider);

    let outcome = scheduler.start(TASK).await;
    assert!(matches!(outcome, Ok(ScheduleOutcome::InvalidPolicy(_))));
    assert!(!scheduler.is_scheduled(TASK).await);
}

#[tokio::test]
async fn start_with_invalid_policy_leaves_task_stopped() {
    let provider = Arc::new(FakePolicyProvider::default());
    provider
        .set_policy(Some(ReminderPolicy {
            frequency: "daily".to_owned(),
            hour: Some(25),
            minute: Some(0),
            weekday: None,
            day_of_month: None,
        }))
        .await;
    let scheduler = build_scheduler(&provider);

    let outcome = scheduler.start(TASK).await;
    assert!(matches!(outcome, Ok(ScheduleOutcome::InvalidPolicy(_))));
    assert!(!scheduler.is_scheduled(TASK).await);
}

#[tokio::test]
async fn start_registers_a_future_fire() {
    let provider = Arc::new(FakePolicyProvider::default());
    provider.set_policy(Some(daily_policy(12))).await;
    let scheduler = build_scheduler(&provider);

    let before = Utc::now();
    let outcome = scheduler.start(TASK).await;
    match outcome {
        Ok(ScheduleOutcome::Scheduled { next_fire }) => assert!(next_fire > before),
        other => panic!("expected a scheduled outcome, got {other:?}"),
    }
    assert!(scheduler.is_scheduled(TASK).await);

    scheduler.shutdown().await;
}

#[tokio::test]
async fn starting_a_scheduled_task_conflicts() {
    let provider = Arc::new(FakePolicyProvider::default());
    provider.set_policy(Some(daily_policy(12))).await;
    let scheduler = build_scheduler(&provider);

    assert!(scheduler.start(TASK).await.is_ok());
    let second = scheduler.start(TASK).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    scheduler.shutdown().await;
}

#[tokio::test]
async fn stop_is_idempotent() {
    let provider = Arc::new(FakePolicyProvider::default());
    provider.set_policy(Some(daily_policy(12))).await;
    let scheduler = build_scheduler(&provider);

    assert!(scheduler.start(TASK).await.is_ok());
    assert_eq!(scheduler.stop(TASK).await.ok(), Some(true));
    assert_eq!(scheduler.stop(TASK).await.ok(), Some(false));
    assert!(!scheduler.is_scheduled(TASK).await);
}

#[tokio::test]
async fn restart_rebuilds_the_trigger_from_the_latest_policy() {
    let provider = Arc::new(FakePolicyProvider::default());
    provider.set_policy(Some(daily_policy(6))).await;
    let scheduler = build_scheduler(&provider);

    assert!(scheduler.start(TASK).await.is_ok());
    let initial = scheduler.compiled_trigger(TASK).await;
    assert_eq!(
        initial.as_ref().map(|trigger| trigger.policy.hour),
        Some(Some(6))
    );

    provider.set_policy(Some(daily_policy(7))).await;
    assert!(scheduler.restart(TASK).await.is_ok());
    let rebuilt = scheduler.compiled_trigger(TASK).await;
    assert_eq!(
        rebuilt.as_ref().map(|trigger| trigger.policy.hour),
        Some(Some(7))
    );

    scheduler.shutdown().await;
}

#[tokio::test]
async fn shutdown_stops_every_task() {
    let provider = Arc::new(FakePolicyProvider::default());
    provider.set_policy(Some(daily_policy(12))).await;
    let scheduler = build_scheduler(&provider);

    assert!(scheduler.start("expiry_alert_medicines").await.is_ok());
    assert!(scheduler.start("expiry_alert_supplies").await.is_ok());

    scheduler.shutdown().await;
    assert!(scheduler.scheduled_task_names().await.is_empty());
}

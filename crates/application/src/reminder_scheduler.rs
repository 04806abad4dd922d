use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use vantry_core::{AppError, AppResult};
use vantry_domain::{ReminderPolicy, ReminderSchedule};

use crate::reminder_executor::{FireOutcome, ReminderExecutor};
use crate::scheduler_ports::ReminderPolicyProvider;

/// In-memory recurring trigger owned by the scheduler entry that built it.
///
/// Carries the policy snapshot the schedule was compiled from; the snapshot
/// is never shared across instances and is rebuilt whenever the policy is
/// (re)loaded on this instance.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTrigger {
    /// Task the trigger fires for.
    pub task_name: String,
    /// Compiled fire specification.
    pub schedule: ReminderSchedule,
    /// Policy snapshot the specification was compiled from.
    pub policy: ReminderPolicy,
}

/// Result of registering one task.
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// A live trigger was registered.
    Scheduled {
        /// First upcoming fire time.
        next_fire: DateTime<Utc>,
    },
    /// The policy is missing or failed validation; the task stays stopped
    /// until the policy is corrected and the task restarted.
    InvalidPolicy(String),
}

struct ScheduledTask {
    trigger: CompiledTrigger,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

type TaskRegistry = Arc<Mutex<HashMap<String, ScheduledTask>>>;

/// Owner of this instance's recurring triggers, one per task name.
///
/// A task is either stopped or scheduled; `start`, `stop` and `restart` are
/// the only mutators. Other instances are never notified of policy edits;
/// the executor's re-validation step reconciles their stale triggers on
/// their next local fire.
pub struct ReminderScheduler {
    policies: Arc<dyn ReminderPolicyProvider>,
    executor: Arc<ReminderExecutor>,
    tasks: TaskRegistry,
}

impl ReminderScheduler {
    /// Creates a scheduler with an empty trigger registry.
    #[must_use]
    pub fn new(policies: Arc<dyn ReminderPolicyProvider>, executor: Arc<ReminderExecutor>) -> Self {
        Self {
            policies,
            executor,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetches the task's current policy, compiles it and registers a live
    /// recurring trigger.
    ///
    /// A missing or invalid policy leaves the task stopped and reports
    /// [`ScheduleOutcome::InvalidPolicy`]; that is an expected state before
    /// first configuration, not an error.
    pub async fn start(&self, task_name: &str) -> AppResult<ScheduleOutcome> {
        validate_task_name(task_name)?;

        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(task_name) {
            return Err(AppError::Conflict(format!(
                "task '{task_name}' is already scheduled"
            )));
        }

        let Some(policy) = self.policies.find_policy(task_name).await? else {
            return Ok(ScheduleOutcome::InvalidPolicy(format!(
                "no reminder policy exists for task '{task_name}'"
            )));
        };

        let zone = self.executor.config().zone;
        let schedule = match ReminderSchedule::compile(&policy, zone) {
            Ok(schedule) => schedule,
            Err(error) => return Ok(ScheduleOutcome::InvalidPolicy(error.to_string())),
        };
        let Some(next_fire) = schedule.next_fire_after(Utc::now()) else {
            return Ok(ScheduleOutcome::InvalidPolicy(format!(
                "policy for task '{task_name}' has no future fire time"
            )));
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_trigger_loop(
            task_name.to_owned(),
            schedule,
            Arc::clone(&self.executor),
            Arc::clone(&self.policies),
            zone,
            Arc::clone(&self.tasks),
            shutdown_rx,
        ));

        tasks.insert(
            task_name.to_owned(),
            ScheduledTask {
                trigger: CompiledTrigger {
                    task_name: task_name.to_owned(),
                    schedule,
                    policy,
                },
                shutdown: shutdown_tx,
                handle,
            },
        );

        info!(task_name, next_fire = %next_fire, "recurring trigger scheduled");
        Ok(ScheduleOutcome::Scheduled { next_fire })
    }

    /// Cancels the task's trigger; idempotent. A fire already in flight runs
    /// to completion (and releases its lease) before the trigger ends.
    pub async fn stop(&self, task_name: &str) -> AppResult<bool> {
        validate_task_name(task_name)?;

        let Some(task) = self.tasks.lock().await.remove(task_name) else {
            return Ok(false);
        };

        let _ = task.shutdown.send(true);
        let _ = task.handle.await;
        info!(task_name, "recurring trigger stopped");
        Ok(true)
    }

    /// Stops and re-starts the task so a policy edit made through this
    /// instance takes effect immediately.
    pub async fn restart(&self, task_name: &str) -> AppResult<ScheduleOutcome> {
        self.stop(task_name).await?;
        self.start(task_name).await
    }

    /// Stops every scheduled task.
    pub async fn shutdown(&self) {
        for task_name in self.scheduled_task_names().await {
            if let Err(error) = self.stop(&task_name).await {
                warn!(%task_name, error = %error, "failed to stop task during shutdown");
            }
        }

        info!("reminder scheduler shut down");
    }

    /// Returns whether a live trigger exists for the task.
    pub async fn is_scheduled(&self, task_name: &str) -> bool {
        self.tasks.lock().await.contains_key(task_name)
    }

    /// Returns the names of all tasks with live triggers.
    pub async fn scheduled_task_names(&self) -> Vec<String> {
        self.tasks.lock().await.keys().cloned().collect()
    }

    /// Returns the task's current trigger snapshot, when one is live.
    pub async fn compiled_trigger(&self, task_name: &str) -> Option<CompiledTrigger> {
        self.tasks
            .lock()
            .await
            .get(task_name)
            .map(|task| task.trigger.clone())
    }
}

fn validate_task_name(task_name: &str) -> AppResult<()> {
    if task_name.trim().is_empty() {
        return Err(AppError::Validation(
            "scheduler task_name must not be empty".to_owned(),
        ));
    }

    Ok(())
}

async fn run_trigger_loop(
    task_name: String,
    mut schedule: ReminderSchedule,
    executor: Arc<ReminderExecutor>,
    policies: Arc<dyn ReminderPolicyProvider>,
    zone: FixedOffset,
    tasks: TaskRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let now = Utc::now();
        let Some(next_fire) = schedule.next_fire_after(now) else {
            info!(%task_name, "schedule has no future fire time; stopping trigger");
            tasks.lock().await.remove(&task_name);
            return;
        };
        let wait = next_fire
            .signed_duration_since(now)
            .to_std()
            .unwrap_or_default();

        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            _ = shutdown.changed() => {
                return;
            }
        }

        // The fire runs to completion before the next sleep is computed, so
        // one task name never overlaps itself on this instance.
        match executor.execute_fire(&task_name).await {
            FireOutcome::Completed { action_succeeded } => {
                info!(%task_name, action_succeeded, "trigger fire completed");
            }
            FireOutcome::LeaseUnavailable | FireOutcome::StoreUnavailable => {}
            FireOutcome::PolicyGone => {
                info!(%task_name, "policy removed; stopping trigger");
                tasks.lock().await.remove(&task_name);
                return;
            }
            FireOutcome::ScheduleStale => {
                match rebuild_trigger(&task_name, policies.as_ref(), zone).await {
                    Ok(Some((policy, rebuilt))) => {
                        info!(%task_name, "trigger rebuilt from current policy");
                        schedule = rebuilt;
                        if let Some(entry) = tasks.lock().await.get_mut(&task_name) {
                            entry.trigger = CompiledTrigger {
                                task_name: task_name.clone(),
                                schedule: rebuilt,
                                policy,
                            };
                        }
                    }
                    Ok(None) => {
                        info!(
                            %task_name,
                            "current policy is missing or invalid; stopping trigger"
                        );
                        tasks.lock().await.remove(&task_name);
                        return;
                    }
                    Err(error) => {
                        warn!(%task_name, error = %error, "policy re-read failed; keeping current trigger");
                    }
                }
            }
        }
    }
}

async fn rebuild_trigger(
    task_name: &str,
    policies: &dyn ReminderPolicyProvider,
    zone: FixedOffset,
) -> AppResult<Option<(ReminderPolicy, ReminderSchedule)>> {
    let Some(policy) = policies.find_policy(task_name).await? else {
        return Ok(None);
    };

    match ReminderSchedule::compile(&policy, zone) {
        Ok(schedule) => Ok(Some((policy, schedule))),
        Err(error) => {
            info!(task_name, error = %error, "current policy does not compile");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests;

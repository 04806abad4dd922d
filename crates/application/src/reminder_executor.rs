use std::sync::Arc;

use chrono::{Duration, FixedOffset, Utc};
use tracing::{debug, info, warn};
use vantry_core::{AppError, AppResult};
use vantry_domain::ReminderSchedule;

use crate::lease_service::LeaseService;
use crate::scheduler_ports::{
    ActionOutcome, ExecutionLog, ExecutionRecord, ExecutionStatus, ReminderAction,
    ReminderPolicyProvider,
};

/// Tunables of the per-fire protocol.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// How long one fire owns the task before the lease self-expires.
    pub lease_ttl: Duration,
    /// How often the lease is re-extended while the action is running.
    pub renew_interval: Duration,
    /// How far behind a scheduled fire time "now" may lag and still count as
    /// a valid fire moment.
    pub fire_tolerance: Duration,
    /// Canonical zone every policy is evaluated in.
    pub zone: FixedOffset,
}

/// Outcome of one local trigger fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// The action ran under the lease; the flag carries its own result.
    Completed {
        /// Whether the side effect reported success.
        action_succeeded: bool,
    },
    /// Another instance owns the window, or lease state could not be
    /// determined; the fire is skipped.
    LeaseUnavailable,
    /// The freshly fetched policy does not fire now; the local trigger was
    /// compiled from a stale snapshot and needs a rebuild.
    ScheduleStale,
    /// No policy exists any more for the task.
    PolicyGone,
    /// The policy store could not be read; the fire is skipped and the local
    /// trigger kept as is.
    StoreUnavailable,
}

/// The per-fire protocol: acquire the lease, re-validate the policy against
/// the current store state, invoke the side effect, record the run, release.
///
/// Every instance's local trigger calls this independently; the lease decides
/// which instance actually runs, and the re-validation step catches triggers
/// built from policy snapshots that another instance has since edited.
pub struct ReminderExecutor {
    leases: Arc<LeaseService>,
    policies: Arc<dyn ReminderPolicyProvider>,
    action: Arc<dyn ReminderAction>,
    execution_log: Arc<dyn ExecutionLog>,
    config: ExecutorConfig,
}

impl ReminderExecutor {
    /// Creates an executor over the collaborator ports.
    #[must_use]
    pub fn new(
        leases: Arc<LeaseService>,
        policies: Arc<dyn ReminderPolicyProvider>,
        action: Arc<dyn ReminderAction>,
        execution_log: Arc<dyn ExecutionLog>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            leases,
            policies,
            action,
            execution_log,
            config,
        }
    }

    /// Returns the executor's configuration.
    #[must_use]
    pub fn config(&self) -> ExecutorConfig {
        self.config
    }

    /// Runs the full protocol for one local fire of `task_name`.
    ///
    /// Never errors: every failure category resolves to an outcome and a log
    /// line, and a lease that was acquired is released on every path.
    pub async fn execute_fire(&self, task_name: &str) -> FireOutcome {
        if let Err(error) = self.leases.collect_expired().await {
            debug!(task_name, error = %error, "expired lease sweep failed");
        }

        let acquired = match self.leases.acquire(task_name, self.config.lease_ttl).await {
            Ok(acquired) => acquired,
            Err(error) => {
                // Unknown lease state counts as not acquired: skipping a run
                // is recoverable, running twice is not.
                warn!(task_name, error = %error, "lease acquisition failed");
                false
            }
        };
        if !acquired {
            debug!(task_name, "another instance owns this fire window");
            return FireOutcome::LeaseUnavailable;
        }

        let outcome = self.run_under_lease(task_name).await;

        if let Err(error) = self.leases.release(task_name).await {
            warn!(task_name, error = %error, "lease release failed; ttl expiry will reclaim it");
        }

        outcome
    }

    async fn run_under_lease(&self, task_name: &str) -> FireOutcome {
        let policy = match self.policies.find_policy(task_name).await {
            Ok(Some(policy)) => policy,
            Ok(None) => {
                info!(task_name, "reminder policy no longer exists; skipping fire");
                return FireOutcome::PolicyGone;
            }
            Err(error) => {
                warn!(task_name, error = %error, "policy re-fetch failed; skipping fire");
                return FireOutcome::StoreUnavailable;
            }
        };

        // The trigger that woke us was compiled from a snapshot; only the
        // current policy decides whether "now" is still a valid fire moment.
        match ReminderSchedule::compile(&policy, self.config.zone) {
            Ok(schedule) => {
                if !schedule.fires_within(Utc::now(), self.config.fire_tolerance) {
                    info!(
                        task_name,
                        "current policy does not fire now; local trigger is stale"
                    );
                    return FireOutcome::ScheduleStale;
                }
            }
            Err(error) => {
                info!(task_name, error = %error, "current policy no longer compiles; local trigger is stale");
                return FireOutcome::ScheduleStale;
            }
        }

        let ran_at = Utc::now();
        let action_result = self.run_action_with_renewal(task_name).await;
        let (status, detail) = match action_result {
            Ok(outcome) if outcome.success => (ExecutionStatus::Succeeded, outcome.detail),
            Ok(outcome) => {
                warn!(
                    task_name,
                    detail = outcome.detail.as_deref().unwrap_or(""),
                    "reminder action reported failure"
                );
                (ExecutionStatus::Failed, outcome.detail)
            }
            Err(error) => {
                warn!(task_name, error = %error, "reminder action failed");
                (ExecutionStatus::Failed, Some(error.to_string()))
            }
        };

        // Best-effort audit write; a sink failure must not mask the action's
        // result.
        let record = ExecutionRecord {
            task_name: task_name.to_owned(),
            task_type: policy.frequency.trim().to_owned(),
            ran_at,
            status,
            detail,
        };
        if let Err(error) = self.execution_log.record(record).await {
            warn!(task_name, error = %error, "failed to append execution record");
        }

        FireOutcome::Completed {
            action_succeeded: status == ExecutionStatus::Succeeded,
        }
    }

    /// Runs the side effect on its own task so a panic cannot bypass the
    /// recording and release steps, and keeps the lease extended underneath
    /// actions that outlast the initial ttl.
    async fn run_action_with_renewal(&self, task_name: &str) -> AppResult<ActionOutcome> {
        let renewer = tokio::spawn({
            let leases = Arc::clone(&self.leases);
            let task_name = task_name.to_owned();
            let ttl = self.config.lease_ttl;
            let interval = self
                .config
                .renew_interval
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(600));

            async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    match leases.renew(&task_name, ttl).await {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!(%task_name, "lease ownership lost while the action was running");
                            break;
                        }
                        Err(error) => {
                            warn!(%task_name, error = %error, "lease renewal failed");
                        }
                    }
                }
            }
        });

        let action_task = tokio::spawn({
            let action = Arc::clone(&self.action);
            let task_name = task_name.to_owned();
            async move { action.run(&task_name).await }
        });

        let result = match action_task.await {
            Ok(result) => result,
            Err(join_error) => Err(AppError::Internal(format!(
                "reminder action aborted: {join_error}"
            ))),
        };

        renewer.abort();
        result
    }
}

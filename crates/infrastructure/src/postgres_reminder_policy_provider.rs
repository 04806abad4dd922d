//! PostgreSQL-backed reminder policy reads.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use vantry_application::ReminderPolicyProvider;
use vantry_core::{AppError, AppResult};
use vantry_domain::ReminderPolicy;

/// PostgreSQL read adapter over the externally owned policy table.
#[derive(Clone)]
pub struct PostgresReminderPolicyProvider {
    pool: PgPool,
}

impl PostgresReminderPolicyProvider {
    /// Creates a policy provider with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReminderPolicyRow {
    frequency: String,
    hour: Option<i32>,
    minute: Option<i32>,
    weekday: Option<i32>,
    day_of_month: Option<i32>,
}

#[async_trait]
impl ReminderPolicyProvider for PostgresReminderPolicyProvider {
    async fn find_policy(&self, task_name: &str) -> AppResult<Option<ReminderPolicy>> {
        let row = sqlx::query_as::<_, ReminderPolicyRow>(
            r#"
            SELECT frequency, hour, minute, weekday, day_of_month
            FROM reminder_policies
            WHERE task_name = $1
            "#,
        )
        .bind(task_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load reminder policy for task '{task_name}': {error}"
            ))
        })?;

        // Negative values are human-entered garbage; surfacing them as absent
        // makes compilation decline the policy the same way.
        Ok(row.map(|row| ReminderPolicy {
            frequency: row.frequency,
            hour: row.hour.and_then(|value| u32::try_from(value).ok()),
            minute: row.minute.and_then(|value| u32::try_from(value).ok()),
            weekday: row.weekday.and_then(|value| u32::try_from(value).ok()),
            day_of_month: row.day_of_month.and_then(|value| u32::try_from(value).ok()),
        }))
    }
}

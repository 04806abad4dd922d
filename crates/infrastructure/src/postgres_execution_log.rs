//! PostgreSQL-backed execution audit log.

use async_trait::async_trait;
use sqlx::PgPool;
use vantry_application::{ExecutionLog, ExecutionRecord};
use vantry_core::{AppError, AppResult};

/// PostgreSQL append-only sink for task execution records.
#[derive(Clone)]
pub struct PostgresExecutionLog {
    pool: PgPool,
}

impl PostgresExecutionLog {
    /// Creates an execution log with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExecutionLog for PostgresExecutionLog {
    async fn record(&self, record: ExecutionRecord) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_execution_log (task_name, task_type, ran_at, status, detail)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.task_name.as_str())
        .bind(record.task_type.as_str())
        .bind(record.ran_at)
        .bind(record.status.as_str())
        .bind(record.detail.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append execution record for task '{}': {error}",
                record.task_name
            ))
        })?;

        Ok(())
    }
}

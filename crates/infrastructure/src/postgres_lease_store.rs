//! PostgreSQL-backed task lease store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use vantry_application::{LeaseStore, TaskLease};
use vantry_core::{AppError, AppResult};

/// PostgreSQL implementation of the task lease store.
///
/// The claim is one conditional upsert: Postgres takes a row-level lock on
/// the conflicting row, so concurrent claims for the same task name
/// serialize, and a claim that observes an unexpired row leaves it
/// untouched. The manager's verification read then identifies the winner.
#[derive(Clone)]
pub struct PostgresLeaseStore {
    pool: PgPool,
}

impl PostgresLeaseStore {
    /// Creates a lease store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct TaskLeaseRow {
    task_name: String,
    holder_id: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

#[async_trait]
impl LeaseStore for PostgresLeaseStore {
    async fn try_claim(&self, lease: &TaskLease) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO task_leases (task_name, holder_id, acquired_at, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (task_name)
            DO UPDATE SET
                holder_id = EXCLUDED.holder_id,
                acquired_at = EXCLUDED.acquired_at,
                expires_at = EXCLUDED.expires_at
            WHERE task_leases.expires_at <= now()
            "#,
        )
        .bind(lease.task_name.as_str())
        .bind(lease.holder_id.as_str())
        .bind(lease.acquired_at)
        .bind(lease.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to claim lease for task '{}': {error}",
                lease.task_name
            ))
        })?;

        Ok(())
    }

    async fn find(&self, task_name: &str) -> AppResult<Option<TaskLease>> {
        let row = sqlx::query_as::<_, TaskLeaseRow>(
            r#"
            SELECT task_name, holder_id, acquired_at, expires_at
            FROM task_leases
            WHERE task_name = $1
            "#,
        )
        .bind(task_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load lease for task '{task_name}': {error}"
            ))
        })?;

        Ok(row.map(|row| TaskLease {
            task_name: row.task_name,
            holder_id: row.holder_id,
            acquired_at: row.acquired_at,
            expires_at: row.expires_at,
        }))
    }

    async fn delete_if_holder(&self, task_name: &str, holder_id: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM task_leases
            WHERE task_name = $1
              AND holder_id = $2
            "#,
        )
        .bind(task_name)
        .bind(holder_id)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to release lease for task '{task_name}' holder '{holder_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn extend_if_holder(
        &self,
        task_name: &str,
        holder_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE task_leases
            SET expires_at = $3
            WHERE task_name = $1
              AND holder_id = $2
              AND expires_at > now()
            "#,
        )
        .bind(task_name)
        .bind(holder_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to renew lease for task '{task_name}' holder '{holder_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM task_leases
            WHERE expires_at <= now()
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to sweep expired leases: {error}")))?;

        Ok(result.rows_affected())
    }
}

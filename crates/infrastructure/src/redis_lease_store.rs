//! Redis-backed task lease store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use redis::{AsyncCommands, Script};
use vantry_application::{LeaseStore, TaskLease};
use vantry_core::{AppError, AppResult};

const CLAIM_SCRIPT: &str = r#"
local expires = redis.call('HGET', KEYS[1], 'expires_at')
if expires == false or tonumber(expires) <= tonumber(ARGV[4]) then
  redis.call('HSET', KEYS[1], 'holder_id', ARGV[1], 'acquired_at', ARGV[2], 'expires_at', ARGV[3])
  return 1
end
return 0
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('HGET', KEYS[1], 'holder_id') == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

const EXTEND_SCRIPT: &str = r#"
local holder = redis.call('HGET', KEYS[1], 'holder_id')
local expires = redis.call('HGET', KEYS[1], 'expires_at')
if holder == ARGV[1] and expires ~= false and tonumber(expires) > tonumber(ARGV[3]) then
  redis.call('HSET', KEYS[1], 'expires_at', ARGV[2])
  return 1
end
return 0
"#;

const DELETE_EXPIRED_SCRIPT: &str = r#"
local expires = redis.call('HGET', KEYS[1], 'expires_at')
if expires ~= false and tonumber(expires) <= tonumber(ARGV[1]) then
  return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis implementation of the task lease store.
///
/// Each task lease lives in one hash keyed by task name. Every conditional
/// mutation runs as a Lua script; Redis executes scripts one at a time, which
/// provides the per-key serialization the claim protocol requires. Expiry
/// timestamps are stored as unix milliseconds and compared against the
/// caller's clock.
#[derive(Clone)]
pub struct RedisLeaseStore {
    client: redis::Client,
    key_prefix: String,
}

impl RedisLeaseStore {
    /// Creates a lease store over one Redis client.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, task_name: &str) -> String {
        format!("{}:{task_name}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn try_claim(&self, lease: &TaskLease) -> AppResult<()> {
        let mut connection = self.connection().await?;

        Script::new(CLAIM_SCRIPT)
            .key(self.key_for(lease.task_name.as_str()))
            .arg(lease.holder_id.as_str())
            .arg(lease.acquired_at.timestamp_millis())
            .arg(lease.expires_at.timestamp_millis())
            .arg(Utc::now().timestamp_millis())
            .invoke_async::<i32>(&mut connection)
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
        let mut connection = self.connection().await?;

        let mut fields: HashMap<String, String> = connection
            .hgetall(self.key_for(task_name))
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to load lease for task '{task_name}': {error}"
                ))
            })?;

        if fields.is_empty() {
            return Ok(None);
        }

        let holder_id = fields.remove("holder_id");
        let acquired_at = fields
            .get("acquired_at")
            .and_then(|value| parse_millis(value.as_str()));
        let expires_at = fields
            .get("expires_at")
            .and_then(|value| parse_millis(value.as_str()));

        let (Some(holder_id), Some(acquired_at), Some(expires_at)) =
            (holder_id, acquired_at, expires_at)
        else {
            return Err(AppError::Internal(format!(
                "lease hash for task '{task_name}' is missing fields"
            )));
        };

        Ok(Some(TaskLease {
            task_name: task_name.to_owned(),
            holder_id,
            acquired_at,
            expires_at,
        }))
    }

    async fn delete_if_holder(&self, task_name: &str, holder_id: &str) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let deleted = Script::new(RELEASE_SCRIPT)
            .key(self.key_for(task_name))
            .arg(holder_id)
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to release lease for task '{task_name}' holder '{holder_id}': {error}"
                ))
            })?;

        Ok(deleted > 0)
    }

    async fn extend_if_holder(
        &self,
        task_name: &str,
        holder_id: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut connection = self.connection().await?;

        let extended = Script::new(EXTEND_SCRIPT)
            .key(self.key_for(task_name))
            .arg(holder_id)
            .arg(expires_at.timestamp_millis())
            .arg(Utc::now().timestamp_millis())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to renew lease for task '{task_name}' holder '{holder_id}': {error}"
                ))
            })?;

        Ok(extended > 0)
    }

    async fn delete_expired(&self) -> AppResult<u64> {
        let mut connection = self.connection().await?;

        let pattern = format!("{}:*", self.key_prefix);
        let mut keys = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern.as_str())
                .arg("COUNT")
                .arg(100)
                .query_async(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to scan lease keys: {error}"))
                })?;

            keys.extend(batch);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        let now_millis = Utc::now().timestamp_millis();
        let mut deleted = 0u64;
        for key in keys {
            let removed = Script::new(DELETE_EXPIRED_SCRIPT)
                .key(key.as_str())
                .arg(now_millis)
                .invoke_async::<i32>(&mut connection)
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to sweep expired lease '{key}': {error}"))
                })?;
            deleted += u64::from(removed.unsigned_abs());
        }

        Ok(deleted)
    }
}

fn parse_millis(value: &str) -> Option<DateTime<Utc>> {
    let millis = value.parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}

//! Vantry reminder scheduler worker composition root.

#![forbid(unsafe_code)]

mod ops;
mod worker_config;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Duration;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vantry_application::{
    ExecutionLog, ExecutorConfig, LeaseService, LeaseStore, ReminderAction, ReminderExecutor,
    ReminderPolicyProvider, ReminderScheduler, ScheduleOutcome,
};
use vantry_core::{AppError, AppResult, InstanceId};
use vantry_infrastructure::{
    AlertMailer, ConsoleAlertMailer, ExpiryAlertAction, ExpiryAlertConfig, PostgresExecutionLog,
    PostgresLeaseStore, PostgresReminderPolicyProvider, RedisLeaseStore, SmtpAlertMailer,
    SmtpMailerConfig,
};

use crate::ops::OpsState;
use crate::worker_config::{MailerConfig, WorkerConfig};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    let instance_id = InstanceId::generate();
    info!(
        instance_id = %instance_id,
        tasks = ?config.task_names,
        lease_ttl_seconds = config.lease_ttl_seconds,
        fire_tolerance_seconds = config.fire_tolerance_seconds,
        "vantry-worker starting"
    );

    let lease_store = build_lease_store(&config, pool.clone())?;
    let leases = Arc::new(LeaseService::new(lease_store, instance_id));
    let policies: Arc<dyn ReminderPolicyProvider> =
        Arc::new(PostgresReminderPolicyProvider::new(pool.clone()));
    let execution_log: Arc<dyn ExecutionLog> = Arc::new(PostgresExecutionLog::new(pool.clone()));

    let mailer = build_mailer(&config);
    let action: Arc<dyn ReminderAction> = Arc::new(ExpiryAlertAction::new(
        pool,
        mailer,
        ExpiryAlertConfig {
            recipient: config.alert_recipient.clone(),
            horizon_days: config.expiry_horizon_days,
        },
    ));

    let executor = Arc::new(ReminderExecutor::new(
        Arc::clone(&leases),
        Arc::clone(&policies),
        action,
        execution_log,
        ExecutorConfig {
            lease_ttl: Duration::seconds(i64::from(config.lease_ttl_seconds)),
            renew_interval: Duration::seconds(i64::from(config.lease_renew_seconds)),
            fire_tolerance: Duration::seconds(i64::from(config.fire_tolerance_seconds)),
            zone: config.schedule_zone,
        },
    ));
    let scheduler = Arc::new(ReminderScheduler::new(policies, executor));

    for task_name in &config.task_names {
        match scheduler.start(task_name).await {
            Ok(ScheduleOutcome::Scheduled { next_fire }) => {
                info!(%task_name, next_fire = %next_fire, "task scheduled");
            }
            Ok(ScheduleOutcome::InvalidPolicy(reason)) => {
                info!(
                    %task_name,
                    %reason, "task left stopped until a valid policy is saved"
                );
            }
            Err(error) => {
                warn!(%task_name, error = %error, "failed to start task; it stays stopped");
            }
        }
    }

    let router = ops::build_router(OpsState {
        scheduler: Arc::clone(&scheduler),
        leases,
    });
    let address = SocketAddr::from_str(&format!("{}:{}", config.ops_host, config.ops_port))
        .map_err(|error| {
            AppError::Validation(format!(
                "invalid ops address '{}:{}': {error}",
                config.ops_host, config.ops_port
            ))
        })?;
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to bind ops listener on {address}: {error}"))
        })?;
    info!(%address, "ops endpoint listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|error| AppError::Internal(format!("ops server failed: {error}")))?;

    scheduler.shutdown().await;
    Ok(())
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

fn build_lease_store(config: &WorkerConfig, pool: PgPool) -> AppResult<Arc<dyn LeaseStore>> {
    match config.redis_url.as_deref() {
        None => Ok(Arc::new(PostgresLeaseStore::new(pool))),
        Some(redis_url) => {
            let client = redis::Client::open(redis_url).map_err(|error| {
                AppError::Validation(format!("invalid REDIS_URL value: {error}"))
            })?;
            Ok(Arc::new(RedisLeaseStore::new(client, "vantry:lease")))
        }
    }
}

fn build_mailer(config: &WorkerConfig) -> Arc<dyn AlertMailer> {
    match &config.mailer {
        MailerConfig::Console => Arc::new(ConsoleAlertMailer::new()),
        MailerConfig::Smtp(smtp) => Arc::new(SmtpAlertMailer::new(SmtpMailerConfig {
            host: smtp.host.clone(),
            port: smtp.port,
            username: smtp.username.clone(),
            password: smtp.password.clone(),
            from_address: smtp.from_address.clone(),
        })),
    }
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(error = %error, "failed to listen for shutdown signal");
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

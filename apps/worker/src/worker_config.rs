use std::env;

use chrono::FixedOffset;
use vantry_core::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub enum MailerConfig {
    Console,
    Smtp(SmtpSettings),
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub task_names: Vec<String>,
    pub lease_ttl_seconds: u32,
    pub lease_renew_seconds: u32,
    pub fire_tolerance_seconds: u32,
    pub schedule_zone: FixedOffset,
    pub ops_host: String,
    pub ops_port: u16,
    pub alert_recipient: String,
    pub expiry_horizon_days: u32,
    pub mailer: MailerConfig,
}

impl WorkerConfig {
    pub fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let task_names: Vec<String> = env::var("SCHEDULER_TASKS")
            .unwrap_or_else(|_| "inventory_expiry_alert".to_owned())
            .split(',')
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .collect();
        if task_names.is_empty() {
            return Err(AppError::Validation(
                "SCHEDULER_TASKS must name at least one task".to_owned(),
            ));
        }

        let lease_ttl_seconds = parse_env_u32("LEASE_TTL_SECONDS", 1800)?;
        let lease_renew_seconds = parse_env_u32("LEASE_RENEW_SECONDS", 600)?;
        let fire_tolerance_seconds = parse_env_u32("FIRE_TOLERANCE_SECONDS", 300)?;

        if lease_ttl_seconds == 0 {
            return Err(AppError::Validation(
                "LEASE_TTL_SECONDS must be greater than zero".to_owned(),
            ));
        }
        if lease_renew_seconds == 0 || lease_renew_seconds >= lease_ttl_seconds {
            return Err(AppError::Validation(
                "LEASE_RENEW_SECONDS must be greater than zero and less than LEASE_TTL_SECONDS"
                    .to_owned(),
            ));
        }
        if fire_tolerance_seconds == 0 {
            return Err(AppError::Validation(
                "FIRE_TOLERANCE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        let zone_offset_minutes = parse_env_i32("SCHEDULE_ZONE_OFFSET_MINUTES", 0)?;
        let schedule_zone = FixedOffset::east_opt(zone_offset_minutes.saturating_mul(60))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "invalid SCHEDULE_ZONE_OFFSET_MINUTES value '{zone_offset_minutes}'"
                ))
            })?;

        let ops_host = env::var("OPS_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let ops_port = parse_env_u16("OPS_PORT", 3002)?;

        let alert_recipient = required_env("ALERT_RECIPIENT")?;
        let expiry_horizon_days = parse_env_u32("EXPIRY_HORIZON_DAYS", 30)?;
        if expiry_horizon_days == 0 {
            return Err(AppError::Validation(
                "EXPIRY_HORIZON_DAYS must be greater than zero".to_owned(),
            ));
        }

        let mailer = match env::var("ALERT_MAILER")
            .unwrap_or_else(|_| "console".to_owned())
            .as_str()
        {
            "console" => MailerConfig::Console,
            "smtp" => {
                let port = required_env("SMTP_PORT")?
                    .parse::<u16>()
                    .map_err(|error| AppError::Validation(format!("invalid SMTP_PORT: {error}")))?;
                MailerConfig::Smtp(SmtpSettings {
                    host: required_env("SMTP_HOST")?,
                    port,
                    username: required_env("SMTP_USERNAME")?,
                    password: required_env("SMTP_PASSWORD")?,
                    from_address: required_env("SMTP_FROM_ADDRESS")?,
                })
            }
            other => {
                return Err(AppError::Validation(format!(
                    "ALERT_MAILER must be either 'console' or 'smtp', got '{other}'"
                )));
            }
        };

        Ok(Self {
            database_url,
            redis_url,
            task_names,
            lease_ttl_seconds,
            lease_renew_seconds,
            fire_tolerance_seconds,
            schedule_zone,
            ops_host,
            ops_port,
            alert_recipient,
            expiry_horizon_days,
            mailer,
        })
    }
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u16(name: &str, default: u16) -> AppResult<u16> {
    match env::var(name) {
        Ok(value) => value.parse::<u16>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_i32(name: &str, default: i32) -> AppResult<i32> {
    match env::var(name) {
        Ok(value) => value.parse::<i32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

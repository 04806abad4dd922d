use serde::{Deserialize, Serialize};
use vantry_core::{AppError, AppResult};

/// Recurrence frequency of a reminder policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderFrequency {
    /// Fires every day at the configured time.
    Daily,
    /// Fires once a week on the configured weekday.
    Weekly,
    /// Fires once a month on the configured day.
    Monthly,
}

impl ReminderFrequency {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Parses storage value.
    pub fn parse(value: &str) -> AppResult<Self> {
        match value {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            _ => Err(AppError::Validation(format!(
                "unknown reminder frequency '{value}'"
            ))),
        }
    }
}

/// Raw, human-entered reminder policy as the policy store holds it.
///
/// No invariants are enforced here; missing or out-of-range fields are
/// detected during schedule compilation, where they make compilation fail
/// rather than produce a trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderPolicy {
    /// Recurrence frequency storage value (`daily` / `weekly` / `monthly`).
    pub frequency: String,
    /// Hour of day (0-23).
    pub hour: Option<u32>,
    /// Minute of hour (0-59).
    pub minute: Option<u32>,
    /// Weekday (0 = Sunday .. 6 = Saturday); consulted only for weekly policies.
    pub weekday: Option<u32>,
    /// Day of month (1-31); consulted only for monthly policies.
    pub day_of_month: Option<u32>,
}

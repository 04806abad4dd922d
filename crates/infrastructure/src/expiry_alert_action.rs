//! The "check expiring inventory and email an alert" side effect.

use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{FromRow, PgPool};
use vantry_application::{ActionOutcome, ReminderAction};
use vantry_core::{AppError, AppResult};

use crate::alert_mailer::AlertMailer;

/// Configuration of the expiry alert scan.
#[derive(Debug, Clone)]
pub struct ExpiryAlertConfig {
    /// Address the alert is delivered to.
    pub recipient: String,
    /// How many days ahead a lot counts as expiring.
    pub horizon_days: u32,
}

/// Scans inventory lots for approaching expiry dates and emails an alert.
///
/// The scheduler core treats this as an opaque action; everything about what
/// the alert says and where it goes lives here.
pub struct ExpiryAlertAction {
    pool: PgPool,
    mailer: Arc<dyn AlertMailer>,
    config: ExpiryAlertConfig,
}

impl ExpiryAlertAction {
    /// Creates the action over a connection pool and a mail delivery seam.
    #[must_use]
    pub fn new(pool: PgPool, mailer: Arc<dyn AlertMailer>, config: ExpiryAlertConfig) -> Self {
        Self {
            pool,
            mailer,
            config,
        }
    }
}

#[derive(Debug, FromRow)]
struct ExpiringLotRow {
    item_name: String,
    lot_number: String,
    quantity: i32,
    expires_on: NaiveDate,
}

#[async_trait]
impl ReminderAction for ExpiryAlertAction {
    async fn run(&self, task_name: &str) -> AppResult<ActionOutcome> {
        let horizon = i32::try_from(self.config.horizon_days).map_err(|error| {
            AppError::Validation(format!("invalid expiry horizon_days value: {error}"))
        })?;

        let lots = sqlx::query_as::<_, ExpiringLotRow>(
            r#"
            SELECT item_name, lot_number, quantity, expires_on
            FROM inventory_lots
            WHERE quantity > 0
              AND expires_on <= CURRENT_DATE + $1::INT
            ORDER BY expires_on ASC, item_name ASC
            "#,
        )
        .bind(horizon)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to scan expiring inventory for task '{task_name}': {error}"
            ))
        })?;

        if lots.is_empty() {
            return Ok(ActionOutcome {
                success: true,
                detail: Some(format!(
                    "no inventory lots expiring within {} days",
                    self.config.horizon_days
                )),
            });
        }

        let subject = format!(
            "Inventory expiry alert: {} lot(s) expiring within {} days",
            lots.len(),
            self.config.horizon_days
        );
        let body = compose_body(&lots, self.config.horizon_days);

        self.mailer
            .send_alert(self.config.recipient.as_str(), subject.as_str(), body.as_str())
            .await?;

        Ok(ActionOutcome {
            success: true,
            detail: Some(format!(
                "{} lot(s) expiring within {} days; alert sent to {}",
                lots.len(),
                self.config.horizon_days,
                self.config.recipient
            )),
        })
    }
}

fn compose_body(lots: &[ExpiringLotRow], horizon_days: u32) -> String {
    let mut body = format!(
        "The following inventory lots expire within {horizon_days} days:\n\n"
    );

    for lot in lots {
        let _ = writeln!(
            body,
            "- {} (lot {}), quantity {}, expires on {}",
            lot.item_name, lot.lot_number, lot.quantity, lot.expires_on
        );
    }

    body.push_str("\nPlease review stock levels and arrange replacements.\n");
    body
}

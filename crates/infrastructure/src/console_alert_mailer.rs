//! Console alert mailer for development. Logs alerts to tracing output.

use async_trait::async_trait;
use tracing::info;
use vantry_core::AppResult;

use crate::alert_mailer::AlertMailer;

/// Development alert mailer that logs alerts instead of delivering them.
#[derive(Clone)]
pub struct ConsoleAlertMailer;

impl ConsoleAlertMailer {
    /// Creates a new console alert mailer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ConsoleAlertMailer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AlertMailer for ConsoleAlertMailer {
    async fn send_alert(&self, to: &str, subject: &str, body: &str) -> AppResult<()> {
        info!(
            to = to,
            subject = subject,
            "--- ALERT (console) ---\nTo: {}\nSubject: {}\n\n{}\n--- END ALERT ---",
            to,
            subject,
            body
        );

        Ok(())
    }
}

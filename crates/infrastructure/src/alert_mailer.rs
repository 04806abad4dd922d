use async_trait::async_trait;
use vantry_core::AppResult;

/// Delivery seam used by alert-producing actions.
#[async_trait]
pub trait AlertMailer: Send + Sync {
    /// Sends one plain-text alert message.
    async fn send_alert(&self, to: &str, subject: &str, body: &str) -> AppResult<()>;
}

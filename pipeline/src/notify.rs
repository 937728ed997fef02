//! Outbound notifications (email, SMS).

use async_trait::async_trait;
use tracing::{info, warn};

/// Status reported when a notification was logged instead of delivered.
pub const STATUS_MOCKED: &str = "mocked";

/// Delivers a message and reports how it went.
///
/// The returned status is stored verbatim in the pipeline context; a status
/// starting with `"failed"` marks the delivery as unsuccessful.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name used in logs ("email", "sms").
    fn channel(&self) -> &str;

    async fn send(&self, target: &str, subject: Option<&str>, body: &str) -> String;
}

/// Whether a status string reports a failed delivery.
pub fn is_failure(status: &str) -> bool {
    status.starts_with("failed")
}

/// Notifier with no delivery backend.
///
/// In dev mode every message is logged and reported as `"mocked"`; otherwise
/// sending fails.
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    channel: String,
    dev_mode: bool,
}

impl ConsoleNotifier {
    pub fn new(channel: impl Into<String>, dev_mode: bool) -> Self {
        Self {
            channel: channel.into(),
            dev_mode,
        }
    }
}

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn channel(&self) -> &str {
        &self.channel
    }

    async fn send(&self, target: &str, subject: Option<&str>, body: &str) -> String {
        if !self.dev_mode {
            warn!("No {} delivery channel configured; dropping message to {target}", self.channel);
            return "failed: delivery channel not configured".to_string();
        }

        match subject {
            Some(subject) => info!("[{} to {target}] {subject}: {body}", self.channel),
            None => info!("[{} to {target}] {body}", self.channel),
        }
        STATUS_MOCKED.to_string()
    }
}

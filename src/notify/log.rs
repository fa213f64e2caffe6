use async_trait::async_trait;
use tracing::warn;

use crate::config::AlertFormat;
use crate::error::NotifyError;
use crate::notify::{format::render, AlertMessage, Notifier};

/// Writes the rendered alert to the process log.
pub struct LogNotifier {
    format: AlertFormat,
}

impl LogNotifier {
    pub fn new(format: AlertFormat) -> Self {
        Self { format }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    fn format(&self) -> AlertFormat {
        self.format
    }

    async fn send(&self, message: &AlertMessage) -> Result<(), NotifyError> {
        warn!(event = "ALERT", "[ALERT]\n{}", render(message, self.format));
        Ok(())
    }
}

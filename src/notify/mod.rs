//! Alert delivery. Every registered channel gets the same message; a
//! failing channel is reported and never retried.

pub mod email;
pub mod format;
pub mod log;
pub mod telegram;

pub use email::EmailNotifier;
pub use log::LogNotifier;
pub use telegram::TelegramNotifier;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{error, info};

use crate::config::{AlertFormat, Config};
use crate::error::{NotifyError, Result};
use crate::types::ComparisonReport;

#[derive(Debug, Clone, PartialEq)]
pub enum AlertMessage {
    /// A comparison with at least one alert-worthy change.
    Alerts(ComparisonReport),
    /// One side of the comparison window has no stored snapshot.
    MissingSnapshot {
        baseline_date: NaiveDate,
        current_date: NaiveDate,
        missing: NaiveDate,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    fn format(&self) -> AlertFormat;

    async fn send(&self, message: &AlertMessage) -> std::result::Result<(), NotifyError>;
}

#[derive(Debug)]
pub struct DeliveryOutcome {
    pub channel: String,
    pub result: std::result::Result<(), NotifyError>,
}

impl DeliveryOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Default)]
pub struct NotifierRegistry {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        info!("[NOTIFY] channel registered: {} ({:?})", notifier.name(), notifier.format());
        self.notifiers.push(notifier);
    }

    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    pub fn channels(&self) -> Vec<&str> {
        self.notifiers.iter().map(|n| n.name()).collect()
    }

    /// Send `message` to every channel in registration order.
    pub async fn deliver(&self, message: &AlertMessage) -> Vec<DeliveryOutcome> {
        let mut outcomes = Vec::with_capacity(self.notifiers.len());
        for n in &self.notifiers {
            let result = n.send(message).await;
            match &result {
                Ok(()) => info!(event = "NOTIFY_SENT", channel = n.name(), "[NOTIFY] {}: sent", n.name()),
                Err(e) => error!(event = "NOTIFY_FAILED", channel = n.name(), "[NOTIFY] {}: {e}", n.name()),
            }
            outcomes.push(DeliveryOutcome {
                channel: n.name().to_string(),
                result,
            });
        }
        outcomes
    }
}

/// Log channel always; Telegram and email when their credentials are set.
/// `ALERT_FORMAT` overrides each channel's own rendering.
pub fn build_registry(cfg: &Config) -> Result<NotifierRegistry> {
    let mut registry = NotifierRegistry::new();
    registry.register(Box::new(LogNotifier::new(
        cfg.alert_format.unwrap_or(AlertFormat::Text),
    )));
    if let Some(tg) = &cfg.telegram {
        registry.register(Box::new(TelegramNotifier::new(tg.clone(), cfg.fetch.timeout_secs)?));
    }
    if let Some(email) = &cfg.email {
        registry.register(Box::new(EmailNotifier::new(
            email,
            cfg.alert_format.unwrap_or(AlertFormat::Html),
            cfg.fetch.timeout_secs,
        )?));
    }
    Ok(registry)
}

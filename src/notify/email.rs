use std::time::Duration;

use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::{AlertFormat, EmailConfig};
use crate::error::{AppError, NotifyError, Result};
use crate::notify::{
    format::{render, subject},
    AlertMessage, Notifier,
};

/// SMTP with STARTTLS, authenticated as the sender.
pub struct EmailNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    format: AlertFormat,
}

impl EmailNotifier {
    pub fn new(cfg: &EmailConfig, format: AlertFormat, timeout_secs: u64) -> Result<Self> {
        let from: Mailbox = cfg
            .sender
            .parse()
            .map_err(|e| AppError::Config(format!("EMAIL_SENDER {}: {e}", cfg.sender)))?;
        let to: Mailbox = cfg
            .receiver
            .parse()
            .map_err(|e| AppError::Config(format!("EMAIL_RECEIVER {}: {e}", cfg.receiver)))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.smtp_host)
            .map_err(|e| AppError::Config(format!("SMTP_HOST {}: {e}", cfg.smtp_host)))?
            .port(cfg.smtp_port)
            .credentials(Credentials::new(cfg.sender.clone(), cfg.password.clone()))
            .timeout(Some(Duration::from_secs(timeout_secs)))
            .build();

        Ok(Self {
            transport,
            from,
            to,
            format,
        })
    }

    fn build_message(&self, message: &AlertMessage) -> std::result::Result<Message, NotifyError> {
        let content_type = match self.format {
            AlertFormat::Html => ContentType::TEXT_HTML,
            AlertFormat::Text => ContentType::TEXT_PLAIN,
        };
        let email = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject(message))
            .header(content_type)
            .body(render(message, self.format))?;
        Ok(email)
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn format(&self) -> AlertFormat {
        self.format
    }

    async fn send(&self, message: &AlertMessage) -> std::result::Result<(), NotifyError> {
        let email = self.build_message(message)?;
        self.transport.send(email).await?;
        Ok(())
    }
}

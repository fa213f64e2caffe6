use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::{AlertFormat, TelegramConfig, TELEGRAM_MAX_MESSAGE_CHARS};
use crate::error::{NotifyError, Result};
use crate::notify::{format::render_telegram, AlertMessage, Notifier};

/// Bot API `sendMessage` response envelope.
#[derive(Debug, Deserialize)]
struct BotResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramNotifier {
    client: reqwest::Client,
    send_url: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(cfg: TelegramConfig, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            client,
            send_url: format!(
                "{}/bot{}/sendMessage",
                cfg.api_url.trim_end_matches('/'),
                cfg.bot_token
            ),
            chat_id: cfg.chat_id,
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    /// Telegram only understands a handful of inline tags, so this channel
    /// always sends its own markup.
    fn format(&self) -> AlertFormat {
        AlertFormat::Text
    }

    async fn send(&self, message: &AlertMessage) -> std::result::Result<(), NotifyError> {
        let text = render_telegram(message, TELEGRAM_MAX_MESSAGE_CHARS);
        let resp = self
            .client
            .post(&self.send_url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let status = resp.status();
        let body: BotResponse = match resp.json().await {
            Ok(b) => b,
            Err(_) => {
                return Err(NotifyError::Rejected(format!("HTTP {status} with unreadable body")));
            }
        };
        if !status.is_success() || !body.ok {
            return Err(NotifyError::Rejected(
                body.description.unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }
        Ok(())
    }
}

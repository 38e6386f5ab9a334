//! Telegram notification channel.
//!
//! Pushes messages to a fixed operator chat via the Bot API `sendMessage`
//! method. Sends are fire-and-forget: transport failures are logged and
//! dropped so a Telegram outage can never stall a scan or trade cycle.
//!
//! API docs: https://core.telegram.org/bots/api#sendmessage

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use tracing::{debug, warn};

use super::Notify;

const BASE_URL: &str = "https://api.telegram.org";

/// Telegram Bot API notifier bound to one operator chat.
pub struct TelegramNotifier {
    http: Client,
    bot_token: Secret<String>,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client for Telegram")?;

        Ok(Self {
            http,
            bot_token: Secret::new(bot_token),
            chat_id,
        })
    }

    async fn post_message(&self, text: &str) -> Result<()> {
        let url = format!(
            "{BASE_URL}/bot{}/sendMessage",
            self.bot_token.expose_secret(),
        );
        let params = [("chat_id", self.chat_id.as_str()), ("text", text)];

        let resp = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .context("Telegram sendMessage request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram API error {status}: {body}");
        }

        Ok(())
    }
}

#[async_trait]
impl Notify for TelegramNotifier {
    async fn send(&self, text: &str) {
        match self.post_message(text).await {
            Ok(()) => debug!(chars = text.len(), "Telegram message sent"),
            Err(e) => warn!(error = %e, "Failed to send Telegram message"),
        }
    }
}

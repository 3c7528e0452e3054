//! Telegram delivery through the Bot API.
//!
//! Posts to a single chat. Markdown is tried first with a plain-text
//! fallback, and long digests are split to fit the API limit.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use super::{Notifier, split_message};
use crate::config::Env;
use crate::error::{ConfigError, NotifyError};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub chat_id: String,
}

impl TelegramConfig {
    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        Ok(Self {
            bot_token: SecretString::from(env.require("TELEGRAM_BOT_TOKEN")?),
            chat_id: env.require("TELEGRAM_CHAT_ID")?,
        })
    }
}

/// Sends each digest to one Telegram chat.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
    api_base: String,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    /// Point at a different API host (used by tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base.trim_end_matches('/'),
            self.config.bot_token.expose_secret()
        )
    }

    async fn post_message(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, NotifyError> {
        self.client
            .post(self.api_url("sendMessage"))
            .json(body)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                name: "telegram".into(),
                reason: e.without_url().to_string(),
            })
    }

    /// Send a single chunk (≤4096 chars), Markdown-first with fallback.
    async fn send_chunk(&self, text: &str) -> Result<bool, NotifyError> {
        let markdown_resp = self
            .post_message(&serde_json::json!({
                "chat_id": self.config.chat_id,
                "text": text,
                "parse_mode": "Markdown"
            }))
            .await?;

        if markdown_resp.status().is_success() {
            return Ok(true);
        }

        let markdown_status = markdown_resp.status();
        warn!(
            status = ?markdown_status,
            "Telegram sendMessage with Markdown failed; retrying without parse_mode"
        );

        let plain_resp = self
            .post_message(&serde_json::json!({
                "chat_id": self.config.chat_id,
                "text": text,
            }))
            .await?;

        if !plain_resp.status().is_success() {
            let plain_status = plain_resp.status();
            let plain_err = plain_resp.text().await.unwrap_or_default();
            warn!(
                markdown = %markdown_status,
                plain = %plain_status,
                error = %plain_err,
                "Telegram rejected message"
            );
            return Ok(false);
        }

        Ok(true)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<bool, NotifyError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        info!(
            chat_id = %self.config.chat_id,
            message_length = text.chars().count(),
            chunks = chunks.len(),
            "Sending Telegram message"
        );

        for chunk in &chunks {
            if !self.send_chunk(chunk).await? {
                return Ok(false);
            }
        }

        info!(chat_id = %self.config.chat_id, "Telegram message sent");
        Ok(true)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

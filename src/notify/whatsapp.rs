//! WhatsApp delivery through the Twilio Messages API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use super::{Notifier, split_message};
use crate::config::Env;
use crate::error::{ConfigError, NotifyError};

/// Twilio's shared WhatsApp sandbox number.
pub const DEFAULT_FROM: &str = "whatsapp:+14155238886";

const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Twilio refuses a `Body` longer than this (error 21617).
const TWILIO_MAX_BODY_LENGTH: usize = 1600;

/// Twilio WhatsApp configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    pub from: String,
    pub to: String,
}

impl WhatsAppConfig {
    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        Ok(Self {
            account_sid: env.require("TWILIO_ACCOUNT_SID")?,
            auth_token: SecretString::from(env.require("TWILIO_AUTH_TOKEN")?),
            from: env.get_or("TWILIO_WHATSAPP_FROM", DEFAULT_FROM),
            to: env.require("TWILIO_WHATSAPP_TO")?,
        })
    }
}

/// Subset of Twilio's message resource we care about.
#[derive(Debug, Default, Deserialize)]
struct TwilioMessage {
    sid: Option<String>,
    status: Option<String>,
}

/// Sends each digest to one WhatsApp number, split to fit Twilio's body limit.
pub struct WhatsAppNotifier {
    config: WhatsAppConfig,
    client: reqwest::Client,
    api_base: String,
}

impl WhatsAppNotifier {
    pub fn new(config: WhatsAppConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    /// Point at a different API host (used by tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }

    /// Post one message of at most [`TWILIO_MAX_BODY_LENGTH`] bytes.
    async fn send_chunk(&self, body: &str) -> Result<bool, NotifyError> {
        let params = [
            ("From", self.config.from.as_str()),
            ("To", self.config.to.as_str()),
            ("Body", body),
        ];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&params)
            .send()
            .await
            .map_err(|e| NotifyError::SendFailed {
                name: "whatsapp".into(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let err = resp.text().await.unwrap_or_default();
            warn!(
                to = %self.config.to,
                status = %status,
                body_length = body.chars().count(),
                error = %err,
                "Twilio rejected WhatsApp message"
            );
            return Ok(false);
        }

        let message: TwilioMessage = resp.json().await.unwrap_or_default();
        let delivery = message.status.as_deref().unwrap_or("unknown");
        if matches!(delivery, "failed" | "undelivered") {
            warn!(
                to = %self.config.to,
                sid = message.sid.as_deref().unwrap_or("-"),
                status = delivery,
                "Twilio reported WhatsApp delivery failure"
            );
            return Ok(false);
        }

        info!(
            to = %self.config.to,
            sid = message.sid.as_deref().unwrap_or("-"),
            status = delivery,
            "WhatsApp message sent"
        );
        Ok(true)
    }
}

#[async_trait]
impl Notifier for WhatsAppNotifier {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, text: &str) -> Result<bool, NotifyError> {
        let chunks = split_message(text, TWILIO_MAX_BODY_LENGTH);
        info!(
            to = %self.config.to,
            message_length = text.chars().count(),
            chunks = chunks.len(),
            "Sending WhatsApp message"
        );

        for chunk in &chunks {
            if !self.send_chunk(chunk).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

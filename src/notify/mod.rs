//! Notification senders that deliver finished digests.
//!
//! Exactly one backend is active per process, chosen by `NOTIFY_BACKEND`.

pub mod telegram;
pub mod whatsapp;

pub use telegram::{TelegramConfig, TelegramNotifier};
pub use whatsapp::{WhatsAppConfig, WhatsAppNotifier};

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Env;
use crate::error::{ConfigError, NotifyError};

/// Delivers one formatted message.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Send `text`.
    ///
    /// `Err` means the provider could not be reached; `Ok(false)` means it
    /// answered but refused or failed the delivery.
    async fn send(&self, text: &str) -> Result<bool, NotifyError>;
}

/// Which notification backend to use.
#[derive(Debug, Clone)]
pub enum NotifyConfig {
    WhatsApp(WhatsAppConfig),
    Telegram(TelegramConfig),
}

impl NotifyConfig {
    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        let backend = env.get_or("NOTIFY_BACKEND", "whatsapp").to_ascii_lowercase();
        match backend.as_str() {
            "whatsapp" => Ok(Self::WhatsApp(WhatsAppConfig::from_lookup(env)?)),
            "telegram" => Ok(Self::Telegram(TelegramConfig::from_lookup(env)?)),
            other => Err(ConfigError::InvalidValue {
                key: "NOTIFY_BACKEND".to_string(),
                message: format!("unknown backend '{other}' (expected whatsapp or telegram)"),
            }),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::WhatsApp(_) => "whatsapp",
            Self::Telegram(_) => "telegram",
        }
    }
}

/// Create the configured notifier.
pub fn create_notifier(config: &NotifyConfig) -> Arc<dyn Notifier> {
    match config {
        NotifyConfig::WhatsApp(cfg) => Arc::new(WhatsAppNotifier::new(cfg.clone())),
        NotifyConfig::Telegram(cfg) => Arc::new(TelegramNotifier::new(cfg.clone())),
    }
}

/// Largest char boundary of `s` that is `<= index`.
fn floor_boundary(s: &str, index: usize) -> usize {
    let mut end = index.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Split `text` into chunks of at most `max_len` bytes, preferring newlines
/// then spaces as break points.
pub(crate) fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        let hard_limit = match floor_boundary(remaining, max_len) {
            // A single char wider than max_len; take it whole.
            0 => remaining.chars().next().map_or(remaining.len(), char::len_utf8),
            n => n,
        };
        let chunk = &remaining[..hard_limit];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(hard_limit);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

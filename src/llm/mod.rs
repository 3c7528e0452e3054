//! LLM integration: turns one newsletter into a digest.
//!
//! Supports:
//! - **OpenAI**: Chat Completions API via rig-core
//! - **Anthropic**: Direct API access via rig-core
//!
//! The pipeline depends only on the [`Summarizer`] trait; [`RigSummarizer`]
//! bridges a rig agent to it.

pub mod prompts;
mod rig_summarizer;

pub use rig_summarizer::RigSummarizer;

use std::sync::Arc;

use async_trait::async_trait;
use rig::client::CompletionClient;
use secrecy::{ExposeSecret, SecretString};

use crate::config::Env;
use crate::error::{ConfigError, LlmError};

/// Default response budget for one digest.
pub const DEFAULT_MAX_TOKENS: u64 = 1200;

/// Produces a digest for one newsletter.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Summarize `body` (already truncated by the caller).
    async fn summarize(&self, subject: &str, body: &str) -> Result<String, LlmError>;
}

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAi,
    Anthropic,
}

impl LlmBackend {
    fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    fn api_key_var(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::str::FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(format!("unknown LLM backend '{other}' (expected openai or anthropic)")),
        }
    }
}

/// Configuration for creating a summarizer.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: SecretString,
    pub model: String,
    pub max_tokens: u64,
    /// Override for the provider's API root (proxies, gateways, tests).
    pub base_url: Option<String>,
}

impl LlmConfig {
    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        let backend: LlmBackend = env.parse_or("LLM_BACKEND", LlmBackend::OpenAi)?;
        Ok(Self {
            backend,
            api_key: SecretString::from(env.require(backend.api_key_var())?),
            model: env.get_or("LLM_MODEL", backend.default_model()),
            max_tokens: env.parse_or("LLM_MAX_TOKENS", DEFAULT_MAX_TOKENS)?,
            base_url: env.get("LLM_BASE_URL"),
        })
    }
}

/// Create a summarizer from configuration.
///
/// # Panics
///
/// Must be called inside a Tokio runtime: building a rig agent spawns its
/// tool server task.
pub fn create_summarizer(config: &LlmConfig) -> Result<Arc<dyn Summarizer>, LlmError> {
    match config.backend {
        LlmBackend::OpenAi => create_openai_summarizer(config),
        LlmBackend::Anthropic => create_anthropic_summarizer(config),
    }
}

fn create_openai_summarizer(config: &LlmConfig) -> Result<Arc<dyn Summarizer>, LlmError> {
    use rig::providers::openai;

    let mut builder: openai::CompletionsClientBuilder =
        openai::CompletionsClient::builder().api_key(config.api_key.expose_secret());
    if let Some(base_url) = &config.base_url {
        builder = builder.base_url(base_url);
    }
    let client = builder.build().map_err(|e| LlmError::RequestFailed {
        provider: "openai".to_string(),
        reason: format!("Failed to create OpenAI client: {}", e),
    })?;

    let agent = client
        .agent(&config.model)
        .preamble(prompts::SYSTEM_PROMPT)
        .max_tokens(config.max_tokens)
        .build();
    tracing::info!("Using OpenAI (model: {})", config.model);
    Ok(Arc::new(RigSummarizer::new(agent, "openai", &config.model)))
}

fn create_anthropic_summarizer(config: &LlmConfig) -> Result<Arc<dyn Summarizer>, LlmError> {
    use rig::providers::anthropic;

    let mut builder: anthropic::ClientBuilder =
        anthropic::Client::builder().api_key(config.api_key.expose_secret());
    if let Some(base_url) = &config.base_url {
        builder = builder.base_url(base_url);
    }
    let client = builder.build().map_err(|e| LlmError::RequestFailed {
        provider: "anthropic".to_string(),
        reason: format!("Failed to create Anthropic client: {}", e),
    })?;

    let agent = client
        .agent(&config.model)
        .preamble(prompts::SYSTEM_PROMPT)
        .max_tokens(config.max_tokens)
        .build();
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Arc::new(RigSummarizer::new(agent, "anthropic", &config.model)))
}

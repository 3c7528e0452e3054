//! Error types for TLDR Digest.

/// Top-level error type for process bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Mailbox (IMAP) errors. Any of these aborts the current run.
#[derive(Debug, thiserror::Error)]
pub enum MailboxError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("TLS error: {0}")]
    Tls(String),

    #[error("Authentication failed for {username}")]
    AuthFailed { username: String },

    #[error("IMAP command {command} failed: {response}")]
    Command { command: String, response: String },

    #[error("IMAP protocol error: {0}")]
    Protocol(String),

    #[error("IMAP connection closed by server")]
    ConnectionClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mailbox task failed: {0}")]
    Task(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Empty response from {provider}")]
    EmptyResponse { provider: String },
}

/// Notification transport errors.
///
/// A provider that answers but refuses delivery is not an error; senders
/// report that as `Ok(false)`.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to send on {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Failure that aborts a whole pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] MailboxError),
}

/// Failure confined to a single email in a batch.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    #[error("Summarization failed: {0}")]
    Summarize(#[from] LlmError),

    #[error("Send failed: {0}")]
    Send(#[from] NotifyError),

    #[error("Notification rejected by provider")]
    Rejected,
}

/// Result type alias for bootstrap code.
pub type Result<T> = std::result::Result<T, Error>;

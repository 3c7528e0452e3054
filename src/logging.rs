//! Tracing setup: stdout plus a plain-text file under `LOG_DIR`.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Env;

/// File name written inside the log directory.
pub const LOG_FILE_NAME: &str = "app.log";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for `app.log`. Created if missing.
    pub dir: PathBuf,
}

impl LogConfig {
    pub fn from_lookup(env: &Env) -> Self {
        Self {
            dir: PathBuf::from(env.get_or("LOG_DIR", "logs")),
        }
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// lifetime of the process.
pub fn init(config: &LogConfig) -> std::io::Result<WorkerGuard> {
    std::fs::create_dir_all(&config.dir)?;

    let appender = tracing_appender::rolling::never(&config.dir, LOG_FILE_NAME);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    Ok(guard)
}

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use tldr_digest::config::AppConfig;
use tldr_digest::logging;
use tldr_digest::pipeline::Pipeline;
use tldr_digest::scheduler::spawn_scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();

    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = AppConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  See .env.example for the required variables.");
        std::process::exit(1);
    });

    let _log_guard = logging::init(&config.log)
        .with_context(|| format!("Failed to open log dir {}", config.log.dir.display()))?;

    eprintln!("📰 TLDR Digest v{}", env!("CARGO_PKG_VERSION"));
    eprintln!(
        "   Mailbox: {}@{} (from: {})",
        config.mailbox.username, config.mailbox.imap_host, config.mailbox.sender
    );
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Notify: {}", config.notify.backend_name());
    eprintln!(
        "   Schedule: daily at {:02}:{:02}{}",
        config.schedule.hour,
        config.schedule.minute,
        if config.schedule.run_on_startup {
            " + once at startup"
        } else {
            ""
        }
    );
    eprintln!("   Logs: {}\n", config.log.dir.display());

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let (mut handle, shutdown) = spawn_scheduler(Arc::clone(&pipeline), config.schedule.clone())?;

    tracing::info!("Press Ctrl+C to stop");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            tracing::info!("Shutdown requested");
            shutdown.store(true, Ordering::Relaxed);
            handle.abort();
        }
        joined = &mut handle => {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Scheduler task failed");
            }
        }
    }

    Ok(())
}

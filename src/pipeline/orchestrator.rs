//! Pipeline orchestrator: one fetch, summarize, notify cycle.
//!
//! **Core invariant: one email's failure never stops the batch.**
//! Only the initial fetch is fatal for a run. Emails are consumed at fetch
//! time, so anything that fails downstream is not retried on a later run.
//!
//! Flow:
//! 1. `Mailbox::fetch_unseen()`, all-or-nothing
//! 2. Per email, in delivered order: truncate → `Summarizer::summarize()`
//!    → format → `Notifier::send()`
//! 3. Log each outcome and continue

use std::sync::Arc;

use chrono::Local;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::config::{AppConfig, Env};
use crate::error::{ConfigError, ItemError, RunError};
use crate::llm::{Summarizer, create_summarizer};
use crate::mailbox::{EmailItem, ImapMailbox, Mailbox};
use crate::notify::{Notifier, create_notifier};
use crate::pipeline::types::{ItemOutcome, RunReport};

/// Bodies are cut to this many characters before summarization.
pub const MAX_BODY_CHARS: usize = 8000;

/// Default cap on emails pulled per run.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// Leading token of every notification.
pub const NOTIFICATION_HEADER: &str = "📰 *TLDR Summary*";

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum emails fetched per run.
    pub max_results: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl PipelineConfig {
    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        let max_results = env.parse_or("MAX_RESULTS", DEFAULT_MAX_RESULTS)?;
        if max_results == 0 {
            return Err(ConfigError::InvalidValue {
                key: "MAX_RESULTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(Self { max_results })
    }
}

/// Sequences the mailbox, summarizer and notifier for one run at a time.
pub struct Pipeline {
    mailbox: Arc<dyn Mailbox>,
    summarizer: Arc<dyn Summarizer>,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        summarizer: Arc<dyn Summarizer>,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            mailbox,
            summarizer,
            notifier,
            config,
        }
    }

    /// Build the production adapters from configuration.
    ///
    /// # Panics
    ///
    /// Must be called inside a Tokio runtime; see [`create_summarizer`].
    pub fn from_config(config: &AppConfig) -> crate::error::Result<Self> {
        let mailbox = Arc::new(ImapMailbox::new(config.mailbox.clone()));
        let summarizer = create_summarizer(&config.llm)?;
        let notifier = create_notifier(&config.notify);
        Ok(Self::new(
            mailbox,
            summarizer,
            notifier,
            config.pipeline.clone(),
        ))
    }

    /// Run one full cycle.
    ///
    /// Returns `Err` only when the fetch fails; per-email failures are
    /// logged and recorded in the report.
    pub async fn run(&self) -> Result<RunReport, RunError> {
        let run_id = Uuid::new_v4();
        self.run_cycle(run_id)
            .instrument(info_span!("pipeline_run", run_id = %run_id))
            .await
    }

    async fn run_cycle(&self, run_id: Uuid) -> Result<RunReport, RunError> {
        info!(run_at = %Local::now().to_rfc3339(), "Pipeline starting");
        info!(max_results = self.config.max_results, "Fetching newsletter emails");

        let batch = match self.mailbox.fetch_unseen(self.config.max_results).await {
            Ok(batch) => batch,
            Err(e) => {
                error!(error = %e, "Pipeline failed at mailbox fetch");
                return Err(RunError::Fetch(e));
            }
        };

        let mut report = RunReport::new(run_id);
        if batch.is_empty() {
            info!("No new newsletter emails found, skipping");
            return Ok(report);
        }

        let total = batch.len();
        info!(count = total, "Fetched newsletter emails");

        for (index, item) in batch.iter().enumerate() {
            info!(item = index + 1, total, subject = %item.subject, "Processing email");

            let outcome = match self.process_item(item).await {
                Ok(()) => ItemOutcome::Sent,
                Err(e) => ItemOutcome::from(&e),
            };
            if outcome.is_sent() {
                info!(subject = %item.subject, outcome = %outcome, "Email processed");
            } else {
                warn!(subject = %item.subject, outcome = %outcome, "Email processed");
            }
            report.outcomes.push(outcome);
        }

        info!(
            fetched = report.fetched(),
            sent = report.sent(),
            failed = report.failed(),
            completed_at = %Local::now().to_rfc3339(),
            "Pipeline completed"
        );
        Ok(report)
    }

    async fn process_item(&self, item: &EmailItem) -> Result<(), ItemError> {
        let body = truncate_body(&item.body, MAX_BODY_CHARS);

        let digest = self
            .summarizer
            .summarize(&item.subject, body)
            .await
            .inspect_err(|e| {
                error!(subject = %item.subject, error = %e, "Summarization failed")
            })?;

        let message = format_notification(&item.date, &digest);

        let delivered = self.notifier.send(&message).await.inspect_err(|e| {
            error!(
                subject = %item.subject,
                notifier = self.notifier.name(),
                error = %e,
                "Notification send failed"
            )
        })?;

        if delivered {
            Ok(())
        } else {
            Err(ItemError::Rejected)
        }
    }
}

/// First `max_chars` characters of `body`.
pub fn truncate_body(body: &str, max_chars: usize) -> &str {
    match body.char_indices().nth(max_chars) {
        Some((end, _)) => &body[..end],
        None => body,
    }
}

/// Notification text: header, em-dash, date, blank line, digest verbatim.
pub fn format_notification(date: &str, digest: &str) -> String {
    format!("{NOTIFICATION_HEADER} — {date}\n\n{digest}")
}

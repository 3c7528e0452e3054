//! Newsletter digest pipeline.
//!
//! Every run flows through:
//! 1. `Mailbox::fetch_unseen()`: one bounded batch, consumed at fetch time
//! 2. `Summarizer::summarize()`: one digest per email
//! 3. `Notifier::send()`: one message per digest
//!
//! **No retries.** A failed email is logged and skipped.

pub mod orchestrator;
pub mod types;

pub use orchestrator::{
    DEFAULT_MAX_RESULTS, MAX_BODY_CHARS, NOTIFICATION_HEADER, Pipeline, PipelineConfig,
    format_notification, truncate_body,
};
pub use types::{ItemOutcome, RunReport};

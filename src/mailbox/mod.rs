//! Mailbox source: where newsletter emails come from.
//!
//! The pipeline only sees the [`Mailbox`] trait. The production adapter is
//! [`ImapMailbox`], which speaks IMAP over TLS and marks every returned
//! message `\Seen` before handing it back.

pub mod imap;
pub mod session;

pub use imap::{ImapConfig, ImapMailbox};
pub use session::ImapSession;

use async_trait::async_trait;

use crate::error::MailboxError;

/// One newsletter email as delivered to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailItem {
    pub subject: String,
    /// Date as reported by the message, free-form.
    pub date: String,
    /// Plain-text body. May be very large.
    pub body: String,
}

impl EmailItem {
    pub fn new(
        subject: impl Into<String>,
        date: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            date: date.into(),
            body: body.into(),
        }
    }
}

/// Source of unseen newsletter emails.
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Fetch up to `max_results` unseen newsletter emails, newest first.
    ///
    /// Every returned item is marked consumed at the source before this
    /// returns, so it will not be returned again. An empty `Vec` means
    /// nothing matched.
    async fn fetch_unseen(&self, max_results: usize) -> Result<Vec<EmailItem>, MailboxError>;
}

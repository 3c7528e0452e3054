//! IMAP mailbox that pulls unseen newsletter issues from one sender.
//!
//! Connects over implicit TLS (rustls), searches for unseen messages from the
//! configured sender within the lookback window, keeps the newest
//! `max_results`, and marks each one `\Seen` as it is fetched.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use mail_parser::{HeaderName, MessageParser};
use rustls_pki_types::ServerName;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use super::session::{ImapSession, quote};
use super::{EmailItem, Mailbox};
use crate::config::Env;
use crate::error::{ConfigError, MailboxError};

/// Default newsletter sender.
pub const DEFAULT_SENDER: &str = "dan@tldrnewsletter.com";

const READ_TIMEOUT: Duration = Duration::from_secs(30);

// ── Configuration ───────────────────────────────────────────────────

/// IMAP mailbox configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct ImapConfig {
    pub imap_host: String,
    pub imap_port: u16,
    pub username: String,
    pub password: SecretString,
    pub folder: String,
    /// Only messages from this address are considered.
    pub sender: String,
    /// SINCE window in days, counted back from today.
    pub lookback_days: u64,
}

impl ImapConfig {
    pub fn from_lookup(env: &Env) -> Result<Self, ConfigError> {
        Ok(Self {
            imap_host: env.get_or("IMAP_HOST", "imap.gmail.com"),
            imap_port: env.parse_or("IMAP_PORT", 993)?,
            username: env.require_any(&["GMAIL_EMAIL", "IMAP_USERNAME"])?,
            password: SecretString::from(
                env.require_any(&["GMAIL_APP_PASSWORD", "IMAP_PASSWORD"])?,
            ),
            folder: env.get_or("IMAP_FOLDER", "INBOX"),
            sender: env.get_or("TLDR_SENDER", DEFAULT_SENDER),
            lookback_days: env.parse_or("MAILBOX_LOOKBACK_DAYS", 1)?,
        })
    }

    /// First day included in the search.
    pub fn since_date(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_sub_days(Days::new(self.lookback_days))
            .unwrap_or(today)
    }
}

// ── Mailbox ─────────────────────────────────────────────────────────

/// IMAP-backed [`Mailbox`]. Opens a fresh connection per fetch.
pub struct ImapMailbox {
    config: ImapConfig,
}

impl ImapMailbox {
    pub fn new(config: ImapConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailbox for ImapMailbox {
    async fn fetch_unseen(&self, max_results: usize) -> Result<Vec<EmailItem>, MailboxError> {
        let cfg = self.config.clone();
        let since = cfg.since_date(Local::now().date_naive());

        info!(
            username = %cfg.username,
            host = %cfg.imap_host,
            since = %imap_date(since),
            "Connecting to IMAP"
        );

        tokio::task::spawn_blocking(move || fetch_unseen_imap(&cfg, max_results, since))
            .await
            .map_err(|e| MailboxError::Task(e.to_string()))?
    }
}

/// Fetch over a fresh TLS connection (blocking, run in spawn_blocking).
fn fetch_unseen_imap(
    config: &ImapConfig,
    max_results: usize,
    since: NaiveDate,
) -> Result<Vec<EmailItem>, MailboxError> {
    let connect_err = |reason: String| MailboxError::Connect {
        host: config.imap_host.clone(),
        port: config.imap_port,
        reason,
    };

    let tcp = TcpStream::connect((config.imap_host.as_str(), config.imap_port))
        .map_err(|e| connect_err(e.to_string()))?;
    tcp.set_read_timeout(Some(READ_TIMEOUT))?;

    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth(),
    );
    let server_name = ServerName::try_from(config.imap_host.clone())
        .map_err(|e| MailboxError::Tls(e.to_string()))?;
    let conn = rustls::ClientConnection::new(tls_config, server_name)
        .map_err(|e| MailboxError::Tls(e.to_string()))?;
    let tls = rustls::StreamOwned::new(conn, tcp);

    let mut session = ImapSession::new(tls);
    fetch_batch(&mut session, config, max_results, since)
}

/// Run the search/fetch/mark cycle on an established session.
///
/// Each fetched message is marked `\Seen` before moving on, so anything
/// returned here is consumed even if later processing fails.
pub fn fetch_batch<S: Read + Write>(
    session: &mut ImapSession<S>,
    config: &ImapConfig,
    max_results: usize,
    since: NaiveDate,
) -> Result<Vec<EmailItem>, MailboxError> {
    session.read_greeting()?;
    session.login(&config.username, config.password.expose_secret())?;
    session.select(&config.folder)?;
    info!("IMAP connected");

    let uids = session.uid_search(&search_query(&config.sender, since))?;
    if uids.is_empty() {
        info!(sender = %config.sender, "No unseen newsletter emails found");
        session.logout();
        return Ok(Vec::new());
    }
    info!(matched = uids.len(), "Found unseen newsletter emails");

    let batch = select_batch(&uids, max_results);
    let mut items = Vec::with_capacity(batch.len());

    for uid in batch {
        let Some(raw) = session.uid_fetch_body(uid)? else {
            warn!(uid, "FETCH returned no message body; skipping");
            continue;
        };

        let parsed = parse_email(&raw);
        session.uid_mark_seen(uid)?;

        match parsed {
            Some(item) => {
                info!(
                    uid,
                    subject = %item.subject,
                    date = %item.date,
                    body_length = item.body.chars().count(),
                    "Marked as read"
                );
                items.push(item);
            }
            None => warn!(uid, "Unparseable message marked as read and skipped"),
        }
    }

    session.logout();
    info!(fetched = items.len(), "IMAP disconnected");
    Ok(items)
}

// ── Helpers (public for testing) ────────────────────────────────────

/// IMAP date format (`DD-Mon-YYYY`).
pub fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}

/// `UID SEARCH` criteria for unseen mail from `sender` since `since`.
pub fn search_query(sender: &str, since: NaiveDate) -> String {
    format!("UNSEEN FROM {} SINCE {}", quote(sender), imap_date(since))
}

/// Keep the newest `max_results` UIDs, newest first.
pub fn select_batch(uids: &[u32], max_results: usize) -> Vec<u32> {
    let mut sorted = uids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let start = sorted.len().saturating_sub(max_results);
    sorted[start..].iter().rev().copied().collect()
}

/// Turn a raw RFC 822 message into an [`EmailItem`].
pub fn parse_email(raw: &[u8]) -> Option<EmailItem> {
    let parsed = MessageParser::default().parse(raw)?;
    let subject = parsed.subject().unwrap_or("(no subject)").to_string();
    // Keep the sender's own Date text when it isn't a parseable RFC 822 date.
    let date = parsed
        .date()
        .map(|d| d.to_rfc822())
        .or_else(|| {
            parsed
                .header_raw(HeaderName::Date)
                .map(str::trim)
                .filter(|raw| !raw.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "Unknown".to_string());
    let body = extract_text(&parsed);
    debug!(subject = %subject, "Parsed message");
    Some(EmailItem {
        subject,
        date,
        body,
    })
}

/// Plain-text body, falling back to tag-stripped HTML.
fn extract_text(parsed: &mail_parser::Message) -> String {
    if let Some(text) = parsed.body_text(0) {
        return text.to_string();
    }
    if let Some(html) = parsed.body_html(0) {
        return strip_html(html.as_ref());
    }
    String::new()
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> ImapConfig {
        ImapConfig {
            imap_host: "imap.test.com".into(),
            imap_port: 993,
            username: "me@test.com".into(),
            password: SecretString::from("pass"),
            folder: "INBOX".into(),
            sender: DEFAULT_SENDER.into(),
            lookback_days: 1,
        }
    }

    #[test]
    fn imap_date_format() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 5).unwrap();
        assert_eq!(imap_date(date), "05-Mar-2026");
    }

    #[test]
    fn since_date_counts_back() {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let mut config = test_config();
        assert_eq!(
            config.since_date(today),
            NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()
        );
        config.lookback_days = 0;
        assert_eq!(config.since_date(today), today);
    }

    #[test]
    fn search_query_filters_unseen_sender_and_date() {
        let date = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert_eq!(
            search_query("dan@tldrnewsletter.com", date),
            "UNSEEN FROM \"dan@tldrnewsletter.com\" SINCE 18-Oct-2026"
        );
    }

    #[test]
    fn select_batch_keeps_newest_reversed() {
        assert_eq!(select_batch(&[1, 2, 3, 4, 5], 3), vec![5, 4, 3]);
    }

    #[test]
    fn select_batch_fewer_than_cap() {
        assert_eq!(select_batch(&[8, 2], 10), vec![8, 2]);
        assert!(select_batch(&[], 10).is_empty());
    }

    #[test]
    fn parse_email_plain_text() {
        let raw = b"From: Dan <dan@tldrnewsletter.com>\r\n\
Subject: TLDR AI 2026-10-19\r\n\
Date: Mon, 19 Oct 2026 10:00:00 +0000\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
Big model news.\r\n";
        let item = parse_email(raw).unwrap();
        assert_eq!(item.subject, "TLDR AI 2026-10-19");
        assert!(item.date.contains("19 Oct 2026"));
        assert!(item.body.contains("Big model news."));
    }

    #[test]
    fn parse_email_missing_headers() {
        let raw = b"Content-Type: text/plain\r\n\r\nbody only\r\n";
        let item = parse_email(raw).unwrap();
        assert_eq!(item.subject, "(no subject)");
        assert_eq!(item.date, "Unknown");
    }

    #[test]
    fn parse_email_keeps_unparseable_date_text() {
        let raw = b"Subject: Odd date\r\n\
Date: sometime last week\r\n\
Content-Type: text/plain\r\n\
\r\n\
body\r\n";
        let item = parse_email(raw).unwrap();
        assert_eq!(item.date, "sometime last week");
    }

    #[test]
    fn strip_html_basic() {
        assert_eq!(strip_html("<p>Hello</p>"), "Hello");
        assert_eq!(
            strip_html("<div><b>Bold</b> and <i>italic</i></div>"),
            "Bold and italic"
        );
        assert_eq!(strip_html("<p>  Hello   World  </p>"), "Hello World");
    }

    #[test]
    fn config_from_lookup_aliases() {
        let env = Env::from_pairs(&[
            ("IMAP_USERNAME", "user@corp.com"),
            ("IMAP_PASSWORD", "pw"),
            ("IMAP_HOST", "mail.corp.com"),
            ("IMAP_PORT", "1993"),
            ("MAILBOX_LOOKBACK_DAYS", "3"),
        ]);
        let config = ImapConfig::from_lookup(&env).unwrap();
        assert_eq!(config.username, "user@corp.com");
        assert_eq!(config.imap_host, "mail.corp.com");
        assert_eq!(config.imap_port, 1993);
        assert_eq!(config.lookback_days, 3);
        assert_eq!(config.password.expose_secret(), "pw");
    }

    #[test]
    fn config_rejects_bad_port() {
        let env = Env::from_pairs(&[
            ("GMAIL_EMAIL", "a@b.c"),
            ("GMAIL_APP_PASSWORD", "pw"),
            ("IMAP_PORT", "imap"),
        ]);
        assert!(matches!(
            ImapConfig::from_lookup(&env),
            Err(ConfigError::InvalidValue { .. })
        ));
    }
}

//! Minimal synchronous IMAP4rev1 client.
//!
//! Only the handful of commands the mailbox needs: LOGIN, SELECT,
//! UID SEARCH, UID FETCH, UID STORE and LOGOUT. Generic over the stream so
//! the same code runs over rustls in production and over an in-memory
//! script in tests.

use std::io::{BufRead, BufReader, ErrorKind, Read, Write};

use crate::error::MailboxError;

/// Untagged data collected while waiting for a tagged completion.
#[derive(Debug, Default)]
pub struct Response {
    pub lines: Vec<String>,
    /// Literal payloads (`{N}` blocks) in the order they arrived.
    pub literals: Vec<Vec<u8>>,
}

/// An IMAP connection after the transport is established.
pub struct ImapSession<S: Read + Write> {
    stream: BufReader<S>,
    tag_counter: u32,
}

impl<S: Read + Write> ImapSession<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
            tag_counter: 1,
        }
    }

    /// Give back the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Consume the server greeting.
    pub fn read_greeting(&mut self) -> Result<(), MailboxError> {
        let line = self.read_line()?;
        if line.starts_with("* OK") || line.starts_with("* PREAUTH") {
            Ok(())
        } else {
            Err(MailboxError::Protocol(format!(
                "unexpected greeting: {}",
                line.trim_end()
            )))
        }
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<(), MailboxError> {
        let cmd = format!("LOGIN {} {}", quote(username), quote(password));
        match self.command(&cmd) {
            Ok(_) => Ok(()),
            Err(MailboxError::Command { .. }) => Err(MailboxError::AuthFailed {
                username: username.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    pub fn select(&mut self, folder: &str) -> Result<(), MailboxError> {
        self.command(&format!("SELECT {}", quote(folder)))?;
        Ok(())
    }

    /// Run `UID SEARCH` and return the matching UIDs as the server sent them.
    pub fn uid_search(&mut self, criteria: &str) -> Result<Vec<u32>, MailboxError> {
        let resp = self.command(&format!("UID SEARCH {criteria}"))?;
        Ok(parse_search(&resp.lines))
    }

    /// Fetch the full RFC 822 message without setting `\Seen`.
    ///
    /// Returns `None` when the server answered OK but sent no body (the
    /// message was expunged in the meantime).
    pub fn uid_fetch_body(&mut self, uid: u32) -> Result<Option<Vec<u8>>, MailboxError> {
        let resp = self.command(&format!("UID FETCH {uid} BODY.PEEK[]"))?;
        Ok(resp.literals.into_iter().next())
    }

    pub fn uid_mark_seen(&mut self, uid: u32) -> Result<(), MailboxError> {
        self.command(&format!("UID STORE {uid} +FLAGS (\\Seen)"))?;
        Ok(())
    }

    /// Best-effort LOGOUT; errors are ignored.
    pub fn logout(&mut self) {
        let _ = self.command("LOGOUT");
    }

    /// Send one tagged command and collect everything up to its completion.
    pub fn command(&mut self, command: &str) -> Result<Response, MailboxError> {
        let tag = format!("A{}", self.tag_counter);
        self.tag_counter += 1;

        let stream = self.stream.get_mut();
        stream.write_all(format!("{tag} {command}\r\n").as_bytes())?;
        stream.flush()?;

        let mut resp = Response::default();
        loop {
            let line = self.read_line()?;

            if let Some(rest) = line.strip_prefix(tag.as_str())
                && rest.starts_with(' ')
            {
                let status = rest.trim();
                if status.starts_with("OK") {
                    return Ok(resp);
                }
                return Err(MailboxError::Command {
                    command: command_name(command),
                    response: status.to_string(),
                });
            }

            if let Some(len) = literal_length(&line) {
                let literal = self.read_literal(len)?;
                resp.literals.push(literal);
            }
            resp.lines.push(line);
        }
    }

    fn read_line(&mut self) -> Result<String, MailboxError> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf)?;
        if n == 0 {
            return Err(MailboxError::ConnectionClosed);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    fn read_literal(&mut self, len: usize) -> Result<Vec<u8>, MailboxError> {
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf).map_err(|e| {
            if e.kind() == ErrorKind::UnexpectedEof {
                MailboxError::ConnectionClosed
            } else {
                MailboxError::Io(e)
            }
        })?;
        Ok(buf)
    }
}

/// Quote a string for use as an IMAP quoted argument.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
    out
}

/// Size announced by a line ending in `{N}`.
fn literal_length(line: &str) -> Option<usize> {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let inner = trimmed.strip_suffix('}')?;
    let start = inner.rfind('{')?;
    inner[start + 1..].parse().ok()
}

fn parse_search(lines: &[String]) -> Vec<u32> {
    lines
        .iter()
        .filter_map(|l| l.strip_prefix("* SEARCH"))
        .flat_map(|rest| rest.split_whitespace())
        .filter_map(|id| id.parse().ok())
        .collect()
}

/// Command keyword(s) for error messages; never includes arguments.
fn command_name(command: &str) -> String {
    let mut parts = command.split_whitespace();
    match parts.next() {
        Some("UID") => format!("UID {}", parts.next().unwrap_or_default()),
        Some(first) => first.to_string(),
        None => String::new(),
    }
}

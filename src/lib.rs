//! TLDR Digest: newsletter emails in, one summarized notification per issue out.

pub mod config;
pub mod error;
pub mod llm;
pub mod logging;
pub mod mailbox;
pub mod notify;
pub mod pipeline;
pub mod scheduler;

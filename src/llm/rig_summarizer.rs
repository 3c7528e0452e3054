//! Bridges a rig agent to the [`Summarizer`] trait.

use async_trait::async_trait;
use rig::agent::Agent;
use rig::completion::{CompletionModel, Prompt};
use tracing::{error, info};

use super::Summarizer;
use super::prompts::summary_prompt;
use crate::error::LlmError;

/// Summarizer backed by a rig [`Agent`] preconfigured with the system prompt.
pub struct RigSummarizer<M: CompletionModel> {
    agent: Agent<M>,
    provider: String,
    model_name: String,
}

impl<M: CompletionModel> RigSummarizer<M> {
    pub fn new(agent: Agent<M>, provider: &str, model_name: &str) -> Self {
        Self {
            agent,
            provider: provider.to_string(),
            model_name: model_name.to_string(),
        }
    }
}

#[async_trait]
impl<M> Summarizer for RigSummarizer<M>
where
    M: CompletionModel + 'static,
{
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn summarize(&self, subject: &str, body: &str) -> Result<String, LlmError> {
        info!(
            subject = %subject,
            body_length = body.chars().count(),
            model = %self.model_name,
            "Summarizer starting"
        );

        let digest = self
            .agent
            .prompt(summary_prompt(body))
            .await
            .map_err(|e| {
                error!(subject = %subject, error = %e, "Summarizer failed");
                LlmError::RequestFailed {
                    provider: self.provider.clone(),
                    reason: e.to_string(),
                }
            })?;

        if digest.trim().is_empty() {
            return Err(LlmError::EmptyResponse {
                provider: self.provider.clone(),
            });
        }

        info!(
            subject = %subject,
            digest_length = digest.chars().count(),
            "Summarizer complete"
        );
        Ok(digest)
    }
}

//! Run bookkeeping: per-item outcomes and the run report.

use std::fmt;

use uuid::Uuid;

use crate::error::ItemError;

/// What happened to one email within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Sent,
    SummarizationFailed,
    SendFailed,
    SendReturnedFalse,
}

impl ItemOutcome {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::SummarizationFailed => "summarization_failed",
            Self::SendFailed => "send_failed",
            Self::SendReturnedFalse => "send_returned_false",
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

impl From<&ItemError> for ItemOutcome {
    fn from(err: &ItemError) -> Self {
        match err {
            ItemError::Summarize(_) => Self::SummarizationFailed,
            ItemError::Send(_) => Self::SendFailed,
            ItemError::Rejected => Self::SendReturnedFalse,
        }
    }
}

impl fmt::Display for ItemOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary of one completed run (fetch succeeded).
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Outcomes in batch order; one per fetched email.
    pub outcomes: Vec<ItemOutcome>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            outcomes: Vec::new(),
        }
    }

    pub fn fetched(&self) -> usize {
        self.outcomes.len()
    }

    pub fn sent(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_sent()).count()
    }

    pub fn failed(&self) -> usize {
        self.fetched() - self.sent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{LlmError, NotifyError};

    #[test]
    fn outcome_from_item_error() {
        let summarize = ItemError::Summarize(LlmError::EmptyResponse {
            provider: "openai".into(),
        });
        let send = ItemError::Send(NotifyError::SendFailed {
            name: "whatsapp".into(),
            reason: "timeout".into(),
        });
        assert_eq!(ItemOutcome::from(&summarize), ItemOutcome::SummarizationFailed);
        assert_eq!(ItemOutcome::from(&send), ItemOutcome::SendFailed);
        assert_eq!(ItemOutcome::from(&ItemError::Rejected), ItemOutcome::SendReturnedFalse);
    }

    #[test]
    fn report_counts() {
        let mut report = RunReport::new(Uuid::new_v4());
        report.outcomes = vec![
            ItemOutcome::Sent,
            ItemOutcome::SendReturnedFalse,
            ItemOutcome::Sent,
            ItemOutcome::SummarizationFailed,
        ];
        assert_eq!(report.fetched(), 4);
        assert_eq!(report.sent(), 2);
        assert_eq!(report.failed(), 2);
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(ItemOutcome::SendFailed.to_string(), "send_failed");
    }
}

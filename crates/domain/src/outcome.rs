//! Per-message deletion outcomes recorded in the audit log.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teleclean_core::{AppError, ChatId, MessageId};

/// Audited result for one examined message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeVerdict {
    /// Message was deleted on the platform.
    Deleted,
    /// Message was too young to delete.
    Skipped,
    /// Author or channel is exempt.
    Exempted,
    /// Deletion was simulated.
    DryRun,
    /// Deletion was attempted and failed.
    Error,
}

impl OutcomeVerdict {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deleted => "deleted",
            Self::Skipped => "skipped",
            Self::Exempted => "exempted",
            Self::DryRun => "dry_run",
            Self::Error => "error",
        }
    }
}

impl FromStr for OutcomeVerdict {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "deleted" => Ok(Self::Deleted),
            "skipped" => Ok(Self::Skipped),
            "exempted" => Ok(Self::Exempted),
            "dry_run" => Ok(Self::DryRun),
            "error" => Ok(Self::Error),
            _ => Err(AppError::Validation(format!(
                "unknown deletion outcome '{value}'"
            ))),
        }
    }
}

/// Append-only audit entry, one per examined message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletionOutcome {
    /// Examined message.
    pub message_id: MessageId,
    /// Conversation the message belongs to.
    pub chat_id: ChatId,
    /// Result of the examination.
    pub verdict: OutcomeVerdict,
    /// Human readable reason for skips, exemptions and errors.
    pub reason: Option<String>,
    /// Time the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl DeletionOutcome {
    /// Creates an outcome stamped with the current time.
    #[must_use]
    pub fn now(
        chat_id: ChatId,
        message_id: MessageId,
        verdict: OutcomeVerdict,
        reason: Option<String>,
    ) -> Self {
        Self {
            message_id,
            chat_id,
            verdict,
            reason,
            recorded_at: Utc::now(),
        }
    }
}

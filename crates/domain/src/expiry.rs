//! Message expiry thresholds and the per-message exemption rule.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use teleclean_core::{AppError, AppResult, ChatId};

use crate::exemption::ExemptionSet;
use crate::message::{AuthorKind, MessageRef};

/// Age thresholds applied during one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    user_message_age_minutes: u32,
    all_message_age_minutes: u32,
    dry_run: bool,
}

impl ThresholdConfig {
    /// Creates validated thresholds.
    ///
    /// A user threshold longer than the all-messages threshold is allowed;
    /// the all-messages cutoff then governs every message.
    pub fn new(
        user_message_age_minutes: u32,
        all_message_age_minutes: u32,
        dry_run: bool,
    ) -> AppResult<Self> {
        if user_message_age_minutes == 0 {
            return Err(AppError::Validation(
                "user message age threshold must be greater than zero".to_owned(),
            ));
        }

        if all_message_age_minutes == 0 {
            return Err(AppError::Validation(
                "all message age threshold must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            user_message_age_minutes,
            all_message_age_minutes,
            dry_run,
        })
    }

    /// Returns the user message age threshold in minutes.
    #[must_use]
    pub fn user_message_age_minutes(&self) -> u32 {
        self.user_message_age_minutes
    }

    /// Returns the all-messages age threshold in minutes.
    #[must_use]
    pub fn all_message_age_minutes(&self) -> u32 {
        self.all_message_age_minutes
    }

    /// Returns whether deletions are simulated.
    #[must_use]
    pub fn dry_run(&self) -> bool {
        self.dry_run
    }

    /// Computes both cutoffs relative to `now`.
    #[must_use]
    pub fn cutoffs(&self, now: DateTime<Utc>) -> ExpiryCutoffs {
        ExpiryCutoffs {
            user_cutoff: now - Duration::minutes(i64::from(self.user_message_age_minutes)),
            all_cutoff: now - Duration::minutes(i64::from(self.all_message_age_minutes)),
        }
    }
}

/// Timestamp boundaries derived from [`ThresholdConfig`] for one sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryCutoffs {
    /// Messages from users older than this are eligible.
    pub user_cutoff: DateTime<Utc>,
    /// Any message older than this is eligible.
    pub all_cutoff: DateTime<Utc>,
}

impl ExpiryCutoffs {
    /// Returns the latest cutoff, the bound below which any message may be eligible.
    #[must_use]
    pub fn enumeration_cutoff(&self) -> DateTime<Utc> {
        self.user_cutoff.max(self.all_cutoff)
    }
}

/// Classification outcome for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Message is eligible for deletion.
    Delete,
    /// Message is not old enough for its author kind.
    Skip,
    /// Author or channel is exempt regardless of age.
    Exempt,
}

impl Verdict {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Skip => "skip",
            Self::Exempt => "exempt",
        }
    }
}

/// Classifies one message.
///
/// Exemption overrides age. Messages older than `all_cutoff` are deleted for
/// every author kind; messages between the two cutoffs are deleted only when a
/// user wrote them.
#[must_use]
pub fn classify(
    message: &MessageRef,
    chat_id: ChatId,
    exemptions: &ExemptionSet,
    user_cutoff: DateTime<Utc>,
    all_cutoff: DateTime<Utc>,
) -> Verdict {
    if exemptions.covers_author(message.author_id) || exemptions.covers_chat(chat_id) {
        return Verdict::Exempt;
    }

    if message.created_at < all_cutoff {
        return Verdict::Delete;
    }

    if message.created_at < user_cutoff && message.author_kind == AuthorKind::User {
        return Verdict::Delete;
    }

    Verdict::Skip
}

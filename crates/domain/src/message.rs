//! Indexed message references and author kinds.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use teleclean_core::{AppError, MessageId};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    /// Human user account.
    User,
    /// Bot account, including messages sent via inline bots.
    Bot,
    /// Message posted on behalf of a channel or anonymous chat.
    Channel,
}

impl AuthorKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
            Self::Channel => "channel",
        }
    }
}

impl FromStr for AuthorKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "bot" => Ok(Self::Bot),
            "channel" => Ok(Self::Channel),
            _ => Err(AppError::Validation(format!(
                "unknown author kind '{value}'"
            ))),
        }
    }
}

/// Read-only metadata of one platform message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    /// Message identifier inside its conversation.
    pub id: MessageId,
    /// Author user id or sender chat id; unknown for some service messages.
    pub author_id: Option<i64>,
    /// Author category.
    pub author_kind: AuthorKind,
    /// Time the message was sent.
    pub created_at: DateTime<Utc>,
}

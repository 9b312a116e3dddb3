//! Shared primitives for all Rust crates in TeleClean.

#![forbid(unsafe_code)]

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across TeleClean crates.
pub type AppResult<T> = Result<T, AppError>;

/// Platform identifier of one conversation.
///
/// Negative values denote group and channel-like conversations, positive
/// values denote private chats with a user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ChatId(i64);

impl ChatId {
    /// Creates a chat identifier from its raw platform value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw platform value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Returns whether the identifier belongs to a channel-like conversation.
    #[must_use]
    pub fn is_channel_like(&self) -> bool {
        self.0 < 0
    }
}

impl Display for ChatId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Identifier of one message, monotonic inside its conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MessageId(i64);

impl MessageId {
    /// Creates a message identifier from its raw platform value.
    #[must_use]
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw platform value.
    #[must_use]
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input or violated invariant.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The bot is not allowed to access a resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Remote dependency failed after its own retries were exhausted.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns whether the error means the conversation is gone for the bot.
    #[must_use]
    pub fn is_membership_loss(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Forbidden(_))
    }
}

#[cfg(test)]
mod tests {
    use super::{AppError, ChatId};

    #[test]
    fn negative_chat_ids_are_channel_like() {
        assert!(ChatId::new(-1001234567890).is_channel_like());
        assert!(!ChatId::new(42).is_channel_like());
    }

    #[test]
    fn membership_loss_covers_not_found_and_forbidden() {
        assert!(AppError::NotFound("chat".to_owned()).is_membership_loss());
        assert!(AppError::Forbidden("kicked".to_owned()).is_membership_loss());
        assert!(!AppError::Unavailable("timeout".to_owned()).is_membership_loss());
    }
}

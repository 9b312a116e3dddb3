//! Chat kinds, buckets and bot membership states.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use teleclean_core::{AppError, ChatId};

/// Platform conversation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatKind {
    /// One-to-one chat between a user and the bot.
    Private,
    /// Basic group.
    Group,
    /// Supergroup, including groups migrated from basic groups.
    Supergroup,
    /// Broadcast channel.
    Channel,
}

impl ChatKind {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Supergroup => "supergroup",
            Self::Channel => "channel",
        }
    }

    /// Returns the storage bucket that tracks chats of this kind.
    #[must_use]
    pub fn bucket(&self) -> ChatBucket {
        match self {
            Self::Private => ChatBucket::Private,
            Self::Group | Self::Supergroup => ChatBucket::Group,
            Self::Channel => ChatBucket::Channel,
        }
    }

    /// Returns whether the bot needs an explicit delete grant in this kind of chat.
    #[must_use]
    pub fn requires_delete_permission(&self) -> bool {
        !matches!(self, Self::Private)
    }
}

impl FromStr for ChatKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "private" => Ok(Self::Private),
            "group" => Ok(Self::Group),
            "supergroup" => Ok(Self::Supergroup),
            "channel" => Ok(Self::Channel),
            _ => Err(AppError::Validation(format!("unknown chat kind '{value}'"))),
        }
    }
}

/// Storage partition for tracked chats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatBucket {
    /// Private chats with users.
    Private,
    /// Groups and supergroups.
    Group,
    /// Channels.
    Channel,
}

impl ChatBucket {
    /// Returns stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Group => "group",
            Self::Channel => "channel",
        }
    }
}

impl FromStr for ChatBucket {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "private" => Ok(Self::Private),
            "group" => Ok(Self::Group),
            "channel" => Ok(Self::Channel),
            _ => Err(AppError::Validation(format!(
                "unknown chat bucket '{value}'"
            ))),
        }
    }
}

/// Tracked conversation the bot is (or was) a member of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationRef {
    id: ChatId,
    kind: ChatKind,
    active: bool,
}

impl ConversationRef {
    /// Creates a conversation reference.
    #[must_use]
    pub fn new(id: ChatId, kind: ChatKind, active: bool) -> Self {
        Self { id, kind, active }
    }

    /// Creates an active conversation reference.
    #[must_use]
    pub fn active(id: ChatId, kind: ChatKind) -> Self {
        Self::new(id, kind, true)
    }

    /// Returns the platform chat identifier.
    #[must_use]
    pub fn id(&self) -> ChatId {
        self.id
    }

    /// Returns the conversation kind.
    #[must_use]
    pub fn kind(&self) -> ChatKind {
        self.kind
    }

    /// Returns whether the bot is still a member.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Bot membership status reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    /// Chat owner.
    Creator,
    /// Administrator with some rights.
    Administrator,
    /// Regular member.
    Member,
    /// Member with restrictions.
    Restricted,
    /// Left the chat.
    Left,
    /// Removed by an administrator.
    Kicked,
}

impl MembershipStatus {
    /// Returns stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creator => "creator",
            Self::Administrator => "administrator",
            Self::Member => "member",
            Self::Restricted => "restricted",
            Self::Left => "left",
            Self::Kicked => "kicked",
        }
    }

    /// Returns whether the status means the bot joined the chat.
    #[must_use]
    pub fn is_joined(&self) -> bool {
        matches!(self, Self::Creator | Self::Administrator | Self::Member)
    }

    /// Returns whether the status means the bot is no longer in the chat.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Left | Self::Kicked)
    }

    /// Returns whether the status carries administrator rights.
    #[must_use]
    pub fn is_administrator(&self) -> bool {
        matches!(self, Self::Creator | Self::Administrator)
    }
}

impl FromStr for MembershipStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "creator" => Ok(Self::Creator),
            "administrator" => Ok(Self::Administrator),
            "member" => Ok(Self::Member),
            "restricted" => Ok(Self::Restricted),
            "left" => Ok(Self::Left),
            "kicked" => Ok(Self::Kicked),
            _ => Err(AppError::Validation(format!(
                "unknown membership status '{value}'"
            ))),
        }
    }
}

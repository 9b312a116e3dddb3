use async_trait::async_trait;
use teleclean_core::{AppResult, ChatId};
use teleclean_domain::{ChatKind, MembershipStatus, MessageRef};

/// Platform update relevant to tracking and expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatUpdate {
    /// A message was posted in a chat the bot can see.
    MessageSeen {
        /// Chat the message belongs to.
        chat_id: ChatId,
        /// Message metadata.
        message: MessageRef,
    },
    /// The bot's own membership changed.
    MembershipChanged {
        /// Affected chat.
        chat_id: ChatId,
        /// Chat type reported with the update.
        kind: ChatKind,
        /// New bot status.
        status: MembershipStatus,
    },
}

/// One polled batch of updates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateBatch {
    /// Updates the application cares about, in delivery order.
    pub updates: Vec<ChatUpdate>,
    /// Offset acknowledging this batch, `None` when nothing was delivered.
    pub next_offset: Option<i64>,
}

/// Port for receiving platform updates.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Fetches updates after `offset`, waiting up to the source's poll timeout.
    async fn poll_updates(&self, offset: Option<i64>) -> AppResult<UpdateBatch>;
}

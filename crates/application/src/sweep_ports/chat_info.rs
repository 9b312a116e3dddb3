use async_trait::async_trait;
use teleclean_core::{AppResult, ChatId};
use teleclean_domain::{ConversationRef, MembershipStatus};

/// Result of resolving one chat on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatLookup {
    /// Chat exists and the bot can see it.
    Found(ConversationRef),
    /// Group was upgraded to a supergroup under a new identifier.
    Migrated {
        /// Identifier of the supergroup.
        to: ChatId,
    },
}

/// Bot rights inside one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BotPermissions {
    /// Bot membership status.
    pub status: MembershipStatus,
    /// Whether the bot may delete messages of other members.
    pub can_delete: bool,
}

/// Platform port for chat metadata.
///
/// Membership loss surfaces as `AppError::NotFound` or `AppError::Forbidden`;
/// timeouts surface as `AppError::Unavailable`.
#[async_trait]
pub trait ChatInfoProvider: Send + Sync {
    /// Resolves chat metadata.
    async fn get_chat(&self, chat_id: ChatId) -> AppResult<ChatLookup>;

    /// Returns the bot's own rights in the chat.
    async fn get_bot_permissions(&self, chat_id: ChatId) -> AppResult<BotPermissions>;
}

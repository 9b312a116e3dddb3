use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use teleclean_core::{AppResult, ChatId, MessageId};
use teleclean_domain::MessageRef;

/// Lazy, finite sequence of candidate messages.
pub type MessageStream = BoxStream<'static, AppResult<MessageRef>>;

/// Port for enumerating message metadata of one chat.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Streams messages sent before `cutoff`, oldest first when the source can order them.
    ///
    /// Every call starts a fresh enumeration.
    async fn list_messages_older_than(
        &self,
        chat_id: ChatId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<MessageStream>;
}

/// Write side of a message index fed by observed updates.
#[async_trait]
pub trait MessageIndexWriter: Send + Sync {
    /// Records message metadata; recording the same message twice is a no-op.
    async fn record_message(&self, chat_id: ChatId, message: &MessageRef) -> AppResult<()>;

    /// Drops a message that no longer exists on the platform.
    async fn forget_message(&self, chat_id: ChatId, message_id: MessageId) -> AppResult<()>;

    /// Counts one refused deletion and returns the message's refusal total.
    ///
    /// Returns `0` when the message is not indexed.
    async fn record_delete_refusal(&self, chat_id: ChatId, message_id: MessageId)
    -> AppResult<u32>;

    /// Drops every indexed message of a chat and returns how many were removed.
    async fn forget_chat(&self, chat_id: ChatId) -> AppResult<u64>;
}

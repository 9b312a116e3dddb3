use async_trait::async_trait;
use teleclean_core::{AppResult, ChatId};
use teleclean_domain::{ChatKind, ConversationRef};

/// Persistence port for tracked chat records.
///
/// Records are never physically removed; membership loss only flips the
/// active flag. Both mark operations must be idempotent.
#[async_trait]
pub trait ChatRegistry: Send + Sync {
    /// Lists every chat currently marked active.
    async fn list_active_chats(&self) -> AppResult<Vec<ConversationRef>>;

    /// Marks a chat active, creating the record on first sight.
    async fn mark_active(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()>;

    /// Marks a chat inactive; a missing or already inactive record is a no-op.
    async fn mark_inactive(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()>;
}

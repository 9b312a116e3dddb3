use async_trait::async_trait;
use teleclean_core::{ChatId, MessageId};
use thiserror::Error;

/// Failure of one platform delete request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeleteMessageError {
    /// Message no longer exists.
    #[error("message already gone: {0}")]
    AlreadyGone(String),

    /// Bot may not delete this particular message.
    #[error("deletion forbidden: {0}")]
    Forbidden(String),

    /// Request kept failing after the transport's own retries.
    #[error("transient failure: {0}")]
    Transient(String),

    /// Bot lost access to the whole chat mid-sweep.
    #[error("chat lost: {0}")]
    ChatLost(String),
}

impl DeleteMessageError {
    /// Returns whether the sweep of the current chat must stop.
    #[must_use]
    pub fn is_conversation_fatal(&self) -> bool {
        matches!(self, Self::ChatLost(_))
    }

    /// Returns whether the failure extends the consecutive failure streak.
    #[must_use]
    pub fn counts_toward_abort(&self) -> bool {
        matches!(self, Self::Forbidden(_) | Self::Transient(_))
    }
}

/// Platform port for deleting messages.
#[async_trait]
pub trait MessageDeleter: Send + Sync {
    /// Deletes one message.
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DeleteMessageError>;
}

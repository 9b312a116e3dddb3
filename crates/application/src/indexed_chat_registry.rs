//! Chat registry decorator that clears the message index of departed chats.

use std::sync::Arc;

use async_trait::async_trait;
use teleclean_core::{AppResult, ChatId};
use teleclean_domain::{ChatKind, ConversationRef};
use tracing::{info, warn};

use crate::sweep_ports::{ChatRegistry, MessageIndexWriter};

/// Registry that forgets a chat's indexed messages when it becomes inactive.
#[derive(Clone)]
pub struct IndexedChatRegistry {
    inner: Arc<dyn ChatRegistry>,
    message_index: Arc<dyn MessageIndexWriter>,
}

impl IndexedChatRegistry {
    /// Wraps a registry.
    #[must_use]
    pub fn new(inner: Arc<dyn ChatRegistry>, message_index: Arc<dyn MessageIndexWriter>) -> Self {
        Self {
            inner,
            message_index,
        }
    }
}

#[async_trait]
impl ChatRegistry for IndexedChatRegistry {
    async fn list_active_chats(&self) -> AppResult<Vec<ConversationRef>> {
        self.inner.list_active_chats().await
    }

    async fn mark_active(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        self.inner.mark_active(chat_id, kind).await
    }

    async fn mark_inactive(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        self.inner.mark_inactive(chat_id, kind).await?;

        match self.message_index.forget_chat(chat_id).await {
            Ok(0) => {}
            Ok(forgotten) => info!(
                chat_id = %chat_id,
                forgotten,
                "cleared message index of inactive chat"
            ),
            Err(error) => warn!(
                chat_id = %chat_id,
                error = %error,
                "failed to clear message index of inactive chat"
            ),
        }

        Ok(())
    }
}

use std::collections::BTreeMap;

use async_trait::async_trait;
use teleclean_application::ChatRegistry;
use teleclean_core::{AppResult, ChatId};
use teleclean_domain::{ChatBucket, ChatKind, ConversationRef};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy)]
struct TrackedChat {
    kind: ChatKind,
    active: bool,
}

/// In-memory chat registry adapter, keyed by storage bucket and chat id.
#[derive(Default)]
pub struct InMemoryChatRegistry {
    chats: RwLock<BTreeMap<(ChatBucket, ChatId), TrackedChat>>,
}

impl InMemoryChatRegistry {
    /// Creates an empty in-memory chat registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRegistry for InMemoryChatRegistry {
    async fn list_active_chats(&self) -> AppResult<Vec<ConversationRef>> {
        Ok(self
            .chats
            .read()
            .await
            .iter()
            .filter(|(_, chat)| chat.active)
            .map(|((_, chat_id), chat)| ConversationRef::active(*chat_id, chat.kind))
            .collect())
    }

    async fn mark_active(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        self.chats
            .write()
            .await
            .insert((kind.bucket(), chat_id), TrackedChat { kind, active: true });
        Ok(())
    }

    async fn mark_inactive(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        if let Some(chat) = self
            .chats
            .write()
            .await
            .get_mut(&(kind.bucket(), chat_id))
        {
            chat.active = false;
        }
        Ok(())
    }
}

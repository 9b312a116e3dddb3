//! Keeps the message index in step with deletions.

use std::sync::Arc;

use async_trait::async_trait;
use teleclean_core::{ChatId, MessageId};
use tracing::{info, warn};

use crate::sweep_ports::{DeleteMessageError, MessageDeleter, MessageIndexWriter};

/// Refusals after which a message is dropped from the index.
pub const DEFAULT_MAX_DELETE_REFUSALS: u32 = 2;

/// Deleter that drops messages from the index once they are gone.
///
/// A message the platform keeps refusing to delete is dropped after
/// `max_refusals` refusals so it stops heading every listing.
#[derive(Clone)]
pub struct IndexedMessageDeleter {
    inner: Arc<dyn MessageDeleter>,
    message_index: Arc<dyn MessageIndexWriter>,
    max_refusals: u32,
}

impl IndexedMessageDeleter {
    /// Wraps a platform deleter.
    #[must_use]
    pub fn new(inner: Arc<dyn MessageDeleter>, message_index: Arc<dyn MessageIndexWriter>) -> Self {
        Self {
            inner,
            message_index,
            max_refusals: DEFAULT_MAX_DELETE_REFUSALS,
        }
    }

    /// Sets how many refusals drop a message from the index. `0` keeps refused messages.
    #[must_use]
    pub fn with_max_refusals(mut self, max_refusals: u32) -> Self {
        self.max_refusals = max_refusals;
        self
    }

    async fn forget(&self, chat_id: ChatId, message_id: MessageId) {
        if let Err(error) = self.message_index.forget_message(chat_id, message_id).await {
            warn!(
                chat_id = %chat_id,
                message_id = %message_id,
                error = %error,
                "failed to drop deleted message from index"
            );
        }
    }

    async fn count_refusal(&self, chat_id: ChatId, message_id: MessageId) {
        if self.max_refusals == 0 {
            return;
        }

        let refusals = match self
            .message_index
            .record_delete_refusal(chat_id, message_id)
            .await
        {
            Ok(refusals) => refusals,
            Err(error) => {
                warn!(
                    chat_id = %chat_id,
                    message_id = %message_id,
                    error = %error,
                    "failed to count refused deletion"
                );
                return;
            }
        };

        if refusals >= self.max_refusals {
            info!(
                chat_id = %chat_id,
                message_id = %message_id,
                refusals,
                "dropping undeletable message from index"
            );
            self.forget(chat_id, message_id).await;
        }
    }
}

#[async_trait]
impl MessageDeleter for IndexedMessageDeleter {
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DeleteMessageError> {
        let result = self.inner.delete_message(chat_id, message_id).await;

        match &result {
            Ok(()) | Err(DeleteMessageError::AlreadyGone(_)) => {
                self.forget(chat_id, message_id).await;
            }
            Err(DeleteMessageError::Forbidden(_)) => {
                self.count_refusal(chat_id, message_id).await;
            }
            Err(DeleteMessageError::Transient(_) | DeleteMessageError::ChatLost(_)) => {}
        }

        result
    }
}

//! Feeds platform updates into the chat registry and message index.

use std::sync::Arc;

use teleclean_core::AppResult;
use tracing::{debug, warn};

use crate::membership_service::MembershipService;
use crate::sweep_ports::{ChatUpdate, MessageIndexWriter, UpdateSource};

/// Polls updates and applies them to local state.
#[derive(Clone)]
pub struct UpdateIngestService {
    update_source: Arc<dyn UpdateSource>,
    membership_service: MembershipService,
    message_index: Arc<dyn MessageIndexWriter>,
}

impl UpdateIngestService {
    /// Creates a new update ingest service.
    #[must_use]
    pub fn new(
        update_source: Arc<dyn UpdateSource>,
        membership_service: MembershipService,
        message_index: Arc<dyn MessageIndexWriter>,
    ) -> Self {
        Self {
            update_source,
            membership_service,
            message_index,
        }
    }

    /// Polls one batch and applies it, returning the offset for the next poll.
    ///
    /// A failure to apply a single update is logged and the batch is still
    /// acknowledged; only a failed poll is returned.
    pub async fn poll_once(&self, offset: Option<i64>) -> AppResult<Option<i64>> {
        let batch = self.update_source.poll_updates(offset).await?;

        for update in &batch.updates {
            if let Err(error) = self.apply(update).await {
                warn!(error = %error, "failed to apply chat update");
            }
        }

        if !batch.updates.is_empty() {
            debug!(count = batch.updates.len(), "applied chat updates");
        }

        Ok(batch.next_offset.or(offset))
    }

    /// Applies one update.
    pub async fn apply(&self, update: &ChatUpdate) -> AppResult<()> {
        match update {
            ChatUpdate::MessageSeen { chat_id, message } => {
                self.message_index.record_message(*chat_id, message).await
            }
            ChatUpdate::MembershipChanged {
                chat_id,
                kind,
                status,
            } => self
                .membership_service
                .record_membership_change(*chat_id, *kind, *status)
                .await
                .map(|_| ()),
        }
    }
}

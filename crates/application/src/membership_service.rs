//! Chat registry maintenance driven by membership updates and verification.

use std::sync::Arc;

use teleclean_core::{AppError, AppResult, ChatId};
use teleclean_domain::{ChatKind, ConversationRef, MembershipStatus};
use tracing::{info, warn};

use crate::sweep_ports::{ChatInfoProvider, ChatLookup, ChatRegistry};

/// Registry change caused by one membership update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    /// Chat is now tracked as active.
    Joined,
    /// Chat is now tracked as inactive.
    Left,
    /// Status does not affect tracking.
    Unchanged,
}

/// Result of verifying every tracked chat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatVerificationSummary {
    /// Chats that remain active.
    pub valid: u64,
    /// Chats that were deactivated.
    pub removed: u64,
}

/// Keeps the chat registry in line with the bot's actual memberships.
#[derive(Clone)]
pub struct MembershipService {
    chat_registry: Arc<dyn ChatRegistry>,
    chat_info: Arc<dyn ChatInfoProvider>,
}

enum Verification {
    Valid,
    Removed,
}

impl MembershipService {
    /// Creates a new membership service.
    #[must_use]
    pub fn new(chat_registry: Arc<dyn ChatRegistry>, chat_info: Arc<dyn ChatInfoProvider>) -> Self {
        Self {
            chat_registry,
            chat_info,
        }
    }

    /// Applies a bot membership update to the registry.
    pub async fn record_membership_change(
        &self,
        chat_id: ChatId,
        kind: ChatKind,
        status: MembershipStatus,
    ) -> AppResult<MembershipChange> {
        if status.is_joined() {
            self.record_joined(chat_id, kind).await?;
            return Ok(MembershipChange::Joined);
        }

        if status.is_gone() {
            self.record_left(chat_id, kind).await?;
            return Ok(MembershipChange::Left);
        }

        Ok(MembershipChange::Unchanged)
    }

    /// Starts tracking a chat the bot joined.
    pub async fn record_joined(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        info!(chat_id = %chat_id, kind = kind.as_str(), "bot joined chat");
        self.chat_registry.mark_active(chat_id, kind).await
    }

    /// Stops tracking a chat the bot left or was removed from.
    pub async fn record_left(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        info!(chat_id = %chat_id, kind = kind.as_str(), "bot left chat");
        self.chat_registry.mark_inactive(chat_id, kind).await
    }

    /// Re-checks every active chat against the platform.
    ///
    /// Chats are only deactivated on definite membership loss; transient
    /// lookup failures keep them active.
    pub async fn verify_chats(&self) -> AppResult<ChatVerificationSummary> {
        let chats = self.chat_registry.list_active_chats().await?;
        let mut summary = ChatVerificationSummary::default();

        for chat in &chats {
            match self.verify_chat(chat).await? {
                Verification::Valid => summary.valid += 1,
                Verification::Removed => summary.removed += 1,
            }
        }

        info!(
            valid = summary.valid,
            removed = summary.removed,
            "chat verification finished"
        );

        Ok(summary)
    }

    async fn verify_chat(&self, chat: &ConversationRef) -> AppResult<Verification> {
        let chat_id = chat.id();

        let kind = match self.chat_info.get_chat(chat_id).await {
            Ok(ChatLookup::Found(resolved)) if resolved.kind() != chat.kind() => {
                info!(
                    chat_id = %chat_id,
                    from = chat.kind().as_str(),
                    to = resolved.kind().as_str(),
                    "chat kind changed"
                );
                self.chat_registry
                    .mark_inactive(chat_id, chat.kind())
                    .await?;
                self.chat_registry
                    .mark_active(chat_id, resolved.kind())
                    .await?;
                resolved.kind()
            }
            Ok(ChatLookup::Found(resolved)) => resolved.kind(),
            Ok(ChatLookup::Migrated { to }) => return self.verify_migration(chat, to).await,
            Err(error) if error.is_membership_loss() => {
                return self.remove(chat_id, chat.kind(), &error).await;
            }
            Err(error) => {
                warn!(chat_id = %chat_id, error = %error, "chat lookup failed, keeping chat");
                return Ok(Verification::Valid);
            }
        };

        if !kind.requires_delete_permission() {
            return Ok(Verification::Valid);
        }

        match self.chat_info.get_bot_permissions(chat_id).await {
            Ok(permissions) if permissions.status.is_administrator() => Ok(Verification::Valid),
            Ok(permissions) => {
                let reason = AppError::Forbidden(format!(
                    "bot is '{}' instead of administrator",
                    permissions.status.as_str()
                ));
                self.remove(chat_id, kind, &reason).await
            }
            Err(error) if error.is_membership_loss() => self.remove(chat_id, kind, &error).await,
            Err(error) => {
                warn!(
                    chat_id = %chat_id,
                    error = %error,
                    "permission lookup failed, keeping chat"
                );
                Ok(Verification::Valid)
            }
        }
    }

    async fn verify_migration(&self, chat: &ConversationRef, to: ChatId) -> AppResult<Verification> {
        info!(chat_id = %chat.id(), migrated_to = %to, "chat migrated to supergroup");
        self.chat_registry
            .mark_inactive(chat.id(), chat.kind())
            .await?;

        match self.chat_info.get_chat(to).await {
            Ok(ChatLookup::Found(resolved)) => {
                self.chat_registry.mark_active(to, resolved.kind()).await?;
                Ok(Verification::Valid)
            }
            Ok(ChatLookup::Migrated { .. }) => Ok(Verification::Removed),
            Err(error) if error.is_membership_loss() => Ok(Verification::Removed),
            Err(error) => {
                warn!(chat_id = %to, error = %error, "migrated chat lookup failed, tracking anyway");
                self.chat_registry
                    .mark_active(to, ChatKind::Supergroup)
                    .await?;
                Ok(Verification::Valid)
            }
        }
    }

    async fn remove(
        &self,
        chat_id: ChatId,
        kind: ChatKind,
        reason: &AppError,
    ) -> AppResult<Verification> {
        info!(chat_id = %chat_id, kind = kind.as_str(), reason = %reason, "removing chat");
        self.chat_registry.mark_inactive(chat_id, kind).await?;
        Ok(Verification::Removed)
    }
}

//! Per-chat expiry sweep.

use std::sync::Arc;

use futures::StreamExt;
use teleclean_core::{AppError, ChatId, MessageId};
use teleclean_domain::{
    ChatKind, ChatStats, ConversationRef, DeletionOutcome, ExpiryCutoffs, MessageRef,
    OutcomeVerdict, Verdict, classify,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::sweep_ports::{
    ChatInfoProvider, ChatLookup, ChatRegistry, DeleteMessageError, DeletionLogSink,
    MessageDeleter, MessageSource, SweepConfig,
};

/// Default number of consecutive failed deletions that aborts a chat.
pub const DEFAULT_MAX_CONSECUTIVE_DELETE_FAILURES: u32 = 3;

/// Why a chat sweep stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatSweepEnd {
    /// Every candidate message was examined.
    Completed,
    /// Chat is gone or forbids the bot; the record was deactivated.
    MembershipLost,
    /// Group moved to a supergroup; the new id is tracked from now on.
    Migrated {
        /// Identifier of the supergroup.
        to: ChatId,
    },
    /// Bot lacks the delete right; nothing was attempted.
    MissingDeletePermission,
    /// Too many deletions in a row failed.
    AbortedAfterFailures,
    /// Bot lost the chat while deleting.
    ChatLost,
}

impl ChatSweepEnd {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::MembershipLost => "membership_lost",
            Self::Migrated { .. } => "migrated",
            Self::MissingDeletePermission => "missing_delete_permission",
            Self::AbortedAfterFailures => "aborted_after_failures",
            Self::ChatLost => "chat_lost",
        }
    }
}

/// Counters and stop reason for one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatSweepReport {
    /// Counters accumulated for the chat.
    pub stats: ChatStats,
    /// Why the sweep stopped.
    pub end: ChatSweepEnd,
}

/// Chat sweep that stopped on an unexpected error, with the work done so far.
#[derive(Debug, Error)]
#[error("sweep of chat {chat_id} failed after {} message(s): {error}", .partial.total_messages)]
pub struct ChatSweepFailure {
    /// Chat being swept.
    pub chat_id: ChatId,
    /// Counters accumulated before the failure.
    pub partial: ChatStats,
    /// Underlying error.
    #[source]
    pub error: AppError,
}

/// Sweeps expired messages of one chat.
#[derive(Clone)]
pub struct ChatSweeper {
    chat_info: Arc<dyn ChatInfoProvider>,
    message_source: Arc<dyn MessageSource>,
    message_deleter: Arc<dyn MessageDeleter>,
    chat_registry: Arc<dyn ChatRegistry>,
    deletion_log: Arc<dyn DeletionLogSink>,
    max_consecutive_failures: u32,
}

struct MessageDisposition {
    verdict: OutcomeVerdict,
    reason: Option<String>,
    failure: Option<DeleteMessageError>,
}

impl MessageDisposition {
    fn recorded(verdict: OutcomeVerdict, reason: Option<&str>) -> Self {
        Self {
            verdict,
            reason: reason.map(ToOwned::to_owned),
            failure: None,
        }
    }
}

impl ChatSweeper {
    /// Creates a sweeper with the default failure streak limit.
    #[must_use]
    pub fn new(
        chat_info: Arc<dyn ChatInfoProvider>,
        message_source: Arc<dyn MessageSource>,
        message_deleter: Arc<dyn MessageDeleter>,
        chat_registry: Arc<dyn ChatRegistry>,
        deletion_log: Arc<dyn DeletionLogSink>,
    ) -> Self {
        Self {
            chat_info,
            message_source,
            message_deleter,
            chat_registry,
            deletion_log,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_DELETE_FAILURES,
        }
    }

    /// Sets how many consecutive failed deletions abort a chat; `0` never aborts.
    #[must_use]
    pub fn with_max_consecutive_failures(mut self, max_consecutive_failures: u32) -> Self {
        self.max_consecutive_failures = max_consecutive_failures;
        self
    }

    /// Sweeps one chat.
    ///
    /// Per-message failures are counted, never returned. An error carries the
    /// partial counters accumulated before the chat became unusable.
    pub async fn sweep(
        &self,
        chat: &ConversationRef,
        config: &SweepConfig,
        cutoffs: &ExpiryCutoffs,
    ) -> Result<ChatSweepReport, ChatSweepFailure> {
        let chat_id = chat.id();
        let failure = |partial: ChatStats, error: AppError| ChatSweepFailure {
            chat_id,
            partial,
            error,
        };

        let kind = match self.chat_info.get_chat(chat_id).await {
            Ok(ChatLookup::Found(resolved)) => resolved.kind(),
            Ok(ChatLookup::Migrated { to }) => {
                return self
                    .follow_migration(chat, to)
                    .await
                    .map_err(|error| failure(ChatStats::zero(), error));
            }
            Err(error) if error.is_membership_loss() => {
                return self
                    .drop_chat(chat, &error)
                    .await
                    .map_err(|error| failure(ChatStats::zero(), error));
            }
            Err(error) => return Err(failure(ChatStats::zero(), error)),
        };

        if kind.requires_delete_permission() {
            match self.chat_info.get_bot_permissions(chat_id).await {
                Ok(permissions) if permissions.can_delete => {}
                Ok(permissions) => {
                    warn!(
                        chat_id = %chat_id,
                        status = permissions.status.as_str(),
                        "bot lacks delete permission, skipping chat"
                    );
                    return Ok(ChatSweepReport {
                        stats: ChatStats::zero(),
                        end: ChatSweepEnd::MissingDeletePermission,
                    });
                }
                Err(error) if error.is_membership_loss() => {
                    return self
                        .drop_chat(chat, &error)
                        .await
                        .map_err(|error| failure(ChatStats::zero(), error));
                }
                Err(error) => return Err(failure(ChatStats::zero(), error)),
            }
        }

        let mut messages = self
            .message_source
            .list_messages_older_than(chat_id, cutoffs.enumeration_cutoff())
            .await
            .map_err(|error| failure(ChatStats::zero(), error))?;

        let mut stats = ChatStats::zero();
        let mut failure_streak = 0_u32;

        while let Some(next) = messages.next().await {
            let message = match next {
                Ok(message) => message,
                Err(error) => return Err(failure(stats, error)),
            };

            let disposition = self
                .examine_message(chat_id, &message, config, cutoffs)
                .await;
            stats.record(disposition.verdict);
            self.append_outcome(DeletionOutcome::now(
                chat_id,
                message.id,
                disposition.verdict,
                disposition.reason,
            ))
            .await;

            match disposition.failure {
                None => failure_streak = 0,
                Some(error) if error.is_conversation_fatal() => {
                    warn!(
                        chat_id = %chat_id,
                        message_id = %message.id,
                        error = %error,
                        "lost chat while deleting, stopping sweep"
                    );
                    if let Err(mark_error) = self
                        .chat_registry
                        .mark_inactive(chat_id, chat.kind())
                        .await
                    {
                        warn!(
                            chat_id = %chat_id,
                            error = %mark_error,
                            "failed to deactivate lost chat"
                        );
                    }
                    return Ok(Self::finish(chat_id, stats, ChatSweepEnd::ChatLost));
                }
                Some(error) if error.counts_toward_abort() => {
                    failure_streak = failure_streak.saturating_add(1);
                    if self.max_consecutive_failures > 0
                        && failure_streak >= self.max_consecutive_failures
                    {
                        warn!(
                            chat_id = %chat_id,
                            failure_streak,
                            "consecutive deletions failed, aborting chat"
                        );
                        return Ok(Self::finish(
                            chat_id,
                            stats,
                            ChatSweepEnd::AbortedAfterFailures,
                        ));
                    }
                }
                Some(_) => failure_streak = 0,
            }
        }

        Ok(Self::finish(chat_id, stats, ChatSweepEnd::Completed))
    }

    async fn examine_message(
        &self,
        chat_id: ChatId,
        message: &MessageRef,
        config: &SweepConfig,
        cutoffs: &ExpiryCutoffs,
    ) -> MessageDisposition {
        let verdict = classify(
            message,
            chat_id,
            &config.exemptions,
            cutoffs.user_cutoff,
            cutoffs.all_cutoff,
        );

        match verdict {
            Verdict::Exempt => {
                debug!(chat_id = %chat_id, message_id = %message.id, "message is exempt");
                MessageDisposition::recorded(OutcomeVerdict::Exempted, Some("exempt author or chat"))
            }
            Verdict::Skip => {
                MessageDisposition::recorded(OutcomeVerdict::Skipped, Some("not old enough"))
            }
            Verdict::Delete if config.thresholds.dry_run() => {
                info!(
                    chat_id = %chat_id,
                    message_id = %message.id,
                    dry_run = true,
                    "would delete message"
                );
                MessageDisposition::recorded(OutcomeVerdict::DryRun, None)
            }
            Verdict::Delete => self.delete(chat_id, message.id).await,
        }
    }

    async fn delete(&self, chat_id: ChatId, message_id: MessageId) -> MessageDisposition {
        match self
            .message_deleter
            .delete_message(chat_id, message_id)
            .await
        {
            Ok(()) => MessageDisposition::recorded(OutcomeVerdict::Deleted, None),
            Err(error) => {
                warn!(
                    chat_id = %chat_id,
                    message_id = %message_id,
                    error = %error,
                    "failed to delete message"
                );
                MessageDisposition {
                    verdict: OutcomeVerdict::Error,
                    reason: Some(error.to_string()),
                    failure: Some(error),
                }
            }
        }
    }

    async fn append_outcome(&self, outcome: DeletionOutcome) {
        let chat_id = outcome.chat_id;
        let message_id = outcome.message_id;
        if let Err(error) = self.deletion_log.append(outcome).await {
            warn!(
                chat_id = %chat_id,
                message_id = %message_id,
                error = %error,
                "failed to append deletion outcome"
            );
        }
    }

    async fn drop_chat(
        &self,
        chat: &ConversationRef,
        cause: &AppError,
    ) -> Result<ChatSweepReport, AppError> {
        info!(
            chat_id = %chat.id(),
            kind = chat.kind().as_str(),
            cause = %cause,
            "bot is no longer in chat, deactivating"
        );
        self.chat_registry
            .mark_inactive(chat.id(), chat.kind())
            .await?;

        Ok(ChatSweepReport {
            stats: ChatStats::zero(),
            end: ChatSweepEnd::MembershipLost,
        })
    }

    async fn follow_migration(
        &self,
        chat: &ConversationRef,
        to: ChatId,
    ) -> Result<ChatSweepReport, AppError> {
        info!(chat_id = %chat.id(), migrated_to = %to, "chat migrated to supergroup");
        self.chat_registry
            .mark_inactive(chat.id(), chat.kind())
            .await?;
        self.chat_registry
            .mark_active(to, ChatKind::Supergroup)
            .await?;

        Ok(ChatSweepReport {
            stats: ChatStats::zero(),
            end: ChatSweepEnd::Migrated { to },
        })
    }

    fn finish(chat_id: ChatId, stats: ChatStats, end: ChatSweepEnd) -> ChatSweepReport {
        info!(
            chat_id = %chat_id,
            end = end.as_str(),
            total = stats.total_messages,
            deleted = stats.deleted_messages,
            skipped = stats.skipped_messages,
            exempt = stats.exempt_messages,
            errors = stats.error_messages,
            "chat sweep finished"
        );

        ChatSweepReport { stats, end }
    }
}

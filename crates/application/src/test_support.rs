use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use futures::StreamExt;
use tokio::sync::Mutex;

use teleclean_core::{AppError, AppResult, ChatId, MessageId};
use teleclean_domain::{
    AuthorKind, ChatKind, ConversationRef, DeletionOutcome, ExemptionSet, MembershipStatus,
    MessageRef, ThresholdConfig,
};

use crate::sweep_ports::{
    BotPermissions, ChatInfoProvider, ChatLookup, ChatRegistry, DeleteMessageError,
    DeletionLogSink, MessageDeleter, MessageIndexWriter, MessageSource, MessageStream,
    OperatorAlert, OperatorAlertSink, ProgressSink, RateLimitGauge, SweepConfig, SweepLease,
    SweepLeaseCoordinator, SweepProgress,
};

pub(crate) fn fixed_now() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
        .map(|value| value.with_timezone(&Utc))
        .unwrap_or_else(|_| unreachable!())
}

pub(crate) fn config(user_minutes: u32, all_minutes: u32, dry_run: bool) -> SweepConfig {
    SweepConfig {
        thresholds: ThresholdConfig::new(user_minutes, all_minutes, dry_run)
            .unwrap_or_else(|_| unreachable!()),
        exemptions: ExemptionSet::default(),
    }
}

pub(crate) fn message(
    id: i64,
    author_id: i64,
    author_kind: AuthorKind,
    age_minutes: i64,
) -> MessageRef {
    MessageRef {
        id: MessageId::new(id),
        author_id: Some(author_id),
        author_kind,
        created_at: fixed_now() - Duration::minutes(age_minutes),
    }
}

#[derive(Clone, Copy)]
pub(crate) enum ChatScript {
    Found(ChatKind),
    Migrated(ChatId),
    Gone,
    Unavailable,
}

#[derive(Default)]
pub(crate) struct FakeChatInfo {
    pub(crate) chats: Mutex<HashMap<ChatId, ChatScript>>,
    pub(crate) permissions: Mutex<HashMap<ChatId, BotPermissions>>,
    pub(crate) forbidden: Mutex<HashSet<ChatId>>,
}

impl FakeChatInfo {
    pub(crate) async fn script(&self, chat_id: ChatId, script: ChatScript) {
        self.chats.lock().await.insert(chat_id, script);
    }

    pub(crate) async fn grant(&self, chat_id: ChatId, status: MembershipStatus, can_delete: bool) {
        self.permissions
            .lock()
            .await
            .insert(chat_id, BotPermissions { status, can_delete });
    }

    pub(crate) async fn forbid(&self, chat_id: ChatId) {
        self.forbidden.lock().await.insert(chat_id);
    }
}

#[async_trait]
impl ChatInfoProvider for FakeChatInfo {
    async fn get_chat(&self, chat_id: ChatId) -> AppResult<ChatLookup> {
        let script = self.chats.lock().await.get(&chat_id).copied();
        match script {
            Some(ChatScript::Found(kind)) => {
                Ok(ChatLookup::Found(ConversationRef::active(chat_id, kind)))
            }
            Some(ChatScript::Migrated(to)) => Ok(ChatLookup::Migrated { to }),
            Some(ChatScript::Gone) | None => {
                Err(AppError::NotFound(format!("chat {chat_id} not found")))
            }
            Some(ChatScript::Unavailable) => Err(AppError::Unavailable("timed out".to_owned())),
        }
    }

    async fn get_bot_permissions(&self, chat_id: ChatId) -> AppResult<BotPermissions> {
        if self.forbidden.lock().await.contains(&chat_id) {
            return Err(AppError::Forbidden(format!("bot was kicked from {chat_id}")));
        }

        Ok(self
            .permissions
            .lock()
            .await
            .get(&chat_id)
            .copied()
            .unwrap_or(BotPermissions {
                status: MembershipStatus::Administrator,
                can_delete: true,
            }))
    }
}

pub(crate) enum ScriptedMessage {
    Message(MessageRef),
    Failure,
}

#[derive(Default)]
pub(crate) struct FakeMessageSource {
    pub(crate) messages: Mutex<HashMap<ChatId, Vec<MessageRef>>>,
    pub(crate) failing_after: Mutex<HashMap<ChatId, usize>>,
    pub(crate) requested_cutoffs: Mutex<Vec<(ChatId, DateTime<Utc>)>>,
}

impl FakeMessageSource {
    pub(crate) async fn put(&self, chat_id: ChatId, messages: Vec<MessageRef>) {
        self.messages.lock().await.insert(chat_id, messages);
    }

    /// Makes the stream of `chat_id` fail after yielding `count` messages.
    pub(crate) async fn fail_after(&self, chat_id: ChatId, count: usize) {
        self.failing_after.lock().await.insert(chat_id, count);
    }
}

#[async_trait]
impl MessageSource for FakeMessageSource {
    async fn list_messages_older_than(
        &self,
        chat_id: ChatId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<MessageStream> {
        self.requested_cutoffs.lock().await.push((chat_id, cutoff));

        let messages = self
            .messages
            .lock()
            .await
            .get(&chat_id)
            .cloned()
            .unwrap_or_default();
        let mut items: Vec<ScriptedMessage> = messages
            .into_iter()
            .map(ScriptedMessage::Message)
            .collect();
        if let Some(count) = self.failing_after.lock().await.get(&chat_id).copied() {
            items.truncate(count);
            items.push(ScriptedMessage::Failure);
        }

        Ok(futures::stream::iter(items)
            .map(|item| match item {
                ScriptedMessage::Message(message) => Ok(message),
                ScriptedMessage::Failure => {
                    Err(AppError::Unavailable("history page timed out".to_owned()))
                }
            })
            .boxed())
    }
}

/// Message index kept in memory, listing oldest first like the real index.
#[derive(Default)]
pub(crate) struct InMemoryMessageIndex {
    pub(crate) messages: Mutex<BTreeMap<(ChatId, MessageId), (MessageRef, u32)>>,
}

impl InMemoryMessageIndex {
    pub(crate) async fn put(&self, chat_id: ChatId, messages: Vec<MessageRef>) {
        let mut indexed = self.messages.lock().await;
        for message in messages {
            indexed.insert((chat_id, message.id), (message, 0));
        }
    }

    pub(crate) async fn ids(&self, chat_id: ChatId) -> Vec<i64> {
        self.messages
            .lock()
            .await
            .keys()
            .filter(|(indexed_chat, _)| *indexed_chat == chat_id)
            .map(|(_, message_id)| message_id.as_i64())
            .collect()
    }

    pub(crate) async fn refusals(&self, chat_id: ChatId, message_id: i64) -> Option<u32> {
        self.messages
            .lock()
            .await
            .get(&(chat_id, MessageId::new(message_id)))
            .map(|(_, refusals)| *refusals)
    }
}

#[async_trait]
impl MessageSource for InMemoryMessageIndex {
    async fn list_messages_older_than(
        &self,
        chat_id: ChatId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<MessageStream> {
        let mut listed: Vec<MessageRef> = self
            .messages
            .lock()
            .await
            .iter()
            .filter(|((indexed_chat, _), (message, _))| {
                *indexed_chat == chat_id && message.created_at < cutoff
            })
            .map(|(_, (message, _))| *message)
            .collect();
        listed.sort_by_key(|message| (message.created_at, message.id));

        Ok(futures::stream::iter(listed.into_iter().map(Ok)).boxed())
    }
}

#[async_trait]
impl MessageIndexWriter for InMemoryMessageIndex {
    async fn record_message(&self, chat_id: ChatId, message: &MessageRef) -> AppResult<()> {
        self.messages
            .lock()
            .await
            .entry((chat_id, message.id))
            .or_insert((*message, 0));
        Ok(())
    }

    async fn forget_message(&self, chat_id: ChatId, message_id: MessageId) -> AppResult<()> {
        self.messages.lock().await.remove(&(chat_id, message_id));
        Ok(())
    }

    async fn record_delete_refusal(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> AppResult<u32> {
        Ok(self
            .messages
            .lock()
            .await
            .get_mut(&(chat_id, message_id))
            .map(|(_, refusals)| {
                *refusals += 1;
                *refusals
            })
            .unwrap_or(0))
    }

    async fn forget_chat(&self, chat_id: ChatId) -> AppResult<u64> {
        let mut indexed = self.messages.lock().await;
        let before = indexed.len();
        indexed.retain(|(indexed_chat, _), _| *indexed_chat != chat_id);
        Ok(u64::try_from(before - indexed.len()).unwrap_or(u64::MAX))
    }
}

#[derive(Default)]
pub(crate) struct FakeDeleter {
    pub(crate) failures: Mutex<HashMap<(ChatId, MessageId), DeleteMessageError>>,
    pub(crate) fail_all: Mutex<Option<DeleteMessageError>>,
    pub(crate) calls: Mutex<Vec<(ChatId, MessageId)>>,
}

impl FakeDeleter {
    pub(crate) async fn fail(&self, chat_id: ChatId, message_id: i64, error: DeleteMessageError) {
        self.failures
            .lock()
            .await
            .insert((chat_id, MessageId::new(message_id)), error);
    }

    pub(crate) async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }
}

#[async_trait]
impl MessageDeleter for FakeDeleter {
    async fn delete_message(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> Result<(), DeleteMessageError> {
        self.calls.lock().await.push((chat_id, message_id));

        if let Some(error) = self.fail_all.lock().await.clone() {
            return Err(error);
        }

        match self.failures.lock().await.get(&(chat_id, message_id)) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeChatRegistry {
    pub(crate) chats: Mutex<BTreeMap<ChatId, (ChatKind, bool)>>,
    pub(crate) fail_listing: Mutex<bool>,
}

impl FakeChatRegistry {
    pub(crate) async fn track(&self, chat_id: ChatId, kind: ChatKind) {
        self.chats.lock().await.insert(chat_id, (kind, true));
    }

    pub(crate) async fn is_active(&self, chat_id: ChatId) -> Option<bool> {
        self.chats
            .lock()
            .await
            .get(&chat_id)
            .map(|(_, active)| *active)
    }

    pub(crate) async fn kind_of(&self, chat_id: ChatId) -> Option<ChatKind> {
        self.chats.lock().await.get(&chat_id).map(|(kind, _)| *kind)
    }
}

#[async_trait]
impl ChatRegistry for FakeChatRegistry {
    async fn list_active_chats(&self) -> AppResult<Vec<ConversationRef>> {
        if *self.fail_listing.lock().await {
            return Err(AppError::Unavailable("registry offline".to_owned()));
        }

        Ok(self
            .chats
            .lock()
            .await
            .iter()
            .filter(|(_, (_, active))| *active)
            .map(|(chat_id, (kind, _))| ConversationRef::active(*chat_id, *kind))
            .collect())
    }

    async fn mark_active(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        self.chats.lock().await.insert(chat_id, (kind, true));
        Ok(())
    }

    async fn mark_inactive(&self, chat_id: ChatId, _kind: ChatKind) -> AppResult<()> {
        if let Some(entry) = self.chats.lock().await.get_mut(&chat_id) {
            entry.1 = false;
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingDeletionLog {
    pub(crate) outcomes: Mutex<Vec<DeletionOutcome>>,
}

#[async_trait]
impl DeletionLogSink for RecordingDeletionLog {
    async fn append(&self, outcome: DeletionOutcome) -> AppResult<()> {
        self.outcomes.lock().await.push(outcome);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingProgressSink {
    pub(crate) snapshots: Mutex<Vec<SweepProgress>>,
}

#[async_trait]
impl ProgressSink for RecordingProgressSink {
    async fn emit(&self, progress: SweepProgress) -> AppResult<()> {
        self.snapshots.lock().await.push(progress);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeLeaseCoordinator {
    pub(crate) holder: Mutex<Option<String>>,
    pub(crate) releases: Mutex<usize>,
}

#[async_trait]
impl SweepLeaseCoordinator for FakeLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        _lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        let mut holder = self.holder.lock().await;
        if holder.is_some() {
            return Ok(None);
        }

        *holder = Some(holder_id.to_owned());
        Ok(Some(SweepLease {
            scope_key: scope_key.to_owned(),
            token: format!("{holder_id}-token"),
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &SweepLease) -> AppResult<()> {
        let mut holder = self.holder.lock().await;
        if holder.as_deref() == Some(lease.holder_id.as_str()) {
            *holder = None;
        }
        *self.releases.lock().await += 1;
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct RecordingAlertSink {
    pub(crate) alerts: Mutex<Vec<OperatorAlert>>,
    pub(crate) failing: Mutex<bool>,
}

#[async_trait]
impl OperatorAlertSink for RecordingAlertSink {
    async fn send(&self, alert: OperatorAlert) -> AppResult<()> {
        if *self.failing.lock().await {
            return Err(AppError::Unavailable("owner chat unreachable".to_owned()));
        }

        self.alerts.lock().await.push(alert);
        Ok(())
    }
}

/// Gauge returning scripted throttle counts, then zero.
#[derive(Default)]
pub(crate) struct ScriptedRateLimitGauge {
    pub(crate) throttled: std::sync::Mutex<u64>,
}

impl RateLimitGauge for ScriptedRateLimitGauge {
    fn take_throttled_calls(&self) -> u64 {
        self.throttled
            .lock()
            .map(|mut throttled| std::mem::take(&mut *throttled))
            .unwrap_or_default()
    }
}

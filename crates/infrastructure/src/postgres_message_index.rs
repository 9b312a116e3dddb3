//! PostgreSQL-backed message index using the `observed_messages` table.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use sqlx::PgPool;

use teleclean_application::{MessageIndexWriter, MessageSource, MessageStream};
use teleclean_core::{AppError, AppResult, ChatId, MessageId};
use teleclean_domain::{AuthorKind, MessageRef};

const DEFAULT_PAGE_SIZE: u32 = 200;

/// PostgreSQL implementation of the message source and index writer ports.
#[derive(Clone)]
pub struct PostgresMessageIndex {
    pool: PgPool,
    page_size: u32,
}

impl PostgresMessageIndex {
    /// Creates an index with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Overrides how many rows one page fetch reads.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

struct PageCursor {
    pool: PgPool,
    chat_id: ChatId,
    cutoff: DateTime<Utc>,
    page_size: u32,
    after: Option<(DateTime<Utc>, i64)>,
    buffered: VecDeque<MessageRef>,
    exhausted: bool,
}

impl PageCursor {
    async fn next_message(&mut self) -> Option<AppResult<MessageRef>> {
        if self.buffered.is_empty() && !self.exhausted {
            if let Err(error) = self.fetch_page().await {
                self.exhausted = true;
                return Some(Err(error));
            }
        }

        self.buffered.pop_front().map(Ok)
    }

    async fn fetch_page(&mut self) -> AppResult<()> {
        let (after_sent_at, after_message_id) = self.after.unzip();
        let rows = sqlx::query_as::<_, ObservedMessageRow>(
            r#"
            SELECT message_id, author_id, author_kind, sent_at
            FROM observed_messages
            WHERE chat_id = $1
              AND sent_at < $2
              AND ($3::timestamptz IS NULL OR (sent_at, message_id) > ($3, $4))
            ORDER BY sent_at, message_id
            LIMIT $5
            "#,
        )
        .bind(self.chat_id.as_i64())
        .bind(self.cutoff)
        .bind(after_sent_at)
        .bind(after_message_id)
        .bind(i64::from(self.page_size))
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list observed messages for chat '{}': {error}",
                self.chat_id
            ))
        })?;

        if rows.len() < usize::try_from(self.page_size).unwrap_or(usize::MAX) {
            self.exhausted = true;
        }

        for row in rows {
            self.after = Some((row.sent_at, row.message_id));
            self.buffered.push_back(row.into_message()?);
        }

        Ok(())
    }
}

#[async_trait]
impl MessageSource for PostgresMessageIndex {
    async fn list_messages_older_than(
        &self,
        chat_id: ChatId,
        cutoff: DateTime<Utc>,
    ) -> AppResult<MessageStream> {
        let cursor = PageCursor {
            pool: self.pool.clone(),
            chat_id,
            cutoff,
            page_size: self.page_size,
            after: None,
            buffered: VecDeque::new(),
            exhausted: false,
        };

        Ok(futures::stream::unfold(cursor, |mut cursor| async move {
            cursor.next_message().await.map(|item| (item, cursor))
        })
        .boxed())
    }
}

#[async_trait]
impl MessageIndexWriter for PostgresMessageIndex {
    async fn record_message(&self, chat_id: ChatId, message: &MessageRef) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO observed_messages (chat_id, message_id, author_id, author_kind, sent_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (chat_id, message_id) DO NOTHING
            "#,
        )
        .bind(chat_id.as_i64())
        .bind(message.id.as_i64())
        .bind(message.author_id)
        .bind(message.author_kind.as_str())
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record message '{}' in chat '{chat_id}': {error}",
                message.id
            ))
        })?;

        Ok(())
    }

    async fn forget_message(&self, chat_id: ChatId, message_id: MessageId) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM observed_messages
            WHERE chat_id = $1 AND message_id = $2
            "#,
        )
        .bind(chat_id.as_i64())
        .bind(message_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to forget message '{message_id}' in chat '{chat_id}': {error}"
            ))
        })?;

        Ok(())
    }

    async fn record_delete_refusal(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
    ) -> AppResult<u32> {
        let refusals = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE observed_messages
            SET delete_refusals = delete_refusals + 1
            WHERE chat_id = $1 AND message_id = $2
            RETURNING delete_refusals
            "#,
        )
        .bind(chat_id.as_i64())
        .bind(message_id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to count refused deletion of message '{message_id}' in chat '{chat_id}': {error}"
            ))
        })?;

        Ok(refusals
            .and_then(|refusals| u32::try_from(refusals).ok())
            .unwrap_or(0))
    }

    async fn forget_chat(&self, chat_id: ChatId) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM observed_messages
            WHERE chat_id = $1
            "#,
        )
        .bind(chat_id.as_i64())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to forget messages of chat '{chat_id}': {error}"
            ))
        })?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ObservedMessageRow {
    message_id: i64,
    author_id: Option<i64>,
    author_kind: String,
    sent_at: DateTime<Utc>,
}

impl ObservedMessageRow {
    fn into_message(self) -> AppResult<MessageRef> {
        Ok(MessageRef {
            id: MessageId::new(self.message_id),
            author_id: self.author_id,
            author_kind: self.author_kind.parse::<AuthorKind>()?,
            created_at: self.sent_at,
        })
    }
}

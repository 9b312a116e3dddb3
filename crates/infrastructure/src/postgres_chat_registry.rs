//! PostgreSQL-backed chat registry using the `tracked_chats` table.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use teleclean_application::ChatRegistry;
use teleclean_core::{AppError, AppResult, ChatId};
use teleclean_domain::{ChatKind, ConversationRef};

/// PostgreSQL implementation of the chat registry port.
#[derive(Clone)]
pub struct PostgresChatRegistry {
    pool: PgPool,
}

impl PostgresChatRegistry {
    /// Creates a registry with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self, chat_id: ChatId) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start chat registry transaction for chat '{chat_id}': {error}"
            ))
        })
    }

    async fn commit(transaction: Transaction<'static, Postgres>, chat_id: ChatId) -> AppResult<()> {
        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit chat registry transaction for chat '{chat_id}': {error}"
            ))
        })
    }

    async fn record_event(
        transaction: &mut Transaction<'static, Postgres>,
        chat_id: ChatId,
        kind: ChatKind,
        event: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO chat_membership_events (bucket, chat_id, event)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(kind.bucket().as_str())
        .bind(chat_id.as_i64())
        .bind(event)
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to record '{event}' event for chat '{chat_id}': {error}"
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl ChatRegistry for PostgresChatRegistry {
    async fn list_active_chats(&self) -> AppResult<Vec<ConversationRef>> {
        let rows = sqlx::query_as::<_, TrackedChatRow>(
            r#"
            SELECT chat_id, kind
            FROM tracked_chats
            WHERE active
            ORDER BY bucket, chat_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list active chats: {error}")))?;

        rows.into_iter()
            .map(|row| {
                let kind = row.kind.parse::<ChatKind>()?;
                Ok(ConversationRef::active(ChatId::new(row.chat_id), kind))
            })
            .collect()
    }

    async fn mark_active(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        let mut transaction = self.begin(chat_id).await?;

        // Returns a row only when the record was created or changed.
        let changed = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO tracked_chats (bucket, chat_id, kind, active)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (bucket, chat_id) DO UPDATE
            SET kind = EXCLUDED.kind,
                active = TRUE,
                updated_at = now()
            WHERE tracked_chats.active = FALSE
               OR tracked_chats.kind <> EXCLUDED.kind
            RETURNING chat_id
            "#,
        )
        .bind(kind.bucket().as_str())
        .bind(chat_id.as_i64())
        .bind(kind.as_str())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to mark chat '{chat_id}' active: {error}"))
        })?;

        if changed.is_some() {
            Self::record_event(&mut transaction, chat_id, kind, "joined").await?;
        }

        Self::commit(transaction, chat_id).await
    }

    async fn mark_inactive(&self, chat_id: ChatId, kind: ChatKind) -> AppResult<()> {
        let mut transaction = self.begin(chat_id).await?;

        let changed = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE tracked_chats
            SET active = FALSE,
                updated_at = now()
            WHERE bucket = $1
              AND chat_id = $2
              AND active
            RETURNING chat_id
            "#,
        )
        .bind(kind.bucket().as_str())
        .bind(chat_id.as_i64())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to mark chat '{chat_id}' inactive: {error}"))
        })?;

        if changed.is_some() {
            Self::record_event(&mut transaction, chat_id, kind, "removed").await?;
        }

        Self::commit(transaction, chat_id).await
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TrackedChatRow {
    chat_id: i64,
    kind: String,
}

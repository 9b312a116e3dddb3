//! PostgreSQL-backed deletion log using the `deletion_outcomes` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use teleclean_application::{DeletionHistoryCounts, DeletionHistoryRepository, DeletionLogSink};
use teleclean_core::{AppError, AppResult};
use teleclean_domain::{DeletionOutcome, OutcomeVerdict};

/// PostgreSQL implementation of the deletion log sink and history query ports.
#[derive(Clone)]
pub struct PostgresDeletionLog {
    pool: PgPool,
}

impl PostgresDeletionLog {
    /// Creates a deletion log with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeletionLogSink for PostgresDeletionLog {
    async fn append(&self, outcome: DeletionOutcome) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO deletion_outcomes (chat_id, message_id, verdict, reason, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(outcome.chat_id.as_i64())
        .bind(outcome.message_id.as_i64())
        .bind(outcome.verdict.as_str())
        .bind(outcome.reason.as_deref())
        .bind(outcome.recorded_at)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append deletion outcome for message '{}' in chat '{}': {error}",
                outcome.message_id, outcome.chat_id
            ))
        })?;

        Ok(())
    }
}

#[async_trait]
impl DeletionHistoryRepository for PostgresDeletionLog {
    async fn count_outcomes_since(&self, since: DateTime<Utc>) -> AppResult<DeletionHistoryCounts> {
        let rows = sqlx::query_as::<_, VerdictCountRow>(
            r#"
            SELECT verdict, count(*) AS outcome_count
            FROM deletion_outcomes
            WHERE recorded_at >= $1
            GROUP BY verdict
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to count deletion outcomes: {error}"))
        })?;

        let mut counts = DeletionHistoryCounts::default();
        for row in rows {
            let count = u64::try_from(row.outcome_count).unwrap_or_default();
            let slot = match row.verdict.parse::<OutcomeVerdict>()? {
                OutcomeVerdict::Deleted => &mut counts.deleted,
                OutcomeVerdict::DryRun => &mut counts.dry_run,
                OutcomeVerdict::Skipped => &mut counts.skipped,
                OutcomeVerdict::Exempted => &mut counts.exempted,
                OutcomeVerdict::Error => &mut counts.errors,
            };
            *slot = count;
        }

        Ok(counts)
    }

    async fn prune_outcomes_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM deletion_outcomes
            WHERE recorded_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to prune deletion outcomes: {error}"))
        })?;

        Ok(result.rows_affected())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct VerdictCountRow {
    verdict: String,
    outcome_count: i64,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;

    use teleclean_application::{DeletionHistoryRepository, DeletionLogSink};
    use teleclean_core::{ChatId, MessageId};
    use teleclean_domain::{DeletionOutcome, OutcomeVerdict};

    use super::PostgresDeletionLog;

    static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

    async fn test_pool() -> Option<PgPool> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            return None;
        };

        let pool = match PgPoolOptions::new()
            .max_connections(2)
            .connect(database_url.as_str())
            .await
        {
            Ok(pool) => pool,
            Err(error) => panic!("failed to connect to DATABASE_URL in test: {error}"),
        };

        if let Err(error) = MIGRATOR.run(&pool).await {
            panic!("failed to run migrations for postgres deletion log tests: {error}");
        }

        Some(pool)
    }

    #[tokio::test]
    async fn counts_only_outcomes_inside_the_window() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let log = PostgresDeletionLog::new(pool.clone());
        let chat_id = ChatId::new(-1_000_000_000_777);
        // Far-future stamps keep this test isolated from rows written by other runs.
        let window_start = Utc::now() + Duration::days(36_500);

        let mut old = DeletionOutcome::now(chat_id, MessageId::new(1), OutcomeVerdict::Deleted, None);
        old.recorded_at = window_start - Duration::hours(1);
        assert!(log.append(old).await.is_ok());

        for (message_id, verdict) in [
            (2, OutcomeVerdict::Deleted),
            (3, OutcomeVerdict::DryRun),
            (4, OutcomeVerdict::Skipped),
            (5, OutcomeVerdict::Error),
        ] {
            let mut outcome = DeletionOutcome::now(
                chat_id,
                MessageId::new(message_id),
                verdict,
                Some("test".to_owned()),
            );
            outcome.recorded_at = window_start + Duration::minutes(message_id);
            assert!(log.append(outcome).await.is_ok());
        }

        let counts = log.count_outcomes_since(window_start).await;
        assert!(counts.is_ok());
        let counts = counts.unwrap_or_default();
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.dry_run, 1);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.errors, 1);

        let cleanup = sqlx::query("DELETE FROM deletion_outcomes WHERE chat_id = $1")
            .bind(chat_id.as_i64())
            .execute(&pool)
            .await;
        assert!(cleanup.is_ok());
    }

    #[tokio::test]
    async fn prune_removes_only_outcomes_before_the_cutoff() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let log = PostgresDeletionLog::new(pool.clone());
        let chat_id = ChatId::new(-1_000_000_000_778);
        // Far-past stamps stay clear of live retention windows.
        let cutoff = Utc::now() - Duration::days(36_500);

        for (message_id, offset_hours) in [(1, -48), (2, -1), (3, 1)] {
            let mut outcome =
                DeletionOutcome::now(chat_id, MessageId::new(message_id), OutcomeVerdict::Deleted, None);
            outcome.recorded_at = cutoff + Duration::hours(offset_hours);
            assert!(log.append(outcome).await.is_ok());
        }

        let pruned = log.prune_outcomes_before(cutoff).await;
        assert!(pruned.is_ok());
        assert!(pruned.unwrap_or_default() >= 2);

        let remaining = sqlx::query_scalar::<_, i64>(
            "SELECT message_id FROM deletion_outcomes WHERE chat_id = $1 ORDER BY message_id",
        )
        .bind(chat_id.as_i64())
        .fetch_all(&pool)
        .await
        .unwrap_or_default();
        assert_eq!(remaining, vec![3]);

        let cleanup = sqlx::query("DELETE FROM deletion_outcomes WHERE chat_id = $1")
            .bind(chat_id.as_i64())
            .execute(&pool)
            .await;
        assert!(cleanup.is_ok());
    }
}

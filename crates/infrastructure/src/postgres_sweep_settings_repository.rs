//! PostgreSQL-backed operator settings using the single-row `sweep_settings` table.

use async_trait::async_trait;
use sqlx::PgPool;

use teleclean_application::{SweepConfig, SweepSettingsRepository};
use teleclean_core::{AppError, AppResult};
use teleclean_domain::{ExemptionSet, ThresholdConfig};

/// PostgreSQL implementation of the sweep settings port.
#[derive(Clone)]
pub struct PostgresSweepSettingsRepository {
    pool: PgPool,
}

impl PostgresSweepSettingsRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Stores operator settings, replacing any previous row.
    pub async fn save_settings(&self, config: &SweepConfig) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sweep_settings (
                id,
                user_message_age_minutes,
                all_message_age_minutes,
                dry_run,
                exempt_ids
            )
            VALUES (1, $1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET user_message_age_minutes = EXCLUDED.user_message_age_minutes,
                all_message_age_minutes = EXCLUDED.all_message_age_minutes,
                dry_run = EXCLUDED.dry_run,
                exempt_ids = EXCLUDED.exempt_ids,
                updated_at = now()
            "#,
        )
        .bind(to_column(config.thresholds.user_message_age_minutes())?)
        .bind(to_column(config.thresholds.all_message_age_minutes())?)
        .bind(config.thresholds.dry_run())
        .bind(config.exemptions.sorted_ids())
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to save sweep settings: {error}")))?;

        Ok(())
    }
}

#[async_trait]
impl SweepSettingsRepository for PostgresSweepSettingsRepository {
    async fn load_settings(&self) -> AppResult<Option<SweepConfig>> {
        let row = sqlx::query_as::<_, SweepSettingsRow>(
            r#"
            SELECT user_message_age_minutes, all_message_age_minutes, dry_run, exempt_ids
            FROM sweep_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load sweep settings: {error}")))?;

        row.map(SweepSettingsRow::into_config).transpose()
    }
}

fn to_column(minutes: u32) -> AppResult<i32> {
    i32::try_from(minutes)
        .map_err(|_| AppError::Validation(format!("threshold '{minutes}' minutes is too large")))
}

fn from_column(minutes: i32) -> AppResult<u32> {
    u32::try_from(minutes).map_err(|_| {
        AppError::Validation(format!("stored threshold '{minutes}' minutes is negative"))
    })
}

#[derive(Debug, sqlx::FromRow)]
struct SweepSettingsRow {
    user_message_age_minutes: i32,
    all_message_age_minutes: i32,
    dry_run: bool,
    exempt_ids: Vec<i64>,
}

impl SweepSettingsRow {
    fn into_config(self) -> AppResult<SweepConfig> {
        Ok(SweepConfig {
            thresholds: ThresholdConfig::new(
                from_column(self.user_message_age_minutes)?,
                from_column(self.all_message_age_minutes)?,
                self.dry_run,
            )?,
            exemptions: ExemptionSet::from_ids(self.exempt_ids),
        })
    }
}

#[cfg(test)]
mod tests {
    use sqlx::PgPool;
    use sqlx::migrate::Migrator;
    use sqlx::postgres::PgPoolOptions;

    use teleclean_application::{SweepConfig, SweepSettingsRepository};
    use teleclean_domain::{ExemptionSet, ThresholdConfig};

    use super::PostgresSweepSettingsRepository;

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
            panic!("failed to run migrations for postgres sweep settings tests: {error}");
        }

        Some(pool)
    }

    #[tokio::test]
    async fn saved_settings_round_trip() {
        let Some(pool) = test_pool().await else {
            return;
        };

        let repository = PostgresSweepSettingsRepository::new(pool);
        let thresholds = ThresholdConfig::new(30, 720, true);
        assert!(thresholds.is_ok());
        let config = SweepConfig {
            thresholds: thresholds.unwrap_or_else(|_| unreachable!()),
            exemptions: ExemptionSet::from_ids([42, -100_123]),
        };

        assert!(repository.save_settings(&config).await.is_ok());

        let loaded = repository.load_settings().await;
        assert!(loaded.is_ok());
        assert_eq!(loaded.unwrap_or_else(|_| unreachable!()), Some(config));
    }
}

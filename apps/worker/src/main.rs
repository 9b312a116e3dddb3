//! TeleClean expiry worker runtime.

#![forbid(unsafe_code)]

mod config;

use std::sync::Arc;
use std::time::Duration;

use teleclean_application::{
    ChatRegistry, ChatSweeper, DeletionHistoryService, ExpiryService, IndexedChatRegistry,
    IndexedMessageDeleter, MembershipService, OperatorAlertService, SweepConfig, SweepRunStatus,
    SweepSettingsRepository, UpdateIngestService,
};
use teleclean_core::{AppError, AppResult};
use teleclean_infrastructure::{
    PostgresChatRegistry, PostgresDeletionLog, PostgresMessageIndex,
    PostgresSweepSettingsRepository, RedisSweepLeaseCoordinator, TelegramBotClient,
    TelegramOperatorAlerts, TelegramProgressSink,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::WorkerConfig;

const HISTORY_WINDOW_HOURS: u32 = 24;
const INGEST_RETRY_DELAY: Duration = Duration::from_secs(5);
const LEASE_KEY_PREFIX: &str = "teleclean";

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_and_migrate(config.database_url.as_str()).await?;
    let http_client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    let telegram = Arc::new(
        TelegramBotClient::new(
            http_client,
            config.telegram_api_base_url.as_str(),
            config.bot_token.as_str(),
            config.telegram_max_attempts,
            config.telegram_retry_backoff_ms,
        )?
        .with_poll_timeout(config.poll_timeout_seconds),
    );
    let message_index = Arc::new(PostgresMessageIndex::new(pool.clone()));
    let chat_registry: Arc<dyn ChatRegistry> = Arc::new(IndexedChatRegistry::new(
        Arc::new(PostgresChatRegistry::new(pool.clone())),
        message_index.clone(),
    ));
    let deletion_log = Arc::new(PostgresDeletionLog::new(pool.clone()));
    let settings_repository = PostgresSweepSettingsRepository::new(pool);

    let membership_service = MembershipService::new(chat_registry.clone(), telegram.clone());
    let history_service = DeletionHistoryService::new(deletion_log.clone());
    let operator_alerts = OperatorAlertService::new(Arc::new(TelegramOperatorAlerts::new(
        telegram.clone(),
        config.owner_id,
    )))
    .with_rate_limit_gauge(telegram.clone());
    let expiry_service = build_expiry_service(
        &config,
        &telegram,
        &chat_registry,
        &message_index,
        deletion_log,
    )?
    .with_operator_alerts(operator_alerts.clone());

    let thresholds = config.default_sweep_config.thresholds;
    info!(
        worker_id = %config.worker_id,
        bot_user_id = telegram.bot_user_id(),
        user_message_age_minutes = thresholds.user_message_age_minutes(),
        all_message_age_minutes = thresholds.all_message_age_minutes(),
        dry_run = thresholds.dry_run(),
        sweep_interval_seconds = config.sweep_interval_seconds,
        lease_enabled = config.redis_url.is_some(),
        "teleclean-worker started"
    );
    operator_alerts
        .started(&resolve_sweep_config(&settings_repository, &config.default_sweep_config).await)
        .await;

    let cancellation = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancellation.clone()));

    if config.verify_chats_on_start {
        match membership_service.verify_chats().await {
            Ok(summary) => info!(
                valid = summary.valid,
                removed = summary.removed,
                "chat records verified"
            ),
            Err(error) => warn!(error = %error, "failed to verify chat records"),
        }
    }

    let ingestion = if config.poll_timeout_seconds > 0 {
        let ingest_service =
            UpdateIngestService::new(telegram.clone(), membership_service, message_index);
        Some(tokio::spawn(run_ingestion(
            ingest_service,
            cancellation.clone(),
        )))
    } else {
        info!("update ingestion disabled");
        None
    };

    while !cancellation.is_cancelled() {
        let sweep_config =
            resolve_sweep_config(&settings_repository, &config.default_sweep_config).await;

        match expiry_service.run_sweep(&sweep_config, &cancellation).await {
            Ok(run) if run.status == SweepRunStatus::Skipped => {}
            Ok(run) => {
                info!(
                    status = run.status.as_str(),
                    total_chats = run.total_chats,
                    failed_chats = run.failed_chats,
                    deleted = run.stats.deleted_messages,
                    errors = run.stats.error_messages,
                    success_rate = run.stats.success_rate(),
                    "sweep run recorded"
                );
                log_history(&history_service).await;
                prune_history(&history_service, config.audit_retention_hours).await;
            }
            Err(error) => warn!(error = %error, "sweep run failed"),
        }

        tokio::select! {
            () = cancellation.cancelled() => {}
            () = tokio::time::sleep(Duration::from_secs(config.sweep_interval_seconds)) => {}
        }
    }

    if let Some(handle) = ingestion
        && let Err(error) = handle.await
    {
        warn!(error = %error, "update ingestion task ended abnormally");
    }

    info!(worker_id = %config.worker_id, "teleclean-worker stopped");
    Ok(())
}

async fn connect_and_migrate(database_url: &str) -> AppResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))?;

    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}

fn build_expiry_service(
    config: &WorkerConfig,
    telegram: &Arc<TelegramBotClient>,
    chat_registry: &Arc<dyn ChatRegistry>,
    message_index: &Arc<PostgresMessageIndex>,
    deletion_log: Arc<PostgresDeletionLog>,
) -> AppResult<ExpiryService> {
    let message_deleter = Arc::new(
        IndexedMessageDeleter::new(telegram.clone(), message_index.clone())
            .with_max_refusals(config.max_delete_refusals),
    );
    let chat_sweeper = ChatSweeper::new(
        telegram.clone(),
        message_index.clone(),
        message_deleter,
        chat_registry.clone(),
        deletion_log,
    )
    .with_max_consecutive_failures(config.max_consecutive_delete_failures);
    let progress_sink = Arc::new(TelegramProgressSink::new(telegram.clone(), config.owner_id));

    let expiry_service = ExpiryService::new(
        chat_registry.clone(),
        chat_sweeper,
        progress_sink,
        Duration::from_secs(config.update_interval_seconds),
    );

    let Some(redis_url) = config.redis_url.as_deref() else {
        return Ok(expiry_service);
    };

    let redis_client = redis::Client::open(redis_url)
        .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

    Ok(expiry_service.with_lease_coordinator(
        Arc::new(RedisSweepLeaseCoordinator::new(redis_client, LEASE_KEY_PREFIX)),
        config.worker_id.as_str(),
        config.sweep_lease_seconds,
    ))
}

async fn resolve_sweep_config(
    settings_repository: &PostgresSweepSettingsRepository,
    defaults: &SweepConfig,
) -> SweepConfig {
    match settings_repository.load_settings().await {
        Ok(Some(stored)) => stored,
        Ok(None) => defaults.clone(),
        Err(error) => {
            warn!(error = %error, "failed to load sweep settings, using environment defaults");
            defaults.clone()
        }
    }
}

async fn log_history(history_service: &DeletionHistoryService) {
    match history_service.summary(HISTORY_WINDOW_HOURS).await {
        Ok(summary) => info!(
            window_hours = summary.window_hours,
            total_messages = summary.stats.total_messages,
            deleted = summary.stats.deleted_messages,
            skipped = summary.stats.skipped_messages,
            exempt = summary.stats.exempt_messages,
            errors = summary.stats.error_messages,
            success_rate = summary.success_rate(),
            "deletion history"
        ),
        Err(error) => warn!(error = %error, "failed to summarize deletion history"),
    }
}

async fn prune_history(history_service: &DeletionHistoryService, retention_hours: u32) {
    if let Err(error) = history_service.prune(retention_hours).await {
        warn!(error = %error, "failed to prune deletion history");
    }
}

async fn run_ingestion(ingest_service: UpdateIngestService, cancellation: CancellationToken) {
    let mut offset = None;

    loop {
        let polled = tokio::select! {
            () = cancellation.cancelled() => break,
            polled = ingest_service.poll_once(offset) => polled,
        };

        match polled {
            Ok(next_offset) => offset = next_offset,
            Err(error) => {
                warn!(error = %error, "failed to poll chat updates");
                tokio::select! {
                    () = cancellation.cancelled() => break,
                    () = tokio::time::sleep(INGEST_RETRY_DELAY) => {}
                }
            }
        }
    }

    info!("update ingestion stopped");
}

async fn cancel_on_shutdown(cancellation: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown requested, finishing current chat");
            cancellation.cancel();
        }
        Err(error) => warn!(error = %error, "failed to listen for shutdown signal"),
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

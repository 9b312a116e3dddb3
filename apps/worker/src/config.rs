use std::env;

use teleclean_application::SweepConfig;
use teleclean_core::{AppError, AppResult};
use teleclean_domain::{ExemptionSet, ThresholdConfig};

const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";
const MIN_AUDIT_RETENTION_HOURS: u32 = 24;

#[derive(Debug, Clone)]
pub(crate) struct WorkerConfig {
    pub(crate) database_url: String,
    pub(crate) bot_token: String,
    pub(crate) owner_id: i64,
    pub(crate) telegram_api_base_url: String,
    pub(crate) telegram_max_attempts: u8,
    pub(crate) telegram_retry_backoff_ms: u64,
    pub(crate) poll_timeout_seconds: u32,
    pub(crate) default_sweep_config: SweepConfig,
    pub(crate) update_interval_seconds: u64,
    pub(crate) sweep_interval_seconds: u64,
    pub(crate) max_consecutive_delete_failures: u32,
    pub(crate) max_delete_refusals: u32,
    pub(crate) audit_retention_hours: u32,
    pub(crate) redis_url: Option<String>,
    pub(crate) sweep_lease_seconds: u32,
    pub(crate) verify_chats_on_start: bool,
    pub(crate) worker_id: String,
}

impl WorkerConfig {
    pub(crate) fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let bot_token = required_env("BOT_TOKEN")?;
        let owner_id = parse_owner_id(required_env("OWNER_ID")?.as_str())?;
        let telegram_api_base_url = env::var("TELEGRAM_API_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE_URL.to_owned());
        let telegram_max_attempts = parse_env::<u8>("TELEGRAM_MAX_ATTEMPTS", 3)?;
        let telegram_retry_backoff_ms = parse_env::<u64>("TELEGRAM_RETRY_BACKOFF_MS", 500)?;
        let poll_timeout_seconds = parse_env::<u32>("TELEGRAM_POLL_TIMEOUT_SECONDS", 30)?;

        let thresholds = ThresholdConfig::new(
            parse_env::<u32>("USER_MESSAGES", 60)?,
            parse_env::<u32>("ALL_MESSAGES", 1440)?,
            parse_env_bool("DRY_RUN", false)?,
        )?;
        let exemptions = match env::var("EXCEPTIONS") {
            Ok(value) => ExemptionSet::parse_list(value.as_str())?,
            Err(_) => ExemptionSet::default(),
        };

        let update_interval_seconds = parse_env::<u64>("UPDATE_INTERVAL", 5)?;
        let sweep_interval_seconds = parse_env::<u64>("SWEEP_INTERVAL_SECONDS", 300)?;
        let max_consecutive_delete_failures =
            parse_env::<u32>("MAX_CONSECUTIVE_DELETE_FAILURES", 3)?;
        let max_delete_refusals = parse_env::<u32>("MAX_DELETE_REFUSALS", 2)?;
        let audit_retention_hours = parse_env::<u32>("AUDIT_RETENTION_HOURS", 168)?;
        let redis_url = env::var("REDIS_URL")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        let sweep_lease_seconds = parse_env::<u32>("SWEEP_LEASE_SECONDS", 900)?;
        let verify_chats_on_start = parse_env_bool("VERIFY_CHATS_ON_START", true)?;
        let worker_id = env::var("WORKER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4()));

        if telegram_max_attempts == 0 {
            return Err(AppError::Validation(
                "TELEGRAM_MAX_ATTEMPTS must be greater than zero".to_owned(),
            ));
        }

        if sweep_interval_seconds == 0 {
            return Err(AppError::Validation(
                "SWEEP_INTERVAL_SECONDS must be greater than zero".to_owned(),
            ));
        }

        validate_audit_retention(audit_retention_hours)?;

        if redis_url.is_some() && sweep_lease_seconds == 0 {
            return Err(AppError::Validation(
                "SWEEP_LEASE_SECONDS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            bot_token,
            owner_id,
            telegram_api_base_url,
            telegram_max_attempts,
            telegram_retry_backoff_ms,
            poll_timeout_seconds,
            default_sweep_config: SweepConfig {
                thresholds,
                exemptions,
            },
            update_interval_seconds,
            sweep_interval_seconds,
            max_consecutive_delete_failures,
            max_delete_refusals,
            audit_retention_hours,
            redis_url,
            sweep_lease_seconds,
            verify_chats_on_start,
            worker_id,
        })
    }
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} is required")))
}

fn parse_env<T>(name: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.trim().parse::<T>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> AppResult<bool> {
    match env::var(name) {
        Ok(value) => parse_bool(name, value.as_str()),
        Err(_) => Ok(default),
    }
}

fn parse_bool(name: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::Validation(format!(
            "invalid {name} value '{value}': expected a boolean"
        ))),
    }
}

fn validate_audit_retention(hours: u32) -> AppResult<()> {
    if hours < MIN_AUDIT_RETENTION_HOURS {
        return Err(AppError::Validation(format!(
            "AUDIT_RETENTION_HOURS must be at least {MIN_AUDIT_RETENTION_HOURS}"
        )));
    }

    Ok(())
}

fn parse_owner_id(value: &str) -> AppResult<i64> {
    let owner_id = value.trim().parse::<i64>().map_err(|error| {
        AppError::Validation(format!("invalid OWNER_ID value '{value}': {error}"))
    })?;

    if owner_id <= 0 {
        return Err(AppError::Validation(
            "OWNER_ID must be a positive user id".to_owned(),
        ));
    }

    Ok(owner_id)
}

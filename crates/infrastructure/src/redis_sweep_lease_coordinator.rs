//! Redis-backed lease coordinator that keeps sweeps single-caller.

use async_trait::async_trait;
use redis::{AsyncCommands, Script};
use teleclean_application::{SweepLease, SweepLeaseCoordinator};
use teleclean_core::{AppError, AppResult};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

/// Redis implementation of sweep lease coordination.
#[derive(Clone)]
pub struct RedisSweepLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisSweepLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, scope_key: &str) -> String {
        format!("{}:{scope_key}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Unavailable(format!("failed to connect to redis: {error}")))
    }
}

#[async_trait]
impl SweepLeaseCoordinator for RedisSweepLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        scope_key: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<SweepLease>> {
        if scope_key.trim().is_empty() {
            return Err(AppError::Validation(
                "sweep lease scope_key must not be empty".to_owned(),
            ));
        }

        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "sweep lease holder_id must not be empty".to_owned(),
            ));
        }

        if lease_seconds == 0 {
            return Err(AppError::Validation(
                "sweep lease_seconds must be greater than zero".to_owned(),
            ));
        }

        let key = self.key_for(scope_key);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        let mut connection = self.connection().await?;

        // SET NX EX keeps acquisition and expiry atomic.
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key.as_str())
            .arg(token.as_str())
            .arg("NX")
            .arg("EX")
            .arg(u64::from(lease_seconds))
            .query_async(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to acquire sweep lease: {error}")))?;

        if acquired.is_none() {
            let current_holder: Option<String> = connection
                .get(key.as_str())
                .await
                .map_err(|error| {
                    AppError::Internal(format!("failed to read sweep lease holder: {error}"))
                })?;
            tracing::debug!(
                scope_key,
                current_holder = current_holder.as_deref().unwrap_or("<expired>"),
                "sweep lease is held"
            );
            return Ok(None);
        }

        Ok(Some(SweepLease {
            scope_key: scope_key.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &SweepLease) -> AppResult<()> {
        let key = self.key_for(lease.scope_key.as_str());
        let script = Script::new(RELEASE_LEASE_SCRIPT);
        let mut connection = self.connection().await?;

        script
            .key(key)
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| AppError::Internal(format!("failed to release sweep lease: {error}")))?;

        Ok(())
    }
}

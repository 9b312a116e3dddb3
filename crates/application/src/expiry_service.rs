//! Fleet-wide sweep scheduling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use teleclean_core::AppResult;
use teleclean_domain::SweepStats;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::chat_sweeper::ChatSweeper;
use crate::operator_alert_service::OperatorAlertService;
use crate::sweep_ports::{
    ChatRegistry, ProgressSink, SweepConfig, SweepLease, SweepLeaseCoordinator, SweepProgress,
};

/// Lease scope shared by every worker sweeping the same fleet.
pub const SWEEP_LEASE_SCOPE: &str = "teleclean:sweep";

/// How a sweep run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepRunStatus {
    /// Every active chat was attempted.
    Completed,
    /// Cancellation was observed between chats.
    Cancelled,
    /// Another worker holds the sweep lease.
    Skipped,
}

impl SweepRunStatus {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Skipped => "skipped",
        }
    }
}

/// Result of one fleet sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepRun {
    /// How the run ended.
    pub status: SweepRunStatus,
    /// Merged counters across attempted chats.
    pub stats: SweepStats,
    /// Active chats at the start of the run.
    pub total_chats: u64,
    /// Chats whose sweep ended with an unexpected error.
    pub failed_chats: u64,
}

impl SweepRun {
    fn skipped() -> Self {
        Self {
            status: SweepRunStatus::Skipped,
            stats: SweepStats::zero(),
            total_chats: 0,
            failed_chats: 0,
        }
    }
}

struct LeaseSettings {
    coordinator: Arc<dyn SweepLeaseCoordinator>,
    holder_id: String,
    lease_seconds: u32,
}

/// Runs sweeps over every active chat and reports progress.
#[derive(Clone)]
pub struct ExpiryService {
    chat_registry: Arc<dyn ChatRegistry>,
    chat_sweeper: ChatSweeper,
    progress_sink: Arc<dyn ProgressSink>,
    progress_interval: Duration,
    lease: Option<Arc<LeaseSettings>>,
    operator_alerts: Option<OperatorAlertService>,
}

impl ExpiryService {
    /// Creates a new expiry service.
    #[must_use]
    pub fn new(
        chat_registry: Arc<dyn ChatRegistry>,
        chat_sweeper: ChatSweeper,
        progress_sink: Arc<dyn ProgressSink>,
        progress_interval: Duration,
    ) -> Self {
        Self {
            chat_registry,
            chat_sweeper,
            progress_sink,
            progress_interval,
            lease: None,
            operator_alerts: None,
        }
    }

    /// Alerts the owner about failed runs and throttling after each run.
    #[must_use]
    pub fn with_operator_alerts(mut self, operator_alerts: OperatorAlertService) -> Self {
        self.operator_alerts = Some(operator_alerts);
        self
    }

    /// Keeps concurrent workers from sweeping the same fleet at once.
    #[must_use]
    pub fn with_lease_coordinator(
        mut self,
        coordinator: Arc<dyn SweepLeaseCoordinator>,
        holder_id: impl Into<String>,
        lease_seconds: u32,
    ) -> Self {
        self.lease = Some(Arc::new(LeaseSettings {
            coordinator,
            holder_id: holder_id.into(),
            lease_seconds,
        }));
        self
    }

    /// Sweeps every active chat once, sequentially.
    ///
    /// Only a failure to list chats or to coordinate the lease is returned;
    /// per-chat failures are logged and their partial counters merged.
    pub async fn run_sweep(
        &self,
        config: &SweepConfig,
        cancellation: &CancellationToken,
    ) -> AppResult<SweepRun> {
        let result = self.run_leased(config, cancellation).await;

        if let Some(operator_alerts) = &self.operator_alerts {
            match &result {
                Ok(run) if run.status == SweepRunStatus::Skipped => {}
                Ok(_) => operator_alerts.check_rate_limits().await,
                Err(error) => operator_alerts.sweep_failed("sweep run", error).await,
            }
        }

        result
    }

    async fn run_leased(
        &self,
        config: &SweepConfig,
        cancellation: &CancellationToken,
    ) -> AppResult<SweepRun> {
        let Some(lease_settings) = self.lease.as_deref() else {
            return self.sweep_fleet(config, cancellation).await;
        };

        let Some(lease) = lease_settings
            .coordinator
            .try_acquire_lease(
                SWEEP_LEASE_SCOPE,
                lease_settings.holder_id.as_str(),
                lease_settings.lease_seconds,
            )
            .await?
        else {
            info!(
                holder_id = %lease_settings.holder_id,
                "sweep lease held by another worker, skipping run"
            );
            return Ok(SweepRun::skipped());
        };

        let result = self.sweep_fleet(config, cancellation).await;
        self.release(lease_settings, &lease).await;
        result
    }

    async fn sweep_fleet(
        &self,
        config: &SweepConfig,
        cancellation: &CancellationToken,
    ) -> AppResult<SweepRun> {
        let chats = self.chat_registry.list_active_chats().await?;
        let total_chats = u64::try_from(chats.len()).unwrap_or(u64::MAX);

        if chats.is_empty() {
            info!("no active chats to sweep");
            return Ok(SweepRun {
                status: SweepRunStatus::Completed,
                stats: SweepStats::zero(),
                total_chats: 0,
                failed_chats: 0,
            });
        }

        let cutoffs = config.thresholds.cutoffs(Utc::now());
        info!(
            total_chats,
            user_cutoff = %cutoffs.user_cutoff,
            all_cutoff = %cutoffs.all_cutoff,
            dry_run = config.thresholds.dry_run(),
            "sweep started"
        );

        let mut totals = SweepStats::zero();
        let mut failed_chats = 0_u64;
        let mut status = SweepRunStatus::Completed;

        self.publish(totals, total_chats, true).await;
        let mut last_emitted = Instant::now();

        for (index, chat) in chats.iter().enumerate() {
            if cancellation.is_cancelled() {
                warn!(
                    completed_chats = totals.chats_processed,
                    total_chats, "sweep cancelled"
                );
                status = SweepRunStatus::Cancelled;
                break;
            }

            match self.chat_sweeper.sweep(chat, config, &cutoffs).await {
                Ok(report) => totals = totals.merge(report.stats),
                Err(failure) => {
                    warn!(
                        chat_id = %failure.chat_id,
                        kind = chat.kind().as_str(),
                        partial_messages = failure.partial.total_messages,
                        error = %failure.error,
                        "chat sweep failed"
                    );
                    failed_chats += 1;
                    totals = totals.merge(failure.partial);
                }
            }
            totals.chats_processed += 1;

            let has_more = index + 1 < chats.len();
            if has_more && last_emitted.elapsed() >= self.progress_interval {
                self.publish(totals, total_chats, true).await;
                last_emitted = Instant::now();
            }
        }

        self.publish(totals, total_chats, false).await;

        info!(
            status = status.as_str(),
            chats_processed = totals.chats_processed,
            total_chats,
            failed_chats,
            total_messages = totals.total_messages,
            deleted = totals.deleted_messages,
            skipped = totals.skipped_messages,
            exempt = totals.exempt_messages,
            errors = totals.error_messages,
            "sweep finished"
        );

        Ok(SweepRun {
            status,
            stats: totals,
            total_chats,
            failed_chats,
        })
    }

    async fn publish(&self, stats: SweepStats, total_chats: u64, in_progress: bool) {
        let progress = SweepProgress {
            stats,
            completed_chats: stats.chats_processed,
            total_chats,
            in_progress,
        };

        if let Err(error) = self.progress_sink.emit(progress).await {
            warn!(error = %error, "failed to publish sweep progress");
        }
    }

    async fn release(&self, settings: &LeaseSettings, lease: &SweepLease) {
        if let Err(error) = settings.coordinator.release_lease(lease).await {
            warn!(
                holder_id = %settings.holder_id,
                error = %error,
                "failed to release sweep lease"
            );
        }
    }
}

#[cfg(test)]
mod tests;

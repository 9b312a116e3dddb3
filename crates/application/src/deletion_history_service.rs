//! Windowed summaries and retention of the deletion log.

use std::sync::Arc;

use chrono::{Duration, Utc};
use teleclean_core::{AppError, AppResult};
use teleclean_domain::SweepStats;
use tracing::info;

use crate::sweep_ports::{DeletionHistoryCounts, DeletionHistoryRepository};

/// Deletion log totals over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionHistorySummary {
    /// Window length in hours.
    pub window_hours: u32,
    /// Message counters for the window; `chats_processed` is always zero.
    pub stats: SweepStats,
}

impl DeletionHistorySummary {
    /// Deleted share of logged outcomes in percent.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.stats.success_rate()
    }
}

impl From<DeletionHistoryCounts> for SweepStats {
    fn from(counts: DeletionHistoryCounts) -> Self {
        let deleted_messages = counts.deleted.saturating_add(counts.dry_run);
        let skipped_messages = counts.skipped;
        let exempt_messages = counts.exempted;
        let error_messages = counts.errors;

        Self {
            chats_processed: 0,
            total_messages: deleted_messages
                .saturating_add(skipped_messages)
                .saturating_add(exempt_messages)
                .saturating_add(error_messages),
            deleted_messages,
            skipped_messages,
            exempt_messages,
            error_messages,
        }
    }
}

/// Read side of the deletion log.
#[derive(Clone)]
pub struct DeletionHistoryService {
    repository: Arc<dyn DeletionHistoryRepository>,
}

impl DeletionHistoryService {
    /// Creates a new deletion history service.
    #[must_use]
    pub fn new(repository: Arc<dyn DeletionHistoryRepository>) -> Self {
        Self { repository }
    }

    /// Summarizes outcomes logged during the last `hours` hours.
    pub async fn summary(&self, hours: u32) -> AppResult<DeletionHistorySummary> {
        if hours == 0 {
            return Err(AppError::Validation(
                "deletion history window must be at least one hour".to_owned(),
            ));
        }

        let since = Utc::now() - Duration::hours(i64::from(hours));
        let counts = self.repository.count_outcomes_since(since).await?;

        Ok(DeletionHistorySummary {
            window_hours: hours,
            stats: SweepStats::from(counts),
        })
    }

    /// Deletes outcomes older than `retention_hours` and returns how many were removed.
    pub async fn prune(&self, retention_hours: u32) -> AppResult<u64> {
        if retention_hours == 0 {
            return Err(AppError::Validation(
                "deletion log retention must be at least one hour".to_owned(),
            ));
        }

        let cutoff = Utc::now() - Duration::hours(i64::from(retention_hours));
        let pruned = self.repository.prune_outcomes_before(cutoff).await?;
        if pruned > 0 {
            info!(pruned, retention_hours, "pruned deletion log");
        }

        Ok(pruned)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teleclean_core::AppResult;
use teleclean_domain::DeletionOutcome;

/// Append-only sink for per-message outcomes.
#[async_trait]
pub trait DeletionLogSink: Send + Sync {
    /// Appends one outcome.
    async fn append(&self, outcome: DeletionOutcome) -> AppResult<()>;
}

/// Outcome counts read back from the deletion log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionHistoryCounts {
    /// Outcomes recorded as deleted.
    pub deleted: u64,
    /// Outcomes recorded as simulated deletions.
    pub dry_run: u64,
    /// Outcomes recorded as skipped.
    pub skipped: u64,
    /// Outcomes recorded as exempted.
    pub exempted: u64,
    /// Outcomes recorded as failed.
    pub errors: u64,
}

/// Query port over the deletion log.
#[async_trait]
pub trait DeletionHistoryRepository: Send + Sync {
    /// Counts outcomes recorded at or after `since`.
    async fn count_outcomes_since(&self, since: DateTime<Utc>) -> AppResult<DeletionHistoryCounts>;

    /// Deletes outcomes recorded before `cutoff` and returns how many were removed.
    async fn prune_outcomes_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;
}

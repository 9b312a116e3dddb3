use async_trait::async_trait;
use teleclean_core::AppResult;
use teleclean_domain::{SweepStats, progress_percent};

/// Progress snapshot of a running or finished sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepProgress {
    /// Totals accumulated so far.
    pub stats: SweepStats,
    /// Chats attempted so far.
    pub completed_chats: u64,
    /// Chats scheduled for this sweep.
    pub total_chats: u64,
    /// Whether more chats remain.
    pub in_progress: bool,
}

impl SweepProgress {
    /// Returns completed share in percent.
    #[must_use]
    pub fn percent(&self) -> f64 {
        progress_percent(self.completed_chats, self.total_chats)
    }
}

/// Operator notification port for sweep progress.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Publishes one snapshot.
    async fn emit(&self, progress: SweepProgress) -> AppResult<()>;
}

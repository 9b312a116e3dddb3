//! Sweep counters and derived rates.

use serde::{Deserialize, Serialize};

use crate::outcome::OutcomeVerdict;

/// Counters for one chat or one whole sweep.
///
/// `total_messages` always equals the sum of the four verdict counters when
/// the struct is only mutated through [`SweepStats::record`] and
/// [`SweepStats::merge`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SweepStats {
    /// Chats attempted during the sweep.
    pub chats_processed: u64,
    /// Messages examined.
    pub total_messages: u64,
    /// Messages deleted, including simulated deletions.
    pub deleted_messages: u64,
    /// Messages too young to delete.
    pub skipped_messages: u64,
    /// Messages protected by an exemption.
    pub exempt_messages: u64,
    /// Messages whose deletion failed.
    pub error_messages: u64,
}

/// Per-chat counters share the fleet representation.
pub type ChatStats = SweepStats;

impl SweepStats {
    /// Returns the merge identity.
    #[must_use]
    pub fn zero() -> Self {
        Self::default()
    }

    /// Field-wise sum of two counters.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            chats_processed: self.chats_processed.saturating_add(other.chats_processed),
            total_messages: self.total_messages.saturating_add(other.total_messages),
            deleted_messages: self.deleted_messages.saturating_add(other.deleted_messages),
            skipped_messages: self.skipped_messages.saturating_add(other.skipped_messages),
            exempt_messages: self.exempt_messages.saturating_add(other.exempt_messages),
            error_messages: self.error_messages.saturating_add(other.error_messages),
        }
    }

    /// Counts one examined message under its audited verdict.
    pub fn record(&mut self, verdict: OutcomeVerdict) {
        self.total_messages = self.total_messages.saturating_add(1);
        let bucket = match verdict {
            OutcomeVerdict::Deleted | OutcomeVerdict::DryRun => &mut self.deleted_messages,
            OutcomeVerdict::Skipped => &mut self.skipped_messages,
            OutcomeVerdict::Exempted => &mut self.exempt_messages,
            OutcomeVerdict::Error => &mut self.error_messages,
        };
        *bucket = bucket.saturating_add(1);
    }

    /// Returns whether the total equals the sum of the verdict counters.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let accounted = self
            .deleted_messages
            .checked_add(self.skipped_messages)
            .and_then(|sum| sum.checked_add(self.exempt_messages))
            .and_then(|sum| sum.checked_add(self.error_messages));

        accounted == Some(self.total_messages)
    }

    /// Deleted share of examined messages in percent, `0.0` when nothing was examined.
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        percentage(self.deleted_messages, self.total_messages)
    }
}

/// Completed share of `total` in percent, `0.0` when `total` is zero.
#[must_use]
pub fn progress_percent(completed: u64, total: u64) -> f64 {
    percentage(completed, total)
}

#[allow(clippy::cast_precision_loss)]
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }

    part as f64 / whole as f64 * 100.0
}

use async_trait::async_trait;
use teleclean_core::AppResult;
use teleclean_domain::{ExemptionSet, ThresholdConfig};

/// Read-only configuration snapshot for one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepConfig {
    /// Age thresholds and dry-run flag.
    pub thresholds: ThresholdConfig,
    /// Exempt authors and channels.
    pub exemptions: ExemptionSet,
}

/// Port for operator-maintained sweep settings.
#[async_trait]
pub trait SweepSettingsRepository: Send + Sync {
    /// Returns stored settings, or `None` when the operator never saved any.
    async fn load_settings(&self) -> AppResult<Option<SweepConfig>>;
}

use async_trait::async_trait;
use teleclean_core::AppResult;

use super::settings::SweepConfig;

/// Notification addressed to the bot owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorAlert {
    /// Worker started with the given effective settings.
    Started {
        /// Settings the first sweep will use.
        config: SweepConfig,
    },
    /// A sweep run failed as a whole.
    SweepFailed {
        /// Where the failure happened.
        context: String,
        /// Rendered error.
        error: String,
    },
    /// The platform throttled the bot since the previous check.
    RateLimited {
        /// Number of throttled API calls.
        throttled_calls: u64,
    },
}

impl OperatorAlert {
    /// Returns stable log value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::SweepFailed { .. } => "sweep_failed",
            Self::RateLimited { .. } => "rate_limited",
        }
    }
}

/// Delivery port for owner alerts.
#[async_trait]
pub trait OperatorAlertSink: Send + Sync {
    /// Delivers one alert.
    async fn send(&self, alert: OperatorAlert) -> AppResult<()>;
}

/// Counter of platform calls that were throttled.
pub trait RateLimitGauge: Send + Sync {
    /// Returns the throttled calls observed since the previous call and resets the count.
    fn take_throttled_calls(&self) -> u64;
}

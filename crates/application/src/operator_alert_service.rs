//! Owner notifications for worker start, failed sweeps and throttling.

use std::sync::Arc;

use teleclean_core::AppError;
use tracing::warn;

use crate::sweep_ports::{OperatorAlert, OperatorAlertSink, RateLimitGauge, SweepConfig};

/// Sends owner alerts; delivery failures are logged and never propagated.
#[derive(Clone)]
pub struct OperatorAlertService {
    alert_sink: Arc<dyn OperatorAlertSink>,
    rate_limit_gauge: Option<Arc<dyn RateLimitGauge>>,
}

impl OperatorAlertService {
    /// Creates a new alert service.
    #[must_use]
    pub fn new(alert_sink: Arc<dyn OperatorAlertSink>) -> Self {
        Self {
            alert_sink,
            rate_limit_gauge: None,
        }
    }

    /// Enables throttling alerts fed by the given gauge.
    #[must_use]
    pub fn with_rate_limit_gauge(mut self, rate_limit_gauge: Arc<dyn RateLimitGauge>) -> Self {
        self.rate_limit_gauge = Some(rate_limit_gauge);
        self
    }

    /// Announces that the worker started with `config`.
    pub async fn started(&self, config: &SweepConfig) {
        self.deliver(OperatorAlert::Started {
            config: config.clone(),
        })
        .await;
    }

    /// Reports a failed sweep run.
    pub async fn sweep_failed(&self, context: &str, error: &AppError) {
        self.deliver(OperatorAlert::SweepFailed {
            context: context.to_owned(),
            error: error.to_string(),
        })
        .await;
    }

    /// Reports throttling seen since the previous check, if any.
    pub async fn check_rate_limits(&self) {
        let Some(gauge) = self.rate_limit_gauge.as_deref() else {
            return;
        };

        let throttled_calls = gauge.take_throttled_calls();
        if throttled_calls > 0 {
            self.deliver(OperatorAlert::RateLimited { throttled_calls })
                .await;
        }
    }

    async fn deliver(&self, alert: OperatorAlert) {
        let kind = alert.as_str();
        if let Err(error) = self.alert_sink.send(alert).await {
            warn!(alert = kind, error = %error, "failed to deliver operator alert");
        }
    }
}

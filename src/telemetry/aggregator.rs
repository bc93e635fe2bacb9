//! Per-sample metric recording.
//!
//! # Responsibilities
//! - Append the sample and fold it into the metric's running mean
//! - Compare the sample against its threshold and alert immediately
//!
//! # Design Decisions
//! - Sample append and mean update are one store operation, so concurrent
//!   recorders never lose an update
//! - The mean covers the metric's whole lifetime; cleanup purges raw
//!   samples but never the mean

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::alerts::{AlertCenter, AlertSeverity, SystemAlert};
use crate::clock::{now_millis, Millis};
use crate::config::AggregationConfig;
use crate::error::RouterResult;
use crate::storage::Store;
use crate::telemetry::metric::{MetricName, MetricSample, RollingAverage};

/// Threshold in force for `metric`: a configured override, else the
/// built-in default. Counters have none unless configured.
pub fn threshold_for(config: &AggregationConfig, metric: MetricName) -> Option<f64> {
    config
        .thresholds
        .get(&metric.to_string())
        .copied()
        .or_else(|| metric.default_threshold())
}

/// Severity of a per-sample breach.
fn severity_for(value: f64, threshold: f64) -> AlertSeverity {
    if value >= threshold * 2.0 {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Warning
    }
}

/// Records metric samples.
#[derive(Debug, Clone)]
pub struct MetricsAggregator {
    store: Arc<dyn Store>,
    alerts: AlertCenter,
    config: Arc<ArcSwap<AggregationConfig>>,
}

impl MetricsAggregator {
    /// Create a new aggregator.
    pub fn new(
        store: Arc<dyn Store>,
        alerts: AlertCenter,
        config: Arc<ArcSwap<AggregationConfig>>,
    ) -> Self {
        Self {
            store,
            alerts,
            config,
        }
    }

    /// Record `value` for `metric` now.
    pub fn record(&self, metric: MetricName, value: f64) -> RouterResult<RollingAverage> {
        self.record_at(metric, value, now_millis())
    }

    /// Record `value` for `metric` as observed at `observed_at`.
    pub fn record_at(
        &self,
        metric: MetricName,
        value: f64,
        observed_at: Millis,
    ) -> RouterResult<RollingAverage> {
        let average = self.store.record_sample(MetricSample {
            metric,
            value,
            observed_at,
        })?;

        let config = self.config.load();
        if let Some(threshold) = threshold_for(&config, metric) {
            if value > threshold {
                let severity = severity_for(value, threshold);
                self.alerts.raise_or_log(SystemAlert::new(
                    metric.service().as_str(),
                    metric.to_string(),
                    value,
                    threshold,
                    severity,
                    format!("{} = {} exceeds threshold {}", metric, value, threshold),
                ));
            }
        }

        tracing::trace!(
            metric = %metric,
            value,
            average = average.average,
            samples = average.sample_count,
            "Metric recorded"
        );
        Ok(average)
    }
}

//! Periodic service-health aggregation.
//!
//! # Responsibilities
//! - Judge each logical service from its running means and its recent
//!   error rate
//! - Persist one status per service and derive the overall system status
//! - Raise an alert per issue found
//!
//! # Status Rule
//! ```text
//! issues == 0      → healthy
//! issues in 1..=2  → degraded
//! issues > 2       → critical
//! overall          → worst service status
//! ```

use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::alerts::{AlertCenter, AlertSeverity, SystemAlert};
use crate::clock::{now_millis, Millis};
use crate::config::AggregationConfig;
use crate::error::RouterResult;
use crate::observability::metrics;
use crate::storage::Store;
use crate::telemetry::aggregator::threshold_for;
use crate::telemetry::metric::{
    MetricName, ServiceHealthStatus, ServiceName, ServiceStatus, SystemHealth,
};

/// One threshold breach found during a sweep.
#[derive(Debug, Clone)]
struct Issue {
    metric: String,
    value: f64,
    threshold: f64,
    description: String,
}

/// Aggregates metrics into per-service health.
#[derive(Debug, Clone)]
pub struct ServiceHealthAggregator {
    store: Arc<dyn Store>,
    alerts: AlertCenter,
    config: Arc<ArcSwap<AggregationConfig>>,
}

impl ServiceHealthAggregator {
    /// Create a new service-health aggregator.
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

    /// Evaluate every service now.
    pub fn sweep(&self) -> RouterResult<SystemHealth> {
        self.sweep_at(now_millis())
    }

    /// Evaluate every service with `now` as the end of the error window.
    pub fn sweep_at(&self, now: Millis) -> RouterResult<SystemHealth> {
        let config = self.config.load();
        let mut services = Vec::with_capacity(ServiceName::ALL.len());

        for service in ServiceName::ALL {
            let (status, issues) = self.evaluate(service, now, &config)?;
            self.store.put_service_health(status.clone())?;

            metrics::record_service_status(service.as_str(), status_level(status.status));
            if status.status != ServiceStatus::Healthy {
                tracing::warn!(
                    service = service.as_str(),
                    status = status.status.as_str(),
                    issues = issues.len(),
                    "Service unhealthy"
                );
            }

            let severity = match status.status {
                ServiceStatus::Critical => AlertSeverity::Critical,
                _ => AlertSeverity::Warning,
            };
            for issue in issues {
                self.alerts.raise_or_log(SystemAlert::new(
                    service.as_str(),
                    issue.metric,
                    issue.value,
                    issue.threshold,
                    severity,
                    issue.description,
                ));
            }
            services.push(status);
        }

        Ok(SystemHealth {
            overall_status: ServiceStatus::overall(services.iter().map(|s| s.status)),
            services,
        })
    }

    /// Health as of the last sweep, without re-evaluating.
    pub fn system_health(&self) -> RouterResult<SystemHealth> {
        let services = self.store.list_service_health()?;
        Ok(SystemHealth {
            overall_status: ServiceStatus::overall(services.iter().map(|s| s.status)),
            services,
        })
    }

    fn evaluate(
        &self,
        service: ServiceName,
        now: Millis,
        config: &AggregationConfig,
    ) -> RouterResult<(ServiceHealthStatus, Vec<Issue>)> {
        let mut relevant_metrics = BTreeMap::new();
        let mut issues = Vec::new();

        // 1. Running means against their thresholds
        for &metric in service.indicators() {
            let Some(average) = self.store.rolling_average(metric)? else {
                continue;
            };
            relevant_metrics.insert(metric.to_string(), average.average);
            if let Some(threshold) = threshold_for(config, metric) {
                if average.average > threshold {
                    issues.push(Issue {
                        metric: metric.to_string(),
                        value: average.average,
                        threshold,
                        description: format!(
                            "{} average {:.3} exceeds {}",
                            metric, average.average, threshold
                        ),
                    });
                }
            }
        }

        // 2. Error rate over the window
        let since = now.saturating_sub(config.window_secs.saturating_mul(1_000));
        let requests = self.window_total(MetricName::Requests(service), since)?;
        let errors = self.window_total(MetricName::Errors(service), since)?;
        let error_rate = if requests > 0.0 { errors / requests } else { 0.0 };
        let error_key = format!("{}.error_rate", service);
        relevant_metrics.insert(error_key.clone(), error_rate);
        if error_rate > config.max_error_rate {
            issues.push(Issue {
                metric: error_key,
                value: error_rate,
                threshold: config.max_error_rate,
                description: format!(
                    "{} error rate {:.3} ({} of {} requests) exceeds {}",
                    service, error_rate, errors, requests, config.max_error_rate
                ),
            });
        }

        let status = ServiceHealthStatus {
            service_name: service,
            status: ServiceStatus::from_issue_count(issues.len()),
            relevant_metrics,
            issues: issues.iter().map(|i| i.description.clone()).collect(),
            observed_at: now,
        };
        Ok((status, issues))
    }

    /// Sum of counter samples observed since `since`.
    fn window_total(&self, metric: MetricName, since: Millis) -> RouterResult<f64> {
        Ok(self
            .store
            .samples_since(metric, since)?
            .iter()
            .map(|s| s.value)
            .sum())
    }
}

fn status_level(status: ServiceStatus) -> u8 {
    match status {
        ServiceStatus::Healthy => 0,
        ServiceStatus::Degraded => 1,
        ServiceStatus::Critical => 2,
    }
}

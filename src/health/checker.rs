//! Region health checker.
//!
//! # Responsibilities
//! - Probe every registered region concurrently
//! - Turn readings into verdicts against the configured thresholds
//! - Persist statuses, history and alerts once per sweep
//!
//! # Design Decisions
//! - A failing, slow or circuit-broken probe yields an offline sentinel;
//!   it never aborts the sweep for the other regions
//! - All status updates of one sweep are written as a single batch
//! - Thresholds, probe deadline, breaker settings and transition policy sit
//!   behind `ArcSwap` handles so config reloads apply on the next sweep
//! - A breaker permit is released when its probe is cancelled, so an
//!   abandoned sweep never leaves a breaker stuck half-open

use arc_swap::ArcSwap;
use dashmap::DashMap;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alerts::{AlertCenter, AlertSeverity, SystemAlert};
use crate::clock::now_millis;
use crate::config::{BreakerConfig, HealthCheckConfig, HealthThresholds};
use crate::error::RouterResult;
use crate::health::policy::TransitionTracker;
use crate::health::probe::{Probe, ProbeError, ProbeReading};
use crate::observability::metrics;
use crate::region::{HealthCheckResult, RegionNode, RegionRegistry, RegionStatus, RegionUpdate};
use crate::resilience::CircuitBreaker;
use crate::storage::Store;

/// One threshold a reading exceeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
}

/// Thresholds the reading meets or exceeds. Empty means within limits.
pub fn breaches(reading: &ProbeReading, thresholds: &HealthThresholds) -> Vec<Breach> {
    [
        ("latency_ms", reading.latency_ms, thresholds.max_latency_ms),
        ("cpu_usage", reading.cpu_usage, thresholds.max_cpu),
        ("error_rate", reading.error_rate, thresholds.max_error_rate),
    ]
    .into_iter()
    .filter(|(_, value, threshold)| value >= threshold)
    .map(|(metric, value, threshold)| Breach {
        metric,
        value,
        threshold,
    })
    .collect()
}

/// Healthy only if the region says so and every figure is strictly under
/// its threshold.
pub fn is_healthy(reading: &ProbeReading, thresholds: &HealthThresholds) -> bool {
    reading.source_healthy && breaches(reading, thresholds).is_empty()
}

/// Summary of one sweep.
#[derive(Debug, Clone)]
pub struct SweepReport {
    pub results: Vec<HealthCheckResult>,
    pub healthy: usize,
    pub unhealthy: usize,
}

/// Probes regions and records their health.
#[derive(Debug)]
pub struct HealthChecker {
    registry: RegionRegistry,
    store: Arc<dyn Store>,
    probe: Arc<dyn Probe>,
    alerts: AlertCenter,
    thresholds: Arc<ArcSwap<HealthThresholds>>,
    transitions: TransitionTracker,
    breakers: DashMap<String, CircuitBreaker>,
    settings: ArcSwap<ProbeSettings>,
}

/// Per-probe settings that can be swapped on reload.
#[derive(Debug, Clone, PartialEq)]
struct ProbeSettings {
    timeout: Duration,
    breaker: BreakerConfig,
}

impl From<&HealthCheckConfig> for ProbeSettings {
    fn from(config: &HealthCheckConfig) -> Self {
        Self {
            timeout: Duration::from_millis(config.probe_timeout_ms),
            breaker: config.breaker.clone(),
        }
    }
}

/// Breaker permission for one in-flight probe.
///
/// Dropping the permit without an outcome hands the trial slot back to the
/// breaker.
struct ProbePermit<'a> {
    breakers: &'a DashMap<String, CircuitBreaker>,
    region_id: &'a str,
    settled: bool,
}

impl<'a> ProbePermit<'a> {
    fn acquire(
        breakers: &'a DashMap<String, CircuitBreaker>,
        region_id: &'a str,
        config: &BreakerConfig,
    ) -> Option<Self> {
        // The map guard is released at the end of this statement.
        let permitted = breakers
            .entry(region_id.to_string())
            .or_insert_with(|| CircuitBreaker::new(config))
            .try_acquire(Instant::now());
        if permitted {
            Some(Self {
                breakers,
                region_id,
                settled: false,
            })
        } else {
            None
        }
    }

    fn succeeded(mut self) {
        self.settled = true;
        if let Some(mut breaker) = self.breakers.get_mut(self.region_id) {
            breaker.record_success();
        }
    }

    fn failed(mut self) {
        self.settled = true;
        if let Some(mut breaker) = self.breakers.get_mut(self.region_id) {
            breaker.record_failure(Instant::now());
        }
    }
}

impl Drop for ProbePermit<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(mut breaker) = self.breakers.get_mut(self.region_id) {
            breaker.abandon(Instant::now());
        }
        tracing::debug!(region = %self.region_id, "Probe cancelled before completion");
    }
}

impl HealthChecker {
    /// Create a new health checker.
    pub fn new(
        config: &HealthCheckConfig,
        registry: RegionRegistry,
        store: Arc<dyn Store>,
        probe: Arc<dyn Probe>,
        alerts: AlertCenter,
        thresholds: Arc<ArcSwap<HealthThresholds>>,
    ) -> Self {
        Self {
            registry,
            store,
            probe,
            alerts,
            thresholds,
            transitions: TransitionTracker::new(config.policy),
            breakers: DashMap::new(),
            settings: ArcSwap::from_pointee(ProbeSettings::from(config)),
        }
    }

    /// Thresholds currently in force.
    pub fn thresholds(&self) -> HealthThresholds {
        **self.thresholds.load()
    }

    /// Current probe deadline.
    pub fn probe_timeout(&self) -> Duration {
        self.settings.load().timeout
    }

    /// Apply reloaded probe settings and transition policy. Changed breaker
    /// settings replace every breaker, so all regions start closed again.
    pub fn reconfigure(&self, config: &HealthCheckConfig) {
        let next = ProbeSettings::from(config);
        let previous = self.settings.swap(Arc::new(next.clone()));
        if previous.breaker != next.breaker {
            self.breakers.clear();
            tracing::info!(
                failure_threshold = next.breaker.failure_threshold,
                "Probe breakers reset with new settings"
            );
        }
        if previous.timeout != next.timeout {
            tracing::info!(
                probe_timeout_ms = next.timeout.as_millis() as u64,
                "Probe deadline changed"
            );
        }
        self.transitions.set_policy(config.policy);
    }

    /// Probe a single region. Never fails: probe errors become an offline
    /// sentinel result.
    pub async fn check_region(&self, node: &RegionNode) -> HealthCheckResult {
        let region_id = node.region_id.as_str();

        // 1. Ask the region's breaker
        let settings = self.settings.load_full();
        let permit = ProbePermit::acquire(&self.breakers, region_id, &settings.breaker);

        // 2. Probe under a deadline
        let outcome = match &permit {
            Some(_) => match tokio::time::timeout(settings.timeout, self.probe.probe(node)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ProbeError::Timeout(settings.timeout.as_millis() as u64)),
            },
            None => Err(ProbeError::CircuitOpen),
        };

        // 3. Feed the breaker and build the result
        let observed_at = now_millis();
        match outcome {
            Ok(reading) => {
                if let Some(permit) = permit {
                    permit.succeeded();
                }
                let thresholds = self.thresholds();
                let healthy = is_healthy(&reading, &thresholds);
                HealthCheckResult {
                    region_id: region_id.to_string(),
                    status: if healthy {
                        RegionStatus::Healthy
                    } else {
                        RegionStatus::Degraded
                    },
                    healthy,
                    latency_ms: reading.latency_ms,
                    cpu_usage: reading.cpu_usage,
                    memory_usage: reading.memory_usage,
                    active_connections: reading.active_connections,
                    error_rate: reading.error_rate,
                    observed_at,
                    error: None,
                }
            }
            Err(e) => {
                if let Some(permit) = permit {
                    permit.failed();
                }
                metrics::record_probe_failure(region_id, e.kind());
                tracing::warn!(region = %region_id, error = %e, "Region probe failed");
                HealthCheckResult::offline(region_id, e.to_string(), observed_at)
            }
        }
    }

    /// Probe every registered region concurrently without persisting
    /// anything. Results are ordered by region id.
    pub async fn check_all(&self) -> RouterResult<Vec<HealthCheckResult>> {
        let nodes = self.registry.list_all()?;
        Ok(join_all(nodes.iter().map(|node| self.check_region(node))).await)
    }

    /// Probe every region and persist the outcome.
    pub async fn sweep(&self) -> RouterResult<SweepReport> {
        let started = Instant::now();
        let nodes = self.registry.list_all()?;
        let results = join_all(nodes.iter().map(|node| self.check_region(node))).await;

        // 1. One batched status update for the whole sweep
        let updates: Vec<(String, RegionUpdate)> = nodes
            .iter()
            .zip(&results)
            .map(|(node, result)| {
                let status =
                    self.transitions
                        .next_status(&node.region_id, node.status, result.status);
                if status != node.status {
                    tracing::info!(
                        region = %node.region_id,
                        from = node.status.as_str(),
                        to = status.as_str(),
                        "Region status changed"
                    );
                }
                (node.region_id.clone(), update_from(result, status))
            })
            .collect();
        self.registry.apply_batch(&updates)?;

        // 2. History
        self.store.append_health_results(&results)?;

        // 3. Alerts and metrics
        let thresholds = self.thresholds();
        for result in &results {
            metrics::record_region_health(&result.region_id, result.healthy, result.latency_ms);
            if !result.healthy {
                self.alerts.raise_or_log(region_alert(result, &thresholds));
            }
        }

        let healthy = results.iter().filter(|r| r.healthy).count();
        let report = SweepReport {
            unhealthy: results.len() - healthy,
            healthy,
            results,
        };
        tracing::debug!(
            healthy = report.healthy,
            unhealthy = report.unhealthy,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Health sweep complete"
        );
        Ok(report)
    }
}

fn update_from(result: &HealthCheckResult, status: RegionStatus) -> RegionUpdate {
    let reachable = result.error.is_none();
    RegionUpdate {
        status: Some(status),
        latency_ms: Some(result.latency_ms),
        cpu_usage: reachable.then_some(result.cpu_usage),
        error_rate: Some(result.error_rate),
        active_users: reachable.then_some(result.active_connections),
        last_health_check_at: Some(result.observed_at),
        ..RegionUpdate::default()
    }
}

fn region_alert(result: &HealthCheckResult, thresholds: &HealthThresholds) -> SystemAlert {
    if let Some(error) = &result.error {
        return SystemAlert::new(
            result.region_id.as_str(),
            "status",
            result.latency_ms,
            thresholds.max_latency_ms,
            AlertSeverity::Critical,
            format!("Region {} is offline: {}", result.region_id, error),
        );
    }

    let reading = ProbeReading {
        source_healthy: true,
        latency_ms: result.latency_ms,
        cpu_usage: result.cpu_usage,
        memory_usage: result.memory_usage,
        active_connections: result.active_connections,
        error_rate: result.error_rate,
    };
    let found = breaches(&reading, thresholds);
    let (metric, value, threshold) = match found.first() {
        Some(b) => (b.metric, b.value, b.threshold),
        // Region reported itself unhealthy while within all thresholds.
        None => ("status", result.latency_ms, thresholds.max_latency_ms),
    };
    let detail = if found.is_empty() {
        "self-reported unhealthy".to_string()
    } else {
        found
            .iter()
            .map(|b| format!("{} {:.3} >= {:.3}", b.metric, b.value, b.threshold))
            .collect::<Vec<_>>()
            .join(", ")
    };
    SystemAlert::new(
        result.region_id.as_str(),
        metric,
        value,
        threshold,
        AlertSeverity::Warning,
        format!("Region {} is degraded: {}", result.region_id, detail),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RegionConfig, TransitionPolicy};
    use crate::health::probe::ScriptedProbe;
    use crate::storage::MemoryStore;
    use std::collections::BTreeMap;

    fn checker(probe: Arc<ScriptedProbe>, config: HealthCheckConfig) -> (HealthChecker, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = RegionRegistry::new(store.clone());
        let regions: Vec<RegionConfig> = ["eu", "us"]
            .iter()
            .map(|id| RegionConfig {
                id: id.to_string(),
                latitude: 0.0,
                longitude: 0.0,
                endpoints: BTreeMap::new(),
            })
            .collect();
        registry.initialize(&regions).unwrap();
        let thresholds = Arc::new(ArcSwap::from_pointee(config.thresholds));
        let checker = HealthChecker::new(
            &config,
            registry,
            store.clone(),
            probe,
            AlertCenter::new(store.clone()),
            thresholds,
        );
        (checker, store)
    }

    #[test]
    fn test_any_breach_is_unhealthy() {
        let t = HealthThresholds::default();
        assert!(is_healthy(&ProbeReading::healthy(100.0), &t));
        assert!(!is_healthy(&ProbeReading::healthy(400.0), &t));
        assert!(!is_healthy(&ProbeReading::healthy(100.0).with_cpu(0.8), &t));
        assert!(!is_healthy(&ProbeReading::healthy(100.0).with_error_rate(0.06), &t));
        assert!(!is_healthy(&ProbeReading::healthy(100.0).with_source_healthy(false), &t));
    }

    #[test]
    fn test_breaches_lists_every_exceeded_threshold() {
        let reading = ProbeReading::healthy(500.0).with_cpu(0.95);
        let found = breaches(&reading, &HealthThresholds::default());
        let names: Vec<_> = found.iter().map(|b| b.metric).collect();
        assert_eq!(names, vec!["latency_ms", "cpu_usage"]);
    }

    #[tokio::test]
    async fn test_sweep_persists_statuses_and_alerts() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_reading("eu", ProbeReading::healthy(40.0));
        probe.set_failure("us", "connection refused");
        let (checker, store) = checker(probe, HealthCheckConfig::default());

        let report = checker.sweep().await.unwrap();
        assert_eq!(report.healthy, 1);
        assert_eq!(report.unhealthy, 1);

        let us = store.get_region("us").unwrap().unwrap();
        assert_eq!(us.status, RegionStatus::Offline);
        assert!(us.last_health_check_at.is_some());
        assert_eq!(store.get_region("eu").unwrap().unwrap().latency_ms, 40.0);

        let alerts = store.list_alerts().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].service, "us");
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(store.health_history("us", 10).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_probe_times_out_without_blocking_others() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_reading("eu", ProbeReading::healthy(40.0));
        probe.set_reading("us", ProbeReading::healthy(40.0));
        probe.set_delay("us", Duration::from_millis(500));
        let config = HealthCheckConfig {
            probe_timeout_ms: 50,
            ..HealthCheckConfig::default()
        };
        let (checker, _) = checker(probe, config);

        let results = checker.check_all().await.unwrap();
        assert!(results[0].healthy);
        assert_eq!(results[1].status, RegionStatus::Offline);
        assert!(results[1].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_open_breaker_skips_probe() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_reading("eu", ProbeReading::healthy(40.0));
        probe.set_failure("us", "down");
        let mut config = HealthCheckConfig::default();
        config.breaker.failure_threshold = 1;
        let (checker, _) = checker(probe.clone(), config);

        checker.check_all().await.unwrap();
        probe.set_reading("us", ProbeReading::healthy(40.0));
        let results = checker.check_all().await.unwrap();
        assert_eq!(results[1].error.as_deref(), Some("circuit open, probe skipped"));
    }

    #[tokio::test]
    async fn test_cancelled_half_open_probe_does_not_wedge_breaker() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_reading("eu", ProbeReading::healthy(40.0));
        probe.set_failure("us", "down");
        let mut config = HealthCheckConfig::default();
        config.breaker.failure_threshold = 1;
        config.breaker.cooldown_base_ms = 50;
        config.breaker.cooldown_max_ms = 50;
        let (checker, store) = checker(probe.clone(), config);

        checker.sweep().await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        // The trial probe is still running when the sweep is dropped.
        probe.set_reading("us", ProbeReading::healthy(40.0));
        probe.set_delay("us", Duration::from_millis(200));
        let cancelled = tokio::time::timeout(Duration::from_millis(20), checker.sweep()).await;
        assert!(cancelled.is_err());

        probe.set_delay("us", Duration::ZERO);
        let report = checker.sweep().await.unwrap();
        assert_eq!(report.healthy, 2);

        let us = store.get_region("us").unwrap().unwrap();
        assert_eq!(us.status, RegionStatus::Healthy);
        assert_eq!(store.health_history("us", 1).unwrap()[0].error, None);
    }

    #[tokio::test]
    async fn test_reconfigure_applies_deadline_and_resets_breakers() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_reading("eu", ProbeReading::healthy(40.0));
        probe.set_failure("us", "down");
        let mut config = HealthCheckConfig::default();
        config.breaker.failure_threshold = 1;
        let (checker, _) = checker(probe.clone(), config.clone());

        checker.check_all().await.unwrap();
        probe.set_reading("us", ProbeReading::healthy(40.0));
        probe.set_delay("eu", Duration::from_millis(300));

        config.probe_timeout_ms = 50;
        config.breaker.failure_threshold = 2;
        checker.reconfigure(&config);
        assert_eq!(checker.probe_timeout(), Duration::from_millis(50));

        let results = checker.check_all().await.unwrap();
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
        assert!(results[1].healthy);
    }

    #[tokio::test]
    async fn test_consecutive_policy_delays_transition() {
        let probe = Arc::new(ScriptedProbe::new());
        probe.set_reading("eu", ProbeReading::healthy(40.0));
        probe.set_reading("us", ProbeReading::healthy(40.0).with_cpu(0.99));
        let config = HealthCheckConfig {
            policy: TransitionPolicy::Consecutive {
                unhealthy_threshold: 2,
                healthy_threshold: 2,
            },
            ..HealthCheckConfig::default()
        };
        let (checker, store) = checker(probe, config);

        checker.sweep().await.unwrap();
        assert_eq!(store.get_region("us").unwrap().unwrap().status, RegionStatus::Healthy);
        checker.sweep().await.unwrap();
        assert_eq!(store.get_region("us").unwrap().unwrap().status, RegionStatus::Degraded);
    }
}

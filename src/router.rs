//! The routing core: every external operation in one place.
//!
//! # Responsibilities
//! - Wire registry, health checker, routing, telemetry and alerts over one
//!   shared store
//! - Expose the transport-agnostic operations used by the HTTP layer and
//!   the scheduler
//! - Apply hot-reloaded thresholds
//!
//! # Design Decisions
//! - Tunables live behind `ArcSwap` handles shared with the components, so a
//!   reload is a pointer swap and in-flight work keeps its snapshot
//! - Region definitions, listener, storage, schedules and logging are read
//!   once; a reload that changes them only logs a warning

use arc_swap::ArcSwap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts::{AlertCenter, AlertDispatcher, SystemAlert};
use crate::clock::{now_millis, Millis};
use crate::config::{
    AggregationConfig, FailoverConfig, HealthThresholds, RouterConfig, RoutingConfig,
};
use crate::error::{RouterError, RouterResult};
use crate::health::{HealthChecker, Probe, SweepReport};
use crate::region::{GeoPoint, HealthCheckResult, RegionNode, RegionRegistry, RegionStatus};
use crate::routing::{
    FailoverController, FailoverEvent, FailoverReason, RegionAssignor, RoutingPath,
};
use crate::storage::Store;
use crate::telemetry::{
    MetricName, MetricsAggregator, RollingAverage, ServiceHealthAggregator, SystemHealth,
};

/// Health snapshot attached to a routing answer.
#[derive(Debug, Clone, Serialize)]
pub struct RegionHealth {
    pub latency_ms: f64,
    pub status: RegionStatus,
}

/// Answer to `GetRouting`.
#[derive(Debug, Clone, Serialize)]
pub struct RoutingResponse {
    pub region: String,
    pub endpoints: BTreeMap<String, String>,
    pub health: RegionHealth,
    pub path: &'static str,
}

impl RoutingResponse {
    fn new(node: RegionNode, path: RoutingPath) -> Self {
        Self {
            health: RegionHealth {
                latency_ms: node.latency_ms,
                status: node.status,
            },
            region: node.region_id,
            endpoints: node.endpoints,
            path: path.as_str(),
        }
    }
}

/// One row of `GetRegionStatuses`.
#[derive(Debug, Clone, Serialize)]
pub struct RegionStatusView {
    pub region: String,
    pub healthy: bool,
    pub status: RegionStatus,
    pub latency_ms: f64,
    pub cpu_usage: f64,
    pub error_rate: f64,
    pub active_users: u64,
    pub last_health_check_at: Option<Millis>,
}

impl From<RegionNode> for RegionStatusView {
    fn from(node: RegionNode) -> Self {
        Self {
            healthy: node.status.is_healthy(),
            region: node.region_id,
            status: node.status,
            latency_ms: node.latency_ms,
            cpu_usage: node.cpu_usage,
            error_rate: node.error_rate,
            active_users: node.active_users,
            last_health_check_at: node.last_health_check_at,
        }
    }
}

/// Rows removed by a cleanup run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub samples_purged: usize,
    pub history_purged: usize,
    pub alerts_purged: usize,
}

/// The region router.
#[derive(Debug)]
pub struct RouterCore {
    config: ArcSwap<RouterConfig>,
    store: Arc<dyn Store>,
    registry: RegionRegistry,
    checker: Arc<HealthChecker>,
    assignor: RegionAssignor,
    failover: FailoverController,
    metrics: MetricsAggregator,
    services: ServiceHealthAggregator,
    alerts: AlertCenter,
    thresholds: Arc<ArcSwap<HealthThresholds>>,
    routing: Arc<ArcSwap<RoutingConfig>>,
    failover_config: Arc<ArcSwap<FailoverConfig>>,
    aggregation: Arc<ArcSwap<AggregationConfig>>,
}

impl RouterCore {
    /// Create a router over `store`, registering the configured regions.
    pub fn new(
        config: RouterConfig,
        store: Arc<dyn Store>,
        probe: Arc<dyn Probe>,
    ) -> RouterResult<Self> {
        Self::with_dispatchers(config, store, probe, Vec::new())
    }

    /// Like [`RouterCore::new`], forwarding alerts to extra dispatchers.
    pub fn with_dispatchers(
        config: RouterConfig,
        store: Arc<dyn Store>,
        probe: Arc<dyn Probe>,
        dispatchers: Vec<Arc<dyn AlertDispatcher>>,
    ) -> RouterResult<Self> {
        let registry = RegionRegistry::new(store.clone());
        registry.initialize(&config.regions)?;

        let alerts = dispatchers
            .into_iter()
            .fold(AlertCenter::new(store.clone()), |center, d| {
                center.with_dispatcher(d)
            });

        let thresholds = Arc::new(ArcSwap::from_pointee(config.health_check.thresholds));
        let routing = Arc::new(ArcSwap::from_pointee(config.routing.clone()));
        let failover_config = Arc::new(ArcSwap::from_pointee(config.failover));
        let aggregation = Arc::new(ArcSwap::from_pointee(config.aggregation.clone()));

        let checker = Arc::new(HealthChecker::new(
            &config.health_check,
            registry.clone(),
            store.clone(),
            probe,
            alerts.clone(),
            thresholds.clone(),
        ));
        let assignor = RegionAssignor::new(registry.clone(), store.clone(), routing.clone());
        let failover = FailoverController::new(
            registry.clone(),
            store.clone(),
            checker.clone(),
            failover_config.clone(),
        );
        let metrics = MetricsAggregator::new(store.clone(), alerts.clone(), aggregation.clone());
        let services =
            ServiceHealthAggregator::new(store.clone(), alerts.clone(), aggregation.clone());

        Ok(Self {
            config: ArcSwap::from_pointee(config),
            store,
            registry,
            checker,
            assignor,
            failover,
            metrics,
            services,
            alerts,
            thresholds,
            routing,
            failover_config,
            aggregation,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> Arc<RouterConfig> {
        self.config.load_full()
    }

    pub fn registry(&self) -> &RegionRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Swap in reloaded tunables.
    ///
    /// Settings only read at startup are left as they are and each change is
    /// logged. A default region that is not registered is refused and the
    /// previous default stays in force.
    pub fn apply_config(&self, mut new: RouterConfig) {
        let current = self.config.load_full();
        for field in restart_required(&current, &new) {
            tracing::warn!(field, "Setting changed; restart required to apply it");
        }

        let registered = self
            .registry
            .contains(&new.routing.default_region)
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Could not look up default region");
                false
            });
        if !registered {
            tracing::warn!(
                requested = %new.routing.default_region,
                kept = %current.routing.default_region,
                "Default region is not registered; keeping the previous default"
            );
            new.routing.default_region = current.routing.default_region.clone();
        }

        self.thresholds.store(Arc::new(new.health_check.thresholds));
        self.checker.reconfigure(&new.health_check);
        self.routing.store(Arc::new(new.routing.clone()));
        self.failover_config.store(Arc::new(new.failover));
        self.aggregation.store(Arc::new(new.aggregation.clone()));
        self.config.store(Arc::new(new));
        tracing::info!("Configuration reloaded");
    }

    /// GetRouting. Never fails for lack of a healthy region.
    pub fn get_routing(
        &self,
        user_id: &str,
        location: Option<GeoPoint>,
    ) -> RouterResult<RoutingResponse> {
        let decision = self.assignor.resolve_region(user_id, location)?;
        Ok(RoutingResponse::new(decision.region, decision.path))
    }

    /// ForceFailover. Fails with `NoHealthyRegion` when there is no target.
    pub async fn force_failover(
        &self,
        user_id: &str,
        from_region: &str,
        reason: FailoverReason,
    ) -> RouterResult<FailoverEvent> {
        self.failover.failover(user_id, from_region, reason).await
    }

    /// GetRegionStatuses, ordered by region id.
    pub fn region_statuses(&self) -> RouterResult<Vec<RegionStatusView>> {
        Ok(self
            .registry
            .list_all()?
            .into_iter()
            .map(RegionStatusView::from)
            .collect())
    }

    /// RecordMetric.
    pub fn record_metric(&self, metric: MetricName, value: f64) -> RouterResult<RollingAverage> {
        self.metrics.record(metric, value)
    }

    /// GetSystemHealth as of the last service sweep.
    pub fn system_health(&self) -> RouterResult<SystemHealth> {
        self.services.system_health()
    }

    /// GetActiveAlerts, newest first.
    pub fn active_alerts(&self) -> RouterResult<Vec<SystemAlert>> {
        self.alerts.active()
    }

    /// ResolveAlert.
    pub fn resolve_alert(&self, alert_id: Uuid, resolved_by: &str) -> RouterResult<SystemAlert> {
        self.alerts.resolve(alert_id, resolved_by)
    }

    /// Recent health results for a region, newest first.
    pub fn region_history(
        &self,
        region_id: &str,
        limit: Option<usize>,
    ) -> RouterResult<Vec<HealthCheckResult>> {
        self.registry.get(region_id)?;
        let limit = limit.unwrap_or(self.config.load().health_check.history_limit);
        Ok(self.store.health_history(region_id, limit)?)
    }

    /// Failover audit log for a user, oldest first.
    pub fn failover_log(&self, user_id: &str) -> RouterResult<Vec<FailoverEvent>> {
        Ok(self.store.failover_events(user_id)?)
    }

    /// One health sweep over every region.
    pub async fn run_health_sweep(&self) -> RouterResult<SweepReport> {
        self.checker.sweep().await
    }

    /// One service-health sweep.
    pub fn run_service_sweep(&self) -> RouterResult<SystemHealth> {
        self.services.sweep()
    }

    /// Purge raw samples, health history and alerts past retention.
    /// Running means are kept.
    pub fn cleanup(&self) -> RouterResult<CleanupReport> {
        self.cleanup_at(now_millis())
    }

    /// Cleanup with `now` as the reference time.
    pub fn cleanup_at(&self, now: Millis) -> RouterResult<CleanupReport> {
        let retention = self.config.load().retention.clone();
        let cutoff = |secs: u64| now.saturating_sub(secs.saturating_mul(1_000));

        let report = CleanupReport {
            samples_purged: self
                .store
                .purge_samples_before(cutoff(retention.sample_retention_secs))?,
            history_purged: self
                .store
                .purge_health_history_before(cutoff(retention.history_retention_secs))?,
            alerts_purged: self
                .store
                .purge_alerts_before(cutoff(retention.alert_retention_secs))?,
        };
        tracing::info!(
            samples_purged = report.samples_purged,
            history_purged = report.history_purged,
            alerts_purged = report.alerts_purged,
            "Cleanup complete"
        );
        Ok(report)
    }

    /// Persist the store.
    pub fn flush(&self) -> RouterResult<()> {
        Ok(self.store.flush()?)
    }

    /// Persist the store on the blocking thread pool.
    pub async fn flush_blocking(self: Arc<Self>) -> RouterResult<()> {
        tokio::task::spawn_blocking(move || self.flush())
            .await
            .map_err(|e| RouterError::DependencyUnavailable(format!("store flush task: {}", e)))?
    }
}

/// Settings that changed between `current` and `new` but are only read at
/// startup.
pub fn restart_required(current: &RouterConfig, new: &RouterConfig) -> Vec<&'static str> {
    let checks = [
        ("regions", current.regions != new.regions),
        (
            "listener.bind_address",
            current.listener.bind_address != new.listener.bind_address,
        ),
        (
            "listener.request_timeout_secs",
            current.listener.request_timeout_secs != new.listener.request_timeout_secs,
        ),
        ("storage.path", current.storage.path != new.storage.path),
        (
            "storage.flush_interval_secs",
            current.storage.flush_interval_secs != new.storage.flush_interval_secs,
        ),
        (
            "health_check.enabled",
            current.health_check.enabled != new.health_check.enabled,
        ),
        (
            "health_check.interval_secs",
            current.health_check.interval_secs != new.health_check.interval_secs,
        ),
        (
            "aggregation.interval_secs",
            current.aggregation.interval_secs != new.aggregation.interval_secs,
        ),
        (
            "retention.cleanup_interval_secs",
            current.retention.cleanup_interval_secs != new.retention.cleanup_interval_secs,
        ),
        (
            "observability.log_level",
            current.observability.log_level != new.observability.log_level,
        ),
        (
            "observability.log_format",
            current.observability.log_format != new.observability.log_format,
        ),
        (
            "observability.metrics_enabled",
            current.observability.metrics_enabled != new.observability.metrics_enabled,
        ),
        (
            "observability.metrics_address",
            current.observability.metrics_address != new.observability.metrics_address,
        ),
    ];
    checks
        .into_iter()
        .filter(|(_, changed)| *changed)
        .map(|(field, _)| field)
        .collect()
}

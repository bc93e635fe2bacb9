//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! Business logic (registry, assignor, failover, aggregators, alerts)
//!     → Store trait (this file)
//!         → memory.rs  (DashMap-backed, tests and single node)
//!         → file.rs    (memory + JSON snapshot, durable)
//! ```
//!
//! # Design Decisions
//! - Business logic never sees the storage technology
//! - Append-only record kinds (history, failovers, samples) expose no update
//! - Recording a sample and folding it into the rolling average is a single
//!   store operation so concurrent writers never lose an update

pub mod file;
pub mod memory;

use thiserror::Error;
use uuid::Uuid;

use crate::alerts::SystemAlert;
use crate::clock::Millis;
use crate::region::{HealthCheckResult, RegionNode, RegionUpdate};
use crate::routing::types::{FailoverEvent, UserRegionMapping};
use crate::telemetry::metric::{MetricName, MetricSample, RollingAverage, ServiceHealthStatus};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Repository for every record kind the router persists.
pub trait Store: Send + Sync + std::fmt::Debug {
    fn get_region(&self, region_id: &str) -> StoreResult<Option<RegionNode>>;
    fn put_region(&self, node: RegionNode) -> StoreResult<()>;
    /// Apply partial updates in one batch. Returns the ids that were not found.
    fn update_regions(&self, updates: &[(String, RegionUpdate)]) -> StoreResult<Vec<String>>;
    /// All regions, ordered by region id.
    fn list_regions(&self) -> StoreResult<Vec<RegionNode>>;
    /// Returns true if the region existed.
    fn remove_region(&self, region_id: &str) -> StoreResult<bool>;

    fn append_health_results(&self, results: &[HealthCheckResult]) -> StoreResult<()>;
    /// Most recent results for a region, newest first.
    fn health_history(&self, region_id: &str, limit: usize) -> StoreResult<Vec<HealthCheckResult>>;
    fn purge_health_history_before(&self, cutoff: Millis) -> StoreResult<usize>;

    fn get_mapping(&self, user_id: &str) -> StoreResult<Option<UserRegionMapping>>;
    /// Unconditional overwrite (last writer wins).
    fn put_mapping(&self, mapping: UserRegionMapping) -> StoreResult<()>;

    fn append_failover(&self, event: FailoverEvent) -> StoreResult<()>;
    /// Failover log for a user, oldest first.
    fn failover_events(&self, user_id: &str) -> StoreResult<Vec<FailoverEvent>>;

    fn put_alert(&self, alert: SystemAlert) -> StoreResult<()>;
    fn get_alert(&self, id: Uuid) -> StoreResult<Option<SystemAlert>>;
    fn list_alerts(&self) -> StoreResult<Vec<SystemAlert>>;
    /// Drop alerts raised before `cutoff`, resolved or not.
    fn purge_alerts_before(&self, cutoff: Millis) -> StoreResult<usize>;

    /// Append a sample and fold it into the metric's rolling average.
    fn record_sample(&self, sample: MetricSample) -> StoreResult<RollingAverage>;
    fn samples_since(&self, metric: MetricName, since: Millis) -> StoreResult<Vec<MetricSample>>;
    /// Drop raw samples older than `cutoff`. Rolling averages are untouched.
    fn purge_samples_before(&self, cutoff: Millis) -> StoreResult<usize>;
    fn rolling_average(&self, metric: MetricName) -> StoreResult<Option<RollingAverage>>;

    fn put_service_health(&self, status: ServiceHealthStatus) -> StoreResult<()>;
    fn list_service_health(&self) -> StoreResult<Vec<ServiceHealthStatus>>;

    /// Persist buffered state. No-op for purely in-memory stores.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

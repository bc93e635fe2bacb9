//! Durable store: in-memory working set persisted as a JSON snapshot.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::alerts::SystemAlert;
use crate::clock::Millis;
use crate::region::{HealthCheckResult, RegionNode, RegionUpdate};
use crate::routing::types::{FailoverEvent, UserRegionMapping};
use crate::storage::memory::{MemoryStore, Snapshot};
use crate::storage::{Store, StoreResult};
use crate::telemetry::metric::{MetricName, MetricSample, RollingAverage, ServiceHealthStatus};

/// File-backed implementation of [`Store`].
///
/// Reads and writes hit the in-memory working set; `flush` writes a full
/// snapshot to a temporary file and renames it over the target, so a crash
/// mid-write leaves the previous snapshot intact.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
}

impl FileStore {
    /// Open a store at `path`, loading the existing snapshot if present.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let inner = if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let snapshot: Snapshot = serde_json::from_reader(reader)?;
            tracing::info!(
                path = %path.display(),
                regions = snapshot.regions.len(),
                mappings = snapshot.mappings.len(),
                "Loaded store snapshot"
            );
            MemoryStore::from_snapshot(snapshot)
        } else {
            MemoryStore::new()
        };
        Ok(Self { inner, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for FileStore {
    fn get_region(&self, region_id: &str) -> StoreResult<Option<RegionNode>> {
        self.inner.get_region(region_id)
    }

    fn put_region(&self, node: RegionNode) -> StoreResult<()> {
        self.inner.put_region(node)
    }

    fn update_regions(&self, updates: &[(String, RegionUpdate)]) -> StoreResult<Vec<String>> {
        self.inner.update_regions(updates)
    }

    fn list_regions(&self) -> StoreResult<Vec<RegionNode>> {
        self.inner.list_regions()
    }

    fn remove_region(&self, region_id: &str) -> StoreResult<bool> {
        self.inner.remove_region(region_id)
    }

    fn append_health_results(&self, results: &[HealthCheckResult]) -> StoreResult<()> {
        self.inner.append_health_results(results)
    }

    fn health_history(&self, region_id: &str, limit: usize) -> StoreResult<Vec<HealthCheckResult>> {
        self.inner.health_history(region_id, limit)
    }

    fn purge_health_history_before(&self, cutoff: Millis) -> StoreResult<usize> {
        self.inner.purge_health_history_before(cutoff)
    }

    fn get_mapping(&self, user_id: &str) -> StoreResult<Option<UserRegionMapping>> {
        self.inner.get_mapping(user_id)
    }

    fn put_mapping(&self, mapping: UserRegionMapping) -> StoreResult<()> {
        self.inner.put_mapping(mapping)
    }

    fn append_failover(&self, event: FailoverEvent) -> StoreResult<()> {
        self.inner.append_failover(event)
    }

    fn failover_events(&self, user_id: &str) -> StoreResult<Vec<FailoverEvent>> {
        self.inner.failover_events(user_id)
    }

    fn put_alert(&self, alert: SystemAlert) -> StoreResult<()> {
        self.inner.put_alert(alert)
    }

    fn get_alert(&self, id: Uuid) -> StoreResult<Option<SystemAlert>> {
        self.inner.get_alert(id)
    }

    fn list_alerts(&self) -> StoreResult<Vec<SystemAlert>> {
        self.inner.list_alerts()
    }

    fn purge_alerts_before(&self, cutoff: Millis) -> StoreResult<usize> {
        self.inner.purge_alerts_before(cutoff)
    }

    fn record_sample(&self, sample: MetricSample) -> StoreResult<RollingAverage> {
        self.inner.record_sample(sample)
    }

    fn samples_since(&self, metric: MetricName, since: Millis) -> StoreResult<Vec<MetricSample>> {
        self.inner.samples_since(metric, since)
    }

    fn purge_samples_before(&self, cutoff: Millis) -> StoreResult<usize> {
        self.inner.purge_samples_before(cutoff)
    }

    fn rolling_average(&self, metric: MetricName) -> StoreResult<Option<RollingAverage>> {
        self.inner.rolling_average(metric)
    }

    fn put_service_health(&self, status: ServiceHealthStatus) -> StoreResult<()> {
        self.inner.put_service_health(status)
    }

    fn list_service_health(&self) -> StoreResult<Vec<ServiceHealthStatus>> {
        self.inner.list_service_health()
    }

    fn flush(&self) -> StoreResult<()> {
        let snapshot = self.inner.snapshot();
        let tmp = self.path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer(&mut writer, &snapshot)?;
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;
        tracing::debug!(path = %self.path.display(), "Store snapshot written");
        Ok(())
    }
}

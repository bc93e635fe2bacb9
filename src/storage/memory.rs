//! In-memory store.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alerts::SystemAlert;
use crate::clock::Millis;
use crate::region::{HealthCheckResult, RegionNode, RegionUpdate};
use crate::routing::types::{FailoverEvent, UserRegionMapping};
use crate::storage::{Store, StoreResult};
use crate::telemetry::metric::{
    MetricName, MetricSample, RollingAverage, ServiceHealthStatus, ServiceName,
};

/// Concurrent map-backed implementation of [`Store`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    regions: DashMap<String, RegionNode>,
    history: DashMap<String, Vec<HealthCheckResult>>,
    mappings: DashMap<String, UserRegionMapping>,
    failovers: DashMap<String, Vec<FailoverEvent>>,
    alerts: DashMap<Uuid, SystemAlert>,
    samples: DashMap<MetricName, Vec<MetricSample>>,
    rolling: DashMap<MetricName, RollingAverage>,
    service_health: DashMap<ServiceName, ServiceHealthStatus>,
}

/// Serializable image of a [`MemoryStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub regions: Vec<RegionNode>,
    pub history: Vec<HealthCheckResult>,
    pub mappings: Vec<UserRegionMapping>,
    pub failovers: Vec<FailoverEvent>,
    pub alerts: Vec<SystemAlert>,
    pub samples: Vec<MetricSample>,
    pub rolling: Vec<RollingAverage>,
    pub service_health: Vec<ServiceHealthStatus>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current contents into a snapshot.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            regions: self.regions.iter().map(|r| r.value().clone()).collect(),
            history: self.history.iter().flat_map(|r| r.value().clone()).collect(),
            mappings: self.mappings.iter().map(|r| r.value().clone()).collect(),
            failovers: self.failovers.iter().flat_map(|r| r.value().clone()).collect(),
            alerts: self.alerts.iter().map(|r| r.value().clone()).collect(),
            samples: self.samples.iter().flat_map(|r| r.value().clone()).collect(),
            rolling: self.rolling.iter().map(|r| r.value().clone()).collect(),
            service_health: self.service_health.iter().map(|r| r.value().clone()).collect(),
        }
    }

    /// Rebuild a store from a snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let store = Self::new();
        for node in snapshot.regions {
            store.regions.insert(node.region_id.clone(), node);
        }
        for result in snapshot.history {
            store.history.entry(result.region_id.clone()).or_default().push(result);
        }
        for mapping in snapshot.mappings {
            store.mappings.insert(mapping.user_id.clone(), mapping);
        }
        for event in snapshot.failovers {
            store.failovers.entry(event.user_id.clone()).or_default().push(event);
        }
        for alert in snapshot.alerts {
            store.alerts.insert(alert.id, alert);
        }
        for sample in snapshot.samples {
            store.samples.entry(sample.metric).or_default().push(sample);
        }
        for avg in snapshot.rolling {
            store.rolling.insert(avg.metric, avg);
        }
        for status in snapshot.service_health {
            store.service_health.insert(status.service_name, status);
        }
        store
    }
}

impl Store for MemoryStore {
    fn get_region(&self, region_id: &str) -> StoreResult<Option<RegionNode>> {
        Ok(self.regions.get(region_id).map(|r| r.value().clone()))
    }

    fn put_region(&self, node: RegionNode) -> StoreResult<()> {
        self.regions.insert(node.region_id.clone(), node);
        Ok(())
    }

    fn update_regions(&self, updates: &[(String, RegionUpdate)]) -> StoreResult<Vec<String>> {
        let mut missing = Vec::new();
        for (region_id, update) in updates {
            match self.regions.get_mut(region_id) {
                Some(mut node) => update.apply_to(&mut node),
                None => missing.push(region_id.clone()),
            }
        }
        Ok(missing)
    }

    fn list_regions(&self) -> StoreResult<Vec<RegionNode>> {
        let mut nodes: Vec<RegionNode> = self.regions.iter().map(|r| r.value().clone()).collect();
        nodes.sort_by(|a, b| a.region_id.cmp(&b.region_id));
        Ok(nodes)
    }

    fn remove_region(&self, region_id: &str) -> StoreResult<bool> {
        Ok(self.regions.remove(region_id).is_some())
    }

    fn append_health_results(&self, results: &[HealthCheckResult]) -> StoreResult<()> {
        for result in results {
            self.history
                .entry(result.region_id.clone())
                .or_default()
                .push(result.clone());
        }
        Ok(())
    }

    fn health_history(&self, region_id: &str, limit: usize) -> StoreResult<Vec<HealthCheckResult>> {
        Ok(self
            .history
            .get(region_id)
            .map(|r| r.value().iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn purge_health_history_before(&self, cutoff: Millis) -> StoreResult<usize> {
        let mut purged = 0;
        for mut entry in self.history.iter_mut() {
            let before = entry.len();
            entry.retain(|r| r.observed_at >= cutoff);
            purged += before - entry.len();
        }
        Ok(purged)
    }

    fn get_mapping(&self, user_id: &str) -> StoreResult<Option<UserRegionMapping>> {
        Ok(self.mappings.get(user_id).map(|r| r.value().clone()))
    }

    fn put_mapping(&self, mapping: UserRegionMapping) -> StoreResult<()> {
        self.mappings.insert(mapping.user_id.clone(), mapping);
        Ok(())
    }

    fn append_failover(&self, event: FailoverEvent) -> StoreResult<()> {
        self.failovers.entry(event.user_id.clone()).or_default().push(event);
        Ok(())
    }

    fn failover_events(&self, user_id: &str) -> StoreResult<Vec<FailoverEvent>> {
        Ok(self
            .failovers
            .get(user_id)
            .map(|r| r.value().clone())
            .unwrap_or_default())
    }

    fn put_alert(&self, alert: SystemAlert) -> StoreResult<()> {
        self.alerts.insert(alert.id, alert);
        Ok(())
    }

    fn get_alert(&self, id: Uuid) -> StoreResult<Option<SystemAlert>> {
        Ok(self.alerts.get(&id).map(|r| r.value().clone()))
    }

    fn list_alerts(&self) -> StoreResult<Vec<SystemAlert>> {
        Ok(self.alerts.iter().map(|r| r.value().clone()).collect())
    }

    fn purge_alerts_before(&self, cutoff: Millis) -> StoreResult<usize> {
        let before = self.alerts.len();
        self.alerts.retain(|_, alert| alert.occurred_at >= cutoff);
        Ok(before - self.alerts.len())
    }

    fn record_sample(&self, sample: MetricSample) -> StoreResult<RollingAverage> {
        // Lock order: rolling entry, then samples.
        let mut avg = self
            .rolling
            .entry(sample.metric)
            .or_insert_with(|| RollingAverage::new(sample.metric));
        avg.absorb(sample.value, sample.observed_at);
        let updated = avg.clone();
        self.samples.entry(sample.metric).or_default().push(sample);
        Ok(updated)
    }

    fn samples_since(&self, metric: MetricName, since: Millis) -> StoreResult<Vec<MetricSample>> {
        Ok(self
            .samples
            .get(&metric)
            .map(|r| r.value().iter().filter(|s| s.observed_at >= since).cloned().collect())
            .unwrap_or_default())
    }

    fn purge_samples_before(&self, cutoff: Millis) -> StoreResult<usize> {
        let mut purged = 0;
        for mut entry in self.samples.iter_mut() {
            let before = entry.len();
            entry.retain(|s| s.observed_at >= cutoff);
            purged += before - entry.len();
        }
        Ok(purged)
    }

    fn rolling_average(&self, metric: MetricName) -> StoreResult<Option<RollingAverage>> {
        Ok(self.rolling.get(&metric).map(|r| r.value().clone()))
    }

    fn put_service_health(&self, status: ServiceHealthStatus) -> StoreResult<()> {
        self.service_health.insert(status.service_name, status);
        Ok(())
    }

    fn list_service_health(&self) -> StoreResult<Vec<ServiceHealthStatus>> {
        let mut statuses: Vec<ServiceHealthStatus> =
            self.service_health.iter().map(|r| r.value().clone()).collect();
        statuses.sort_by_key(|s| s.service_name);
        Ok(statuses)
    }
}

//! Region data model.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::clock::Millis;
use crate::region::geo::GeoPoint;

/// Latency recorded for a region whose probe failed.
pub const OFFLINE_LATENCY_MS: f64 = 999_999.0;

/// Derived health status of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    /// All thresholds pass; region accepts new sessions.
    Healthy,
    /// Probe succeeded but at least one threshold was breached.
    Degraded,
    /// Probe failed, timed out, or the breaker is open.
    Offline,
}

impl RegionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionStatus::Healthy => "healthy",
            RegionStatus::Degraded => "degraded",
            RegionStatus::Offline => "offline",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, RegionStatus::Healthy)
    }
}

/// Canonical state of one known region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionNode {
    pub region_id: String,
    pub status: RegionStatus,
    /// Last measured round-trip latency.
    pub latency_ms: f64,
    /// CPU usage in `[0, 1]`.
    pub cpu_usage: f64,
    /// Error rate in `[0, 1]`.
    pub error_rate: f64,
    pub active_users: u64,
    /// `None` until the first sweep has evaluated the region.
    pub last_health_check_at: Option<Millis>,
    /// Fixed reference coordinate used for latency estimation.
    pub location: GeoPoint,
    /// Service name → address, opaque to the router.
    pub endpoints: BTreeMap<String, String>,
}

impl RegionNode {
    /// A freshly registered region, assumed healthy until the first sweep.
    pub fn new(
        region_id: impl Into<String>,
        location: GeoPoint,
        endpoints: BTreeMap<String, String>,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            status: RegionStatus::Healthy,
            latency_ms: 0.0,
            cpu_usage: 0.0,
            error_rate: 0.0,
            active_users: 0,
            last_health_check_at: None,
            location,
            endpoints,
        }
    }
}

/// Partial update applied to a `RegionNode`. `None` fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegionUpdate {
    pub status: Option<RegionStatus>,
    pub latency_ms: Option<f64>,
    pub cpu_usage: Option<f64>,
    pub error_rate: Option<f64>,
    pub active_users: Option<u64>,
    pub last_health_check_at: Option<Millis>,
    pub location: Option<GeoPoint>,
    pub endpoints: Option<BTreeMap<String, String>>,
}

impl RegionUpdate {
    /// Apply the set fields onto `node`.
    pub fn apply_to(&self, node: &mut RegionNode) {
        if let Some(status) = self.status {
            node.status = status;
        }
        if let Some(latency) = self.latency_ms {
            node.latency_ms = latency;
        }
        if let Some(cpu) = self.cpu_usage {
            node.cpu_usage = cpu;
        }
        if let Some(rate) = self.error_rate {
            node.error_rate = rate;
        }
        if let Some(users) = self.active_users {
            node.active_users = users;
        }
        if let Some(at) = self.last_health_check_at {
            node.last_health_check_at = Some(at);
        }
        if let Some(location) = self.location {
            node.location = location;
        }
        if let Some(endpoints) = &self.endpoints {
            node.endpoints = endpoints.clone();
        }
    }
}

/// Outcome of probing one region. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub region_id: String,
    /// Raw verdict of this probe (before any transition smoothing).
    pub status: RegionStatus,
    pub healthy: bool,
    pub latency_ms: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub active_connections: u64,
    pub error_rate: f64,
    pub observed_at: Millis,
    /// Probe failure description when the region was forced offline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthCheckResult {
    /// Sentinel result for a region whose probe could not complete.
    pub fn offline(region_id: impl Into<String>, error: impl Into<String>, observed_at: Millis) -> Self {
        Self {
            region_id: region_id.into(),
            status: RegionStatus::Offline,
            healthy: false,
            latency_ms: OFFLINE_LATENCY_MS,
            cpu_usage: 0.0,
            memory_usage: 0.0,
            active_connections: 0,
            error_rate: 1.0,
            observed_at,
            error: Some(error.into()),
        }
    }
}

//! Region probes.
//!
//! # Responsibilities
//! - Measure a round-trip latency proxy for a region
//! - Read the region's self-reported load (cpu, memory, connections, errors)
//!
//! # Design Decisions
//! - A probe only measures; thresholds are applied by the checker
//! - Probes carry no deadline of their own, the checker wraps each call in
//!   a timeout

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use dashmap::DashMap;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::region::RegionNode;

/// Endpoint key holding a region's status URL.
pub const HEALTH_ENDPOINT: &str = "health";

/// Largest status document accepted from a region.
const MAX_STATUS_BODY: usize = 64 * 1024;

/// Raw measurements from one probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReading {
    /// Whether the region reported itself healthy.
    pub source_healthy: bool,
    pub latency_ms: f64,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub active_connections: u64,
    pub error_rate: f64,
}

impl ProbeReading {
    /// A self-reported healthy reading with moderate load.
    pub fn healthy(latency_ms: f64) -> Self {
        Self {
            source_healthy: true,
            latency_ms,
            cpu_usage: 0.5,
            memory_usage: 0.5,
            active_connections: 0,
            error_rate: 0.0,
        }
    }

    pub fn with_cpu(mut self, cpu_usage: f64) -> Self {
        self.cpu_usage = cpu_usage;
        self
    }

    pub fn with_error_rate(mut self, error_rate: f64) -> Self {
        self.error_rate = error_rate;
        self
    }

    pub fn with_source_healthy(mut self, source_healthy: bool) -> Self {
        self.source_healthy = source_healthy;
        self
    }
}

/// Reasons a probe could not produce a reading.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("probe timed out after {0} ms")]
    Timeout(u64),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("status endpoint returned {0}")]
    Status(u16),

    #[error("malformed status report: {0}")]
    Decode(String),

    #[error("region '{0}' has no health endpoint")]
    MissingEndpoint(String),

    #[error("circuit open, probe skipped")]
    CircuitOpen,
}

impl ProbeError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Transport(_) => "transport",
            ProbeError::Status(_) => "status",
            ProbeError::Decode(_) => "decode",
            ProbeError::MissingEndpoint(_) => "missing_endpoint",
            ProbeError::CircuitOpen => "circuit_open",
        }
    }
}

/// Measures one region.
#[async_trait]
pub trait Probe: Send + Sync + std::fmt::Debug {
    async fn probe(&self, region: &RegionNode) -> Result<ProbeReading, ProbeError>;
}

/// Status document served by a region's health endpoint.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct StatusReport {
    status: String,
    cpu_usage: f64,
    memory_usage: f64,
    active_connections: u64,
    error_rate: f64,
}

impl Default for StatusReport {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            active_connections: 0,
            error_rate: 0.0,
        }
    }
}

/// Probes a region's `health` endpoint over HTTP.
///
/// Latency is the wall-clock round trip of the status request; load figures
/// come from the JSON document the region returns.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: Client<HttpConnector, Body>,
}

impl HttpProbe {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client }
    }
}

impl Default for HttpProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, region: &RegionNode) -> Result<ProbeReading, ProbeError> {
        let url = region
            .endpoints
            .get(HEALTH_ENDPOINT)
            .ok_or_else(|| ProbeError::MissingEndpoint(region.region_id.clone()))?;

        let request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("user-agent", "region-router-health-check")
            .body(Body::empty())
            .map_err(|e| ProbeError::Transport(e.to_string()))?;

        let started = Instant::now();
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let bytes = axum::body::to_bytes(Body::new(response.into_body()), MAX_STATUS_BODY)
            .await
            .map_err(|e| ProbeError::Transport(e.to_string()))?;
        let report: StatusReport = if bytes.is_empty() {
            StatusReport::default()
        } else {
            serde_json::from_slice(&bytes).map_err(|e| ProbeError::Decode(e.to_string()))?
        };

        Ok(ProbeReading {
            source_healthy: report.status.eq_ignore_ascii_case("healthy"),
            latency_ms,
            cpu_usage: report.cpu_usage,
            memory_usage: report.memory_usage,
            active_connections: report.active_connections,
            error_rate: report.error_rate,
        })
    }
}

/// Probe returning preset readings, switchable at runtime. Used by tests and
/// dry runs.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    outcomes: DashMap<String, Result<ProbeReading, ProbeError>>,
    delays: DashMap<String, Duration>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reading(&self, region_id: &str, reading: ProbeReading) {
        self.outcomes.insert(region_id.to_string(), Ok(reading));
    }

    pub fn set_failure(&self, region_id: &str, message: &str) {
        self.outcomes
            .insert(region_id.to_string(), Err(ProbeError::Transport(message.to_string())));
    }

    /// Delay the probe of `region_id` before answering.
    pub fn set_delay(&self, region_id: &str, delay: Duration) {
        self.delays.insert(region_id.to_string(), delay);
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, region: &RegionNode) -> Result<ProbeReading, ProbeError> {
        let delay = self.delays.get(&region.region_id).map(|d| *d.value());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.outcomes
            .get(&region.region_id)
            .map(|r| r.value().clone())
            .unwrap_or_else(|| Err(ProbeError::Transport("no scripted reading".to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::GeoPoint;
    use std::collections::BTreeMap;

    fn node(id: &str) -> RegionNode {
        RegionNode::new(id, GeoPoint::default(), BTreeMap::new())
    }

    #[tokio::test]
    async fn test_http_probe_requires_endpoint() {
        let err = HttpProbe::new().probe(&node("eu")).await.unwrap_err();
        assert_eq!(err, ProbeError::MissingEndpoint("eu".into()));
    }

    #[tokio::test]
    async fn test_scripted_probe() {
        let probe = ScriptedProbe::new();
        probe.set_reading("eu", ProbeReading::healthy(50.0));
        probe.set_failure("us", "refused");

        assert_eq!(probe.probe(&node("eu")).await.unwrap().latency_ms, 50.0);
        assert!(matches!(probe.probe(&node("us")).await, Err(ProbeError::Transport(_))));
        assert!(probe.probe(&node("asia")).await.is_err());
    }

    #[test]
    fn test_status_report_defaults() {
        let report: StatusReport = serde_json::from_str(r#"{"cpu_usage": 0.9}"#).unwrap();
        assert_eq!(report.status, "healthy");
        assert_eq!(report.cpu_usage, 0.9);
        assert_eq!(report.error_rate, 0.0);
    }
}

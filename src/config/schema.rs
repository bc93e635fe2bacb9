//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::region::{GeoPoint, LatencyModel};

/// Root configuration for the region router.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Static region definitions.
    pub regions: Vec<RegionConfig>,

    /// Routing decisions.
    pub routing: RoutingConfig,

    /// Health sweep settings.
    pub health_check: HealthCheckConfig,

    /// Failover settings.
    pub failover: FailoverConfig,

    /// Service-health aggregation settings.
    pub aggregation: AggregationConfig,

    /// Raw data retention.
    pub retention: RetentionConfig,

    /// Storage backend.
    pub storage: StorageConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            regions: default_regions(),
            routing: RoutingConfig::default(),
            health_check: HealthCheckConfig::default(),
            failover: FailoverConfig::default(),
            aggregation: AggregationConfig::default(),
            retention: RetentionConfig::default(),
            storage: StorageConfig::default(),
            admin: AdminConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// One statically configured region.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RegionConfig {
    /// Unique region identifier (e.g., "eu").
    pub id: String,

    /// Reference latitude for latency estimation.
    pub latitude: f64,

    /// Reference longitude for latency estimation.
    pub longitude: f64,

    /// Service name → address. The `health` entry is the probe target.
    #[serde(default)]
    pub endpoints: BTreeMap<String, String>,
}

impl RegionConfig {
    pub fn location(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

fn region(id: &str, latitude: f64, longitude: f64, host: &str) -> RegionConfig {
    let endpoints = [
        ("chat", format!("wss://chat.{}", host)),
        ("calls", format!("wss://calls.{}", host)),
        ("wallet", format!("https://wallet.{}", host)),
        ("health", format!("http://status.{}/health", host)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    RegionConfig {
        id: id.to_string(),
        latitude,
        longitude,
        endpoints,
    }
}

fn default_regions() -> Vec<RegionConfig> {
    vec![
        region("eu", 50.11, 8.68, "eu.example.net"),
        region("us", 38.95, -77.45, "us.example.net"),
        region("asia", 1.35, 103.82, "asia.example.net"),
    ]
}

/// Routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Region returned when no region is healthy.
    pub default_region: String,

    /// A pinned region above this measured latency is re-evaluated.
    pub max_latency_ms: f64,

    /// Distance-to-latency model.
    pub latency_model: LatencyModel,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_region: "us".to_string(),
            max_latency_ms: 400.0,
            latency_model: LatencyModel::default(),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable the periodic sweep.
    pub enabled: bool,

    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// Deadline for a single region probe in milliseconds.
    pub probe_timeout_ms: u64,

    /// Verdict thresholds.
    pub thresholds: HealthThresholds,

    /// Status transition policy.
    pub policy: TransitionPolicy,

    /// Per-region probe circuit breaker.
    pub breaker: BreakerConfig,

    /// Number of history entries returned by the history endpoint.
    pub history_limit: usize,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 10,
            probe_timeout_ms: 2_000,
            thresholds: HealthThresholds::default(),
            policy: TransitionPolicy::default(),
            breaker: BreakerConfig::default(),
            history_limit: 50,
        }
    }
}

/// Thresholds a probe reading must stay under to be healthy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthThresholds {
    pub max_latency_ms: f64,
    pub max_cpu: f64,
    pub max_error_rate: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_latency_ms: 400.0,
            max_cpu: 0.8,
            max_error_rate: 0.05,
        }
    }
}

/// How probe verdicts turn into persisted region status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransitionPolicy {
    /// Every verdict is applied as-is.
    #[default]
    Immediate,
    /// Status changes only after N consecutive contrary verdicts.
    Consecutive {
        unhealthy_threshold: u32,
        healthy_threshold: u32,
    },
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive probe failures before the breaker opens.
    pub failure_threshold: u32,

    /// Base cooldown before a half-open probe, in milliseconds.
    pub cooldown_base_ms: u64,

    /// Maximum cooldown, in milliseconds.
    pub cooldown_max_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown_base_ms: 10_000,
            cooldown_max_ms: 300_000,
        }
    }
}

/// Failover configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FailoverConfig {
    /// Target completion time; exceeding it logs a warning.
    pub sla_ms: u64,
}

impl Default for FailoverConfig {
    fn default() -> Self {
        Self { sla_ms: 3_000 }
    }
}

/// Service-health aggregation configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregationConfig {
    /// Sweep interval in seconds.
    pub interval_secs: u64,

    /// Error/request counting window in seconds.
    pub window_secs: u64,

    /// Error rate above which a service records an issue.
    pub max_error_rate: f64,

    /// Metric name → threshold, overriding the built-in defaults.
    pub thresholds: BTreeMap<String, f64>,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            window_secs: 300,
            max_error_rate: 0.05,
            thresholds: BTreeMap::new(),
        }
    }
}

/// Retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Cleanup interval in seconds.
    pub cleanup_interval_secs: u64,

    /// Raw metric samples older than this are purged.
    pub sample_retention_secs: u64,

    /// Health history older than this is purged.
    pub history_retention_secs: u64,

    /// Alerts raised before this are purged, resolved or not.
    pub alert_retention_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 86_400,
            sample_retention_secs: 7 * 86_400,
            history_retention_secs: 7 * 86_400,
            alert_retention_secs: 7 * 86_400,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Snapshot file. In-memory only when unset.
    pub path: Option<String>,

    /// Snapshot interval in seconds.
    pub flush_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            flush_interval_secs: 30,
        }
    }
}

/// Admin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for privileged operations (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let config: RouterConfig = toml::from_str("").unwrap();
        assert_eq!(config.regions.len(), 3);
        assert_eq!(config.health_check.interval_secs, 10);
        assert_eq!(config.health_check.policy, TransitionPolicy::Immediate);
        assert_eq!(config.failover.sla_ms, 3_000);
        assert_eq!(config.routing.default_region, "us");
    }

    #[test]
    fn test_parse_regions_and_policy() {
        let raw = r#"
            [routing]
            default_region = "eu"

            [[regions]]
            id = "eu"
            latitude = 50.11
            longitude = 8.68
            endpoints = { chat = "wss://chat.eu", health = "http://10.0.0.1/health" }

            [health_check.policy]
            mode = "consecutive"
            unhealthy_threshold = 2
            healthy_threshold = 3

            [aggregation.thresholds]
            "chat.delivery_latency_ms" = 250.0
        "#;
        let config: RouterConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.regions.len(), 1);
        assert_eq!(config.regions[0].endpoints["health"], "http://10.0.0.1/health");
        assert_eq!(
            config.health_check.policy,
            TransitionPolicy::Consecutive {
                unhealthy_threshold: 2,
                healthy_threshold: 3
            }
        );
        assert_eq!(config.aggregation.thresholds["chat.delivery_latency_ms"], 250.0);
    }
}

//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_region_healthy` (gauge): 1=healthy, 0=degraded/offline, per region
//! - `router_region_latency_ms` (gauge): last measured latency, per region
//! - `router_probe_failures_total` (counter): failed/timed-out/skipped probes
//! - `router_routing_decisions_total` (counter): by path (sticky/nearest/fallback)
//! - `router_failovers_total` (counter): by reason
//! - `router_failover_duration_ms` (histogram)
//! - `router_alerts_total` (counter): by severity
//! - `router_service_status` (gauge): 0=healthy, 1=degraded, 2=critical
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter, so
//!   tests and library users pay nothing

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_region_health(region: &str, healthy: bool, latency_ms: f64) {
    gauge!("router_region_healthy", "region" => region.to_string()).set(if healthy { 1.0 } else { 0.0 });
    gauge!("router_region_latency_ms", "region" => region.to_string()).set(latency_ms);
}

pub fn record_probe_failure(region: &str, kind: &'static str) {
    counter!("router_probe_failures_total", "region" => region.to_string(), "kind" => kind).increment(1);
}

pub fn record_routing_decision(path: &'static str) {
    counter!("router_routing_decisions_total", "path" => path).increment(1);
}

pub fn record_failover(reason: &'static str, duration_ms: u64) {
    counter!("router_failovers_total", "reason" => reason).increment(1);
    histogram!("router_failover_duration_ms").record(duration_ms as f64);
}

pub fn record_alert(severity: &'static str) {
    counter!("router_alerts_total", "severity" => severity).increment(1);
}

pub fn record_service_status(service: &'static str, level: u8) {
    gauge!("router_service_status", "service" => service).set(level as f64);
}

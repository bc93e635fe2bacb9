//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (default region is registered)
//! - Validate value ranges (intervals > 0, coordinates, ratios)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{RouterConfig, TransitionPolicy};
use crate::telemetry::metric::MetricName;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Regions
    if config.regions.is_empty() {
        errors.push(ValidationError::new("regions", "at least one region is required"));
    }
    let mut seen = HashSet::new();
    for (i, region) in config.regions.iter().enumerate() {
        let field = format!("regions[{}]", i);
        if region.id.trim().is_empty() {
            errors.push(ValidationError::new(&field, "id must not be empty"));
        }
        if !seen.insert(region.id.as_str()) {
            errors.push(ValidationError::new(&field, format!("duplicate region id '{}'", region.id)));
        }
        if !region.location().is_valid() {
            errors.push(ValidationError::new(&field, "coordinates out of range"));
        }
        for (service, address) in &region.endpoints {
            if url::Url::parse(address).is_err() {
                errors.push(ValidationError::new(
                    format!("{}.endpoints.{}", field, service),
                    format!("invalid URL '{}'", address),
                ));
            }
        }
    }

    // 2. Routing
    if !config.regions.iter().any(|r| r.id == config.routing.default_region) {
        errors.push(ValidationError::new(
            "routing.default_region",
            format!("'{}' is not a configured region", config.routing.default_region),
        ));
    }
    if config.routing.max_latency_ms <= 0.0 {
        errors.push(ValidationError::new("routing.max_latency_ms", "must be positive"));
    }
    let model = &config.routing.latency_model;
    if model.base_latency_ms < 0.0 || model.ms_per_km < 0.0 {
        errors.push(ValidationError::new("routing.latency_model", "must not be negative"));
    }

    // 3. Health checks
    let hc = &config.health_check;
    if hc.interval_secs == 0 {
        errors.push(ValidationError::new("health_check.interval_secs", "must be positive"));
    }
    if hc.probe_timeout_ms == 0 {
        errors.push(ValidationError::new("health_check.probe_timeout_ms", "must be positive"));
    }
    if hc.thresholds.max_latency_ms <= 0.0 {
        errors.push(ValidationError::new("health_check.thresholds.max_latency_ms", "must be positive"));
    }
    if !(0.0..=1.0).contains(&hc.thresholds.max_cpu) {
        errors.push(ValidationError::new("health_check.thresholds.max_cpu", "must be within [0, 1]"));
    }
    if !(0.0..=1.0).contains(&hc.thresholds.max_error_rate) {
        errors.push(ValidationError::new("health_check.thresholds.max_error_rate", "must be within [0, 1]"));
    }
    if let TransitionPolicy::Consecutive { unhealthy_threshold, healthy_threshold } = hc.policy {
        if unhealthy_threshold == 0 || healthy_threshold == 0 {
            errors.push(ValidationError::new("health_check.policy", "thresholds must be positive"));
        }
    }
    if hc.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("health_check.breaker.failure_threshold", "must be positive"));
    }
    if hc.breaker.cooldown_base_ms > hc.breaker.cooldown_max_ms {
        errors.push(ValidationError::new(
            "health_check.breaker",
            "cooldown_base_ms must not exceed cooldown_max_ms",
        ));
    }

    // 4. Aggregation
    let agg = &config.aggregation;
    if agg.interval_secs == 0 {
        errors.push(ValidationError::new("aggregation.interval_secs", "must be positive"));
    }
    if agg.window_secs == 0 {
        errors.push(ValidationError::new("aggregation.window_secs", "must be positive"));
    }
    if !(0.0..=1.0).contains(&agg.max_error_rate) {
        errors.push(ValidationError::new("aggregation.max_error_rate", "must be within [0, 1]"));
    }
    for (name, value) in &agg.thresholds {
        match name.parse::<MetricName>() {
            Ok(metric) if metric.default_threshold().is_none() => errors.push(ValidationError::new(
                format!("aggregation.thresholds.{}", name),
                "counter metrics take no threshold",
            )),
            Ok(_) if *value <= 0.0 => errors.push(ValidationError::new(
                format!("aggregation.thresholds.{}", name),
                "must be positive",
            )),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::new(
                format!("aggregation.thresholds.{}", name),
                e.to_string(),
            )),
        }
    }

    // 5. Retention and storage
    if config.retention.cleanup_interval_secs == 0 {
        errors.push(ValidationError::new("retention.cleanup_interval_secs", "must be positive"));
    }
    if config.storage.path.is_some() && config.storage.flush_interval_secs == 0 {
        errors.push(ValidationError::new("storage.flush_interval_secs", "must be positive"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

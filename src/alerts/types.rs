//! Alert records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::{now_millis, Millis};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// A threshold breach raised by the health sweep, a metric sample, or the
/// service-health sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemAlert {
    pub id: Uuid,
    /// Service or region the alert is about.
    pub service: String,
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub message: String,
    pub occurred_at: Millis,
    pub resolved: bool,
    #[serde(default)]
    pub resolved_by: Option<String>,
    #[serde(default)]
    pub resolved_at: Option<Millis>,
}

impl SystemAlert {
    /// Create a new unresolved alert stamped with the current time.
    pub fn new(
        service: impl Into<String>,
        metric: impl Into<String>,
        current_value: f64,
        threshold: f64,
        severity: AlertSeverity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            service: service.into(),
            metric: metric.into(),
            current_value,
            threshold,
            severity,
            message: message.into(),
            occurred_at: now_millis(),
            resolved: false,
            resolved_by: None,
            resolved_at: None,
        }
    }

    /// Mark resolved. Already-resolved alerts keep their original resolver.
    pub fn resolve(&mut self, resolved_by: &str, at: Millis) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        self.resolved_by = Some(resolved_by.to_string());
        self.resolved_at = Some(at);
    }
}

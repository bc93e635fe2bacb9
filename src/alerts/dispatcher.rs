//! Alert persistence and delivery.

use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::alerts::types::{AlertSeverity, SystemAlert};
use crate::clock::now_millis;
use crate::error::{RouterError, RouterResult};
use crate::observability::metrics;
use crate::storage::Store;

/// External alert delivery (push, email, chat...).
pub trait AlertDispatcher: Send + Sync + std::fmt::Debug {
    fn dispatch(&self, alert: &SystemAlert);
}

/// Writes every alert to the log.
#[derive(Debug, Default)]
pub struct TracingDispatcher;

impl AlertDispatcher for TracingDispatcher {
    fn dispatch(&self, alert: &SystemAlert) {
        match alert.severity {
            AlertSeverity::Critical => tracing::error!(
                alert_id = %alert.id,
                service = %alert.service,
                metric = %alert.metric,
                value = alert.current_value,
                threshold = alert.threshold,
                "{}", alert.message
            ),
            AlertSeverity::Warning => tracing::warn!(
                alert_id = %alert.id,
                service = %alert.service,
                metric = %alert.metric,
                value = alert.current_value,
                threshold = alert.threshold,
                "{}", alert.message
            ),
        }
    }
}

/// Forwards alerts to a channel consumed by a delivery task.
#[derive(Debug, Clone)]
pub struct ChannelDispatcher {
    tx: mpsc::UnboundedSender<SystemAlert>,
}

impl ChannelDispatcher {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SystemAlert>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AlertDispatcher for ChannelDispatcher {
    fn dispatch(&self, alert: &SystemAlert) {
        if self.tx.send(alert.clone()).is_err() {
            tracing::debug!(alert_id = %alert.id, "Alert channel closed, dropping alert");
        }
    }
}

/// Persists alerts and fans them out to dispatchers.
#[derive(Debug, Clone)]
pub struct AlertCenter {
    store: Arc<dyn Store>,
    dispatchers: Vec<Arc<dyn AlertDispatcher>>,
}

impl AlertCenter {
    /// Create an alert center that logs every alert.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            dispatchers: vec![Arc::new(TracingDispatcher)],
        }
    }

    /// Add an external dispatcher.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    /// Persist and dispatch an alert.
    pub fn raise(&self, alert: SystemAlert) -> RouterResult<()> {
        self.store.put_alert(alert.clone())?;
        metrics::record_alert(alert.severity.as_str());
        for dispatcher in &self.dispatchers {
            dispatcher.dispatch(&alert);
        }
        Ok(())
    }

    /// Raise, logging instead of propagating a storage failure. Used from
    /// sweeps where an alert must not abort the surrounding work.
    pub fn raise_or_log(&self, alert: SystemAlert) {
        let alert_id = alert.id;
        if let Err(e) = self.raise(alert) {
            tracing::error!(alert_id = %alert_id, error = %e, "Failed to persist alert");
        }
    }

    /// Unresolved alerts, newest first.
    pub fn active(&self) -> RouterResult<Vec<SystemAlert>> {
        let mut alerts: Vec<SystemAlert> = self
            .store
            .list_alerts()?
            .into_iter()
            .filter(|a| !a.resolved)
            .collect();
        alerts.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(alerts)
    }

    /// Mark an alert resolved.
    pub fn resolve(&self, alert_id: Uuid, resolved_by: &str) -> RouterResult<SystemAlert> {
        let mut alert = self
            .store
            .get_alert(alert_id)?
            .ok_or_else(|| RouterError::AlertNotFound(alert_id.to_string()))?;
        alert.resolve(resolved_by, now_millis());
        self.store.put_alert(alert.clone())?;
        tracing::info!(alert_id = %alert_id, resolved_by = %resolved_by, "Alert resolved");
        Ok(alert)
    }
}

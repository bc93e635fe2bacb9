//! Typed metric and service identifiers plus the aggregate records built
//! from them.
//!
//! Metric names travel as strings of the form `service.metric` on the wire
//! and in snapshots, but are parsed into `MetricName` at the boundary so an
//! unknown name is rejected instead of silently creating a new series.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::clock::Millis;

/// Logical services whose health is aggregated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceName {
    Chat,
    Wallet,
    Events,
    Ai,
    VideoCalls,
    PanicSignal,
}

impl ServiceName {
    pub const ALL: [ServiceName; 6] = [
        ServiceName::Chat,
        ServiceName::Wallet,
        ServiceName::Events,
        ServiceName::Ai,
        ServiceName::VideoCalls,
        ServiceName::PanicSignal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::Chat => "chat",
            ServiceName::Wallet => "wallet",
            ServiceName::Events => "events",
            ServiceName::Ai => "ai",
            ServiceName::VideoCalls => "video-calls",
            ServiceName::PanicSignal => "panic-signal",
        }
    }

    /// Threshold-bearing metrics that feed this service's health verdict.
    pub fn indicators(&self) -> &'static [MetricName] {
        use MetricName::*;
        match self {
            ServiceName::Chat => &[ChatDeliveryLatency, ChatSyncLatency],
            ServiceName::Wallet => &[WalletTransactionTime, WalletBalanceQueryTime],
            ServiceName::Events => &[EventProcessingLatency, EventQueueDepth],
            ServiceName::Ai => &[AiResponseTime, AiQueueTime],
            ServiceName::VideoCalls => &[CallSetupTime, CallPacketLoss, CallJitter],
            ServiceName::PanicSignal => &[PanicDispatchLatency, PanicAckLatency],
        }
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceName::ALL
            .into_iter()
            .find(|svc| svc.as_str() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

/// A metric name that does not belong to the known set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

/// Every metric the router aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MetricName {
    ChatDeliveryLatency,
    ChatSyncLatency,
    WalletTransactionTime,
    WalletBalanceQueryTime,
    EventProcessingLatency,
    EventQueueDepth,
    AiResponseTime,
    AiQueueTime,
    CallSetupTime,
    CallPacketLoss,
    CallJitter,
    PanicDispatchLatency,
    PanicAckLatency,
    /// Completed request counter for a service (one sample per request).
    Requests(ServiceName),
    /// Failed request counter for a service (one sample per failure).
    Errors(ServiceName),
}

impl MetricName {
    /// The service this metric belongs to.
    pub fn service(&self) -> ServiceName {
        use MetricName::*;
        match self {
            ChatDeliveryLatency | ChatSyncLatency => ServiceName::Chat,
            WalletTransactionTime | WalletBalanceQueryTime => ServiceName::Wallet,
            EventProcessingLatency | EventQueueDepth => ServiceName::Events,
            AiResponseTime | AiQueueTime => ServiceName::Ai,
            CallSetupTime | CallPacketLoss | CallJitter => ServiceName::VideoCalls,
            PanicDispatchLatency | PanicAckLatency => ServiceName::PanicSignal,
            Requests(svc) | Errors(svc) => *svc,
        }
    }

    fn suffix(&self) -> &'static str {
        use MetricName::*;
        match self {
            ChatDeliveryLatency => "delivery_latency_ms",
            ChatSyncLatency => "sync_latency_ms",
            WalletTransactionTime => "transaction_time_ms",
            WalletBalanceQueryTime => "balance_query_ms",
            EventProcessingLatency => "processing_latency_ms",
            EventQueueDepth => "queue_depth",
            AiResponseTime => "response_time_ms",
            AiQueueTime => "queue_time_ms",
            CallSetupTime => "setup_time_ms",
            CallPacketLoss => "packet_loss",
            CallJitter => "jitter_ms",
            PanicDispatchLatency => "dispatch_latency_ms",
            PanicAckLatency => "ack_latency_ms",
            Requests(_) => "requests",
            Errors(_) => "errors",
        }
    }

    /// Built-in alerting threshold. Counters have none.
    pub fn default_threshold(&self) -> Option<f64> {
        use MetricName::*;
        match self {
            ChatDeliveryLatency => Some(500.0),
            ChatSyncLatency => Some(1_000.0),
            WalletTransactionTime => Some(3_000.0),
            WalletBalanceQueryTime => Some(500.0),
            EventProcessingLatency => Some(1_000.0),
            EventQueueDepth => Some(1_000.0),
            AiResponseTime => Some(5_000.0),
            AiQueueTime => Some(2_000.0),
            CallSetupTime => Some(2_000.0),
            CallPacketLoss => Some(0.05),
            CallJitter => Some(30.0),
            PanicDispatchLatency => Some(1_000.0),
            PanicAckLatency => Some(5_000.0),
            Requests(_) | Errors(_) => None,
        }
    }

    /// All known metric names.
    pub fn all() -> Vec<MetricName> {
        ServiceName::ALL
            .iter()
            .flat_map(|svc| {
                svc.indicators()
                    .iter()
                    .copied()
                    .chain([MetricName::Requests(*svc), MetricName::Errors(*svc)])
            })
            .collect()
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.service(), self.suffix())
    }
}

impl FromStr for MetricName {
    type Err = UnknownMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::all()
            .into_iter()
            .find(|m| m.to_string() == s)
            .ok_or_else(|| UnknownMetric(s.to_string()))
    }
}

impl From<MetricName> for String {
    fn from(metric: MetricName) -> Self {
        metric.to_string()
    }
}

impl TryFrom<String> for MetricName {
    type Error = UnknownMetric;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One observed measurement. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub metric: MetricName,
    pub value: f64,
    pub observed_at: Millis,
}

/// Running mean over every sample ever recorded for a metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollingAverage {
    pub metric: MetricName,
    pub average: f64,
    pub sample_count: u64,
    pub last_value: f64,
    pub last_updated_at: Millis,
}

impl RollingAverage {
    pub fn new(metric: MetricName) -> Self {
        Self {
            metric,
            average: 0.0,
            sample_count: 0,
            last_value: 0.0,
            last_updated_at: 0,
        }
    }

    /// Fold one sample into the mean in O(1).
    ///
    /// `avg + (v - avg) / (n + 1)` is algebraically
    /// `(avg * n + v) / (n + 1)`, and stays exact for repeated identical
    /// samples.
    pub fn absorb(&mut self, value: f64, at: Millis) {
        let count = self.sample_count as f64;
        self.average += (value - self.average) / (count + 1.0);
        self.sample_count += 1;
        self.last_value = value;
        self.last_updated_at = at;
    }
}

/// Aggregate verdict for a logical service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
    Critical,
}

impl ServiceStatus {
    /// `critical` above two issues, `degraded` for one or two.
    pub fn from_issue_count(issues: usize) -> Self {
        match issues {
            0 => ServiceStatus::Healthy,
            1 | 2 => ServiceStatus::Degraded,
            _ => ServiceStatus::Critical,
        }
    }

    /// Worst status wins.
    pub fn overall<I: IntoIterator<Item = ServiceStatus>>(statuses: I) -> Self {
        statuses.into_iter().max().unwrap_or(ServiceStatus::Healthy)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Critical => "critical",
        }
    }
}

/// Persisted health record for one service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceHealthStatus {
    pub service_name: ServiceName,
    pub status: ServiceStatus,
    pub relevant_metrics: BTreeMap<String, f64>,
    pub issues: Vec<String>,
    pub observed_at: Millis,
}

/// Overall system health view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemHealth {
    pub overall_status: ServiceStatus,
    pub services: Vec<ServiceHealthStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_name_string_form() {
        assert_eq!(MetricName::CallPacketLoss.to_string(), "video-calls.packet_loss");
        assert_eq!(MetricName::Errors(ServiceName::PanicSignal).to_string(), "panic-signal.errors");
        assert_eq!(
            "wallet.transaction_time_ms".parse::<MetricName>().unwrap(),
            MetricName::WalletTransactionTime
        );
        assert!("wallet.transaction_tme_ms".parse::<MetricName>().is_err());
    }

    #[test]
    fn test_every_metric_parses_back() {
        for metric in MetricName::all() {
            assert_eq!(metric.to_string().parse::<MetricName>().unwrap(), metric);
        }
    }

    #[test]
    fn test_indicators_belong_to_their_service() {
        for svc in ServiceName::ALL {
            for metric in svc.indicators() {
                assert_eq!(metric.service(), svc);
                assert!(metric.default_threshold().is_some());
            }
        }
    }

    #[test]
    fn test_rolling_mean_of_identical_samples_is_exact() {
        let mut avg = RollingAverage::new(MetricName::ChatDeliveryLatency);
        for i in 0..1000 {
            avg.absorb(123.25, i);
        }
        assert_eq!(avg.average, 123.25);
        assert_eq!(avg.sample_count, 1000);

        let mut avg = RollingAverage::new(MetricName::CallPacketLoss);
        for i in 0..37 {
            avg.absorb(0.1, i);
        }
        assert_eq!(avg.average, 0.1);
    }

    #[test]
    fn test_rolling_mean_matches_arithmetic_mean() {
        let mut avg = RollingAverage::new(MetricName::AiResponseTime);
        for (i, v) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            avg.absorb(v, i as u64);
        }
        assert!((avg.average - 25.0).abs() < 1e-12);
        assert_eq!(avg.last_value, 40.0);
        assert_eq!(avg.last_updated_at, 3);
    }

    #[test]
    fn test_status_from_issue_count() {
        assert_eq!(ServiceStatus::from_issue_count(0), ServiceStatus::Healthy);
        assert_eq!(ServiceStatus::from_issue_count(1), ServiceStatus::Degraded);
        assert_eq!(ServiceStatus::from_issue_count(2), ServiceStatus::Degraded);
        assert_eq!(ServiceStatus::from_issue_count(3), ServiceStatus::Critical);
    }

    #[test]
    fn test_overall_status() {
        use ServiceStatus::*;
        assert_eq!(ServiceStatus::overall([Healthy, Healthy]), Healthy);
        assert_eq!(ServiceStatus::overall([Healthy, Degraded]), Degraded);
        assert_eq!(ServiceStatus::overall([Degraded, Critical, Healthy]), Critical);
        assert_eq!(ServiceStatus::overall([]), Healthy);
    }

    #[test]
    fn test_metric_serde_as_string() {
        let sample = MetricSample {
            metric: MetricName::Requests(ServiceName::Chat),
            value: 1.0,
            observed_at: 5,
        };
        let json = serde_json::to_string(&sample).unwrap();
        assert!(json.contains("\"chat.requests\""));
        let back: MetricSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }
}

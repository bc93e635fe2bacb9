//! Service telemetry.
//!
//! # Data Flow
//! ```text
//! RecordMetric(name, value)
//!     → aggregator.rs: append sample + fold into running mean (atomic)
//!     → immediate threshold check → alert
//!
//! Periodic sweep (service_health.rs):
//!     running means + windowed error rate per service
//!     → issues → status → persist + alerts
//!     → overall status = worst service
//! ```

pub mod aggregator;
pub mod metric;
pub mod service_health;

pub use aggregator::{threshold_for, MetricsAggregator};
pub use metric::{
    MetricName, MetricSample, RollingAverage, ServiceHealthStatus, ServiceName, ServiceStatus,
    SystemHealth, UnknownMetric,
};
pub use service_health::ServiceHealthAggregator;

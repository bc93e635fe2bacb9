//! Geo-aware region router.
//!
//! Pins users to the closest healthy region, probes regions on a schedule,
//! fails users over on demand and aggregates service telemetry into health
//! verdicts and alerts.

pub mod alerts;
pub mod clock;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod region;
pub mod resilience;
pub mod router;
pub mod routing;
pub mod storage;
pub mod telemetry;

pub use crate::config::RouterConfig;
pub use crate::router::RouterCore;
pub use crate::error::{RouterError, RouterResult};
pub use crate::http::HttpServer;
pub use crate::lifecycle::Shutdown;

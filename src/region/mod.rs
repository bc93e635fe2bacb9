//! Region state subsystem.
//!
//! # Data Flow
//! ```text
//! Static region config (coordinates, endpoints)
//!     → registry.rs initialize()
//!     → RegionNode per region (types.rs)
//!
//! Health sweep
//!     → registry.rs apply_batch() (status, latency, load)
//!
//! Routing / failover
//!     → registry.rs get()/list_all()
//!     → geo.rs latency estimate per candidate
//! ```

pub mod geo;
pub mod registry;
pub mod types;

pub use geo::{GeoPoint, LatencyModel};
pub use registry::RegionRegistry;
pub use types::{HealthCheckResult, RegionNode, RegionStatus, RegionUpdate};

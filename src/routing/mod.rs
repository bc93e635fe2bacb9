//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! GetRouting(user, location?):
//!     assignor.rs
//!     → pinned region still healthy and fast? keep it
//!     → else nearest healthy region (geo estimate or measured latency)
//!     → else default region (logged, not persisted)
//!
//! ForceFailover(user, from, reason):
//!     failover.rs
//!     → fresh probe of every region
//!     → fastest healthy region other than `from`, or NoHealthyRegion
//!     → repin + audit event
//! ```
//!
//! # Design Decisions
//! - Routing is lenient, failover is strict
//! - Mapping writes are unconditional overwrites (last writer wins)
//! - Deterministic: equal candidates resolve by region id

pub mod assignor;
pub mod failover;
pub mod types;

pub use assignor::{RegionAssignor, RoutingDecision, RoutingPath};
pub use failover::FailoverController;
pub use types::{FailoverEvent, FailoverReason, PinnedServices, UserRegionMapping};

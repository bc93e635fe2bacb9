//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Region probe:
//!     → circuit_breaker.rs (skip probe while open)
//!     → tokio timeout (every probe has a deadline)
//!     → outcome recorded back into the breaker
//!     → backoff.rs (cooldown grows with each consecutive trip)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every probe has a deadline
//! - Breaker is per region, never global
//! - Single probe in Half-Open (prevents hammering a recovering region)

pub mod backoff;
pub mod circuit_breaker;

pub use circuit_breaker::{BreakerState, CircuitBreaker};

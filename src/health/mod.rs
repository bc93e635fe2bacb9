//! Region health checking.
//!
//! # Data Flow
//! ```text
//! Periodic sweep (checker.rs):
//!     Scheduler tick
//!     → Probe every region concurrently (probe.rs), each under a deadline
//!     → Verdict against thresholds
//!     → Transition smoothing (policy.rs)
//!     → Batched registry update + history + alerts
//! ```
//!
//! # Design Decisions
//! - Probes are pluggable behind the `Probe` trait
//! - A per-region circuit breaker skips regions that keep failing
//! - Verdicts apply immediately unless a consecutive policy is configured

pub mod checker;
pub mod policy;
pub mod probe;

pub use checker::{breaches, is_healthy, Breach, HealthChecker, SweepReport};
pub use policy::TransitionTracker;
pub use probe::{HttpProbe, Probe, ProbeError, ProbeReading, ScriptedProbe, HEALTH_ENDPOINT};

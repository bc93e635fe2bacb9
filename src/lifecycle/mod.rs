//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Scheduler (scheduler.rs):
//!     health sweep (10s), service sweep (60s), cleanup (daily), store flush
//!     → each job on its own ticker, stops on shutdown
//!
//! Shutdown (shutdown.rs):
//!     SIGTERM/SIGINT → broadcast → jobs exit, server drains → final flush
//! ```
//!
//! # Design Decisions
//! - Jobs are independent and loosely consistent; none blocks another
//! - Shutdown is cooperative: nothing is cancelled mid-run

pub mod scheduler;
pub mod shutdown;

pub use scheduler::spawn_periodic;
pub use shutdown::Shutdown;

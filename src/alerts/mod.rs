//! Alerting subsystem.
//!
//! # Data Flow
//! ```text
//! Health sweep / metric sample / service-health sweep
//!     → AlertCenter::raise (dispatcher.rs)
//!         → Store (persisted, queryable, resolvable)
//!         → AlertDispatcher(s) (external delivery)
//! ```
//!
//! # Design Decisions
//! - No deduplication across runs; repeated breaches raise repeated alerts
//!   and suppression is left to the external dispatcher

pub mod dispatcher;
pub mod types;

pub use dispatcher::{AlertCenter, AlertDispatcher, ChannelDispatcher, TracingDispatcher};
pub use types::{AlertSeverity, SystemAlert};

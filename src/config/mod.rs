//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → RouterConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → RouterCore::apply_config swaps the tunable thresholds
//! ```
//!
//! # Design Decisions
//! - Regions are static input; changing them requires a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AggregationConfig, BreakerConfig, FailoverConfig, HealthCheckConfig,
    HealthThresholds, ListenerConfig, LogFormat, ObservabilityConfig, RegionConfig,
    RetentionConfig, RouterConfig, RoutingConfig, StorageConfig, TransitionPolicy,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;

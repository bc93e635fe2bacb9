//! Crate-level error taxonomy.
//!
//! # Design Decisions
//! - Probe failures never surface here; the health sweep converts them into
//!   an offline verdict for the affected region only
//! - `NoHealthyRegion` is the single hard failure of the routing core and is
//!   raised by failover only; ordinary routing falls back to a default region

use thiserror::Error;

use crate::storage::StoreError;

/// Errors returned by the routing core operations.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The operation referenced a region that is not registered.
    #[error("unknown region '{0}'")]
    UnknownRegion(String),

    /// A backing dependency could not be read or written.
    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Failover found no healthy region other than the one being left.
    #[error("no healthy region available besides '{excluded}'")]
    NoHealthyRegion { excluded: String },

    /// The referenced alert does not exist.
    #[error("alert '{0}' not found")]
    AlertNotFound(String),

    /// Persistent storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

/// Result type for routing core operations.
pub type RouterResult<T> = Result<T, RouterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RouterError::UnknownRegion("mars".into());
        assert_eq!(err.to_string(), "unknown region 'mars'");

        let err = RouterError::NoHealthyRegion { excluded: "eu".into() };
        assert!(err.to_string().contains("'eu'"));
    }
}

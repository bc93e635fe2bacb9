//! User pinning and failover records.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Millis;

/// Region pinning for a user's long-lived sessions.
///
/// The three services always move together; there is no partial failover
/// across services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedServices {
    chat: String,
    calls: String,
    wallet: String,
}

impl PinnedServices {
    /// Pin every service to `region`.
    pub fn all(region: &str) -> Self {
        Self {
            chat: region.to_string(),
            calls: region.to_string(),
            wallet: region.to_string(),
        }
    }

    pub fn chat(&self) -> &str {
        &self.chat
    }

    pub fn calls(&self) -> &str {
        &self.calls
    }

    pub fn wallet(&self) -> &str {
        &self.wallet
    }

    /// True when all three services point at the same region.
    pub fn is_uniform(&self) -> bool {
        self.chat == self.calls && self.calls == self.wallet
    }
}

/// Sticky region assignment for one user. Overwritten, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRegionMapping {
    pub user_id: String,
    pub assigned_region: String,
    pub pinned_services: PinnedServices,
    pub last_routed_at: Millis,
}

impl UserRegionMapping {
    /// A mapping with every pinned service set to `region`.
    pub fn pinned_to(user_id: &str, region: &str, at: Millis) -> Self {
        Self {
            user_id: user_id.to_string(),
            assigned_region: region.to_string(),
            pinned_services: PinnedServices::all(region),
            last_routed_at: at,
        }
    }
}

/// Why a user was moved off a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverReason {
    Health,
    Latency,
    Capacity,
    #[default]
    Manual,
}

impl FailoverReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverReason::Health => "health",
            FailoverReason::Latency => "latency",
            FailoverReason::Capacity => "capacity",
            FailoverReason::Manual => "manual",
        }
    }
}

/// Immutable audit record of a completed failover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub id: Uuid,
    pub user_id: String,
    pub from_region: String,
    pub to_region: String,
    pub reason: FailoverReason,
    pub occurred_at: Millis,
    pub completed_in_ms: u64,
}

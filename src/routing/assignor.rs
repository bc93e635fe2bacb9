//! Region assignment for new and returning sessions.
//!
//! # Responsibilities
//! - Keep a user on their pinned region while it stays healthy and fast
//! - Otherwise pick the healthy region closest to the client
//! - Persist the choice as the user's new pinning
//!
//! # Design Decisions
//! - Never fails for "no healthy region": falls back to the default region
//!   and only logs, since a new session can tolerate a poor region
//! - Fallback answers are not persisted, so the user is re-evaluated on the
//!   next call once a region recovers
//! - Equal estimates are broken by region id

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::clock::now_millis;
use crate::config::RoutingConfig;
use crate::error::RouterResult;
use crate::observability::metrics;
use crate::region::{GeoPoint, RegionNode, RegionRegistry};
use crate::routing::types::UserRegionMapping;
use crate::storage::Store;

/// How a routing decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingPath {
    /// The existing pinning was kept.
    Sticky,
    /// The lowest-latency healthy region was chosen.
    Nearest,
    /// No region was healthy; the default region was returned.
    Fallback,
}

impl RoutingPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingPath::Sticky => "sticky",
            RoutingPath::Nearest => "nearest",
            RoutingPath::Fallback => "fallback",
        }
    }
}

/// Result of [`RegionAssignor::resolve_region`].
#[derive(Debug, Clone)]
pub struct RoutingDecision {
    pub region: RegionNode,
    pub path: RoutingPath,
}

/// Assigns users to regions.
#[derive(Debug, Clone)]
pub struct RegionAssignor {
    registry: RegionRegistry,
    store: Arc<dyn Store>,
    config: Arc<ArcSwap<RoutingConfig>>,
}

impl RegionAssignor {
    /// Create a new assignor.
    pub fn new(
        registry: RegionRegistry,
        store: Arc<dyn Store>,
        config: Arc<ArcSwap<RoutingConfig>>,
    ) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// Pick the region serving `user_id`.
    ///
    /// With a client location, healthy regions are ranked by the geographic
    /// estimate; without one, by their last measured latency.
    ///
    /// A fallback answer is never written as the user's pinning, so the next
    /// call re-evaluates once a region recovers.
    pub fn resolve_region(
        &self,
        user_id: &str,
        location: Option<GeoPoint>,
    ) -> RouterResult<RoutingDecision> {
        let config = self.config.load();
        let regions = self.registry.list_all()?;

        // 1. Sticky: keep the pinned region while healthy and within bounds
        if let Some(mapping) = self.store.get_mapping(user_id)? {
            let pinned = regions
                .iter()
                .find(|node| node.region_id == mapping.assigned_region);
            if let Some(node) = pinned {
                if node.status.is_healthy() && node.latency_ms < config.max_latency_ms {
                    metrics::record_routing_decision(RoutingPath::Sticky.as_str());
                    return Ok(RoutingDecision {
                        region: node.clone(),
                        path: RoutingPath::Sticky,
                    });
                }
                tracing::debug!(
                    user_id = %user_id,
                    region = %node.region_id,
                    status = node.status.as_str(),
                    latency_ms = node.latency_ms,
                    "Pinned region no longer eligible"
                );
            }
        }

        let location = location.filter(|point| {
            let valid = point.is_valid();
            if !valid {
                tracing::debug!(user_id = %user_id, "Ignoring out-of-range client location");
            }
            valid
        });

        // 2. Rank healthy regions by estimated latency
        let nearest = regions
            .iter()
            .filter(|node| node.status.is_healthy())
            .map(|node| {
                let estimate = match &location {
                    Some(client) => config.latency_model.estimate_ms(client, &node.location),
                    None => node.latency_ms,
                };
                (estimate, node)
            })
            .min_by(|(a, node_a), (b, node_b)| {
                a.total_cmp(b)
                    .then_with(|| node_a.region_id.cmp(&node_b.region_id))
            });

        match nearest {
            Some((estimate, node)) => {
                // 3. Overwrite the pinning
                self.store.put_mapping(UserRegionMapping::pinned_to(
                    user_id,
                    &node.region_id,
                    now_millis(),
                ))?;
                tracing::debug!(
                    user_id = %user_id,
                    region = %node.region_id,
                    estimated_ms = estimate,
                    "User assigned to region"
                );
                metrics::record_routing_decision(RoutingPath::Nearest.as_str());
                Ok(RoutingDecision {
                    region: node.clone(),
                    path: RoutingPath::Nearest,
                })
            }
            None => {
                // 4. Nothing healthy: default region, logged but not an error
                tracing::warn!(
                    user_id = %user_id,
                    default_region = %config.default_region,
                    "No healthy region, routing to default region"
                );
                metrics::record_routing_decision(RoutingPath::Fallback.as_str());
                let region = self.registry.get(&config.default_region)?;
                Ok(RoutingDecision {
                    region,
                    path: RoutingPath::Fallback,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::region::{RegionStatus, RegionUpdate};
    use crate::storage::MemoryStore;

    fn assignor() -> (RegionAssignor, RegionRegistry, Arc<dyn Store>) {
        let config = RouterConfig::default();
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let registry = RegionRegistry::new(store.clone());
        registry.initialize(&config.regions).unwrap();
        let assignor = RegionAssignor::new(
            registry.clone(),
            store.clone(),
            Arc::new(ArcSwap::from_pointee(config.routing)),
        );
        (assignor, registry, store)
    }

    fn set(registry: &RegionRegistry, id: &str, status: RegionStatus, latency_ms: f64) {
        registry
            .upsert(
                id,
                RegionUpdate {
                    status: Some(status),
                    latency_ms: Some(latency_ms),
                    ..Default::default()
                },
            )
            .unwrap();
    }

    #[test]
    fn test_nearest_region_is_pinned() {
        let (assignor, _, store) = assignor();
        let tokyo = GeoPoint::new(35.68, 139.69);

        let decision = assignor.resolve_region("u1", Some(tokyo)).unwrap();
        assert_eq!(decision.region.region_id, "asia");
        assert_eq!(decision.path, RoutingPath::Nearest);

        let mapping = store.get_mapping("u1").unwrap().unwrap();
        assert_eq!(mapping.assigned_region, "asia");
        assert_eq!(mapping.pinned_services.chat(), "asia");
    }

    #[test]
    fn test_sticky_survives_location_change() {
        let (assignor, registry, _) = assignor();
        set(&registry, "eu", RegionStatus::Healthy, 60.0);

        assignor
            .resolve_region("u1", Some(GeoPoint::new(52.52, 13.40)))
            .unwrap();
        let decision = assignor
            .resolve_region("u1", Some(GeoPoint::new(40.71, -74.0)))
            .unwrap();
        assert_eq!(decision.region.region_id, "eu");
        assert_eq!(decision.path, RoutingPath::Sticky);
    }

    #[test]
    fn test_slow_pinned_region_is_reassigned() {
        let (assignor, registry, _) = assignor();
        let berlin = GeoPoint::new(52.52, 13.40);
        assignor.resolve_region("u1", Some(berlin)).unwrap();

        // Still healthy but over the latency bound: re-ranked, and EU is
        // still the geographic winner.
        set(&registry, "eu", RegionStatus::Healthy, 450.0);
        let decision = assignor.resolve_region("u1", Some(berlin)).unwrap();
        assert_eq!(decision.path, RoutingPath::Nearest);

        set(&registry, "eu", RegionStatus::Offline, 999_999.0);
        let decision = assignor.resolve_region("u1", Some(berlin)).unwrap();
        assert_eq!(decision.region.region_id, "us");
    }

    #[test]
    fn test_fallback_is_not_persisted() {
        let (assignor, registry, store) = assignor();
        for id in ["eu", "us", "asia"] {
            set(&registry, id, RegionStatus::Degraded, 500.0);
        }

        let decision = assignor.resolve_region("u1", None).unwrap();
        assert_eq!(decision.region.region_id, "us");
        assert_eq!(decision.path, RoutingPath::Fallback);
        assert!(store.get_mapping("u1").unwrap().is_none());
    }

    #[test]
    fn test_equal_latency_breaks_ties_by_id() {
        let (assignor, registry, _) = assignor();
        for id in ["eu", "us", "asia"] {
            set(&registry, id, RegionStatus::Healthy, 80.0);
        }
        let decision = assignor.resolve_region("u1", None).unwrap();
        assert_eq!(decision.region.region_id, "asia");
    }

    #[test]
    fn test_invalid_location_uses_measured_latency() {
        let (assignor, registry, _) = assignor();
        set(&registry, "eu", RegionStatus::Healthy, 30.0);
        set(&registry, "us", RegionStatus::Healthy, 90.0);
        set(&registry, "asia", RegionStatus::Healthy, 120.0);

        let decision = assignor
            .resolve_region("u1", Some(GeoPoint::new(123.0, 500.0)))
            .unwrap();
        assert_eq!(decision.region.region_id, "eu");
    }
}

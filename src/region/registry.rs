//! Canonical region state.
//!
//! # Responsibilities
//! - Register the statically configured regions
//! - Serve region lookups to routing and failover
//! - Accept batched status updates from the health sweep
//!
//! # Design Decisions
//! - No business logic beyond storage; status is derived by the health
//!   checker and only written through `apply_batch`
//! - Lookups of unregistered ids fail with `UnknownRegion`

use std::sync::Arc;

use crate::config::RegionConfig;
use crate::error::{RouterError, RouterResult};
use crate::region::types::{RegionNode, RegionUpdate};
use crate::storage::Store;

/// Region registry backed by a [`Store`].
#[derive(Debug, Clone)]
pub struct RegionRegistry {
    store: Arc<dyn Store>,
}

impl RegionRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Register configured regions.
    ///
    /// Regions already present (from a persisted snapshot) keep their last
    /// observed health and only pick up the configured coordinates and
    /// endpoints. Persisted regions missing from `regions` are unregistered.
    pub fn initialize(&self, regions: &[RegionConfig]) -> RouterResult<()> {
        for node in self.store.list_regions()? {
            if !regions.iter().any(|config| config.id == node.region_id) {
                self.store.remove_region(&node.region_id)?;
                tracing::info!(
                    region = %node.region_id,
                    "Region no longer configured, unregistered"
                );
            }
        }

        for config in regions {
            match self.store.get_region(&config.id)? {
                Some(_) => {
                    let update = RegionUpdate {
                        location: Some(config.location()),
                        endpoints: Some(config.endpoints.clone()),
                        ..Default::default()
                    };
                    self.store.update_regions(&[(config.id.clone(), update)])?;
                }
                None => {
                    self.store.put_region(RegionNode::new(
                        config.id.clone(),
                        config.location(),
                        config.endpoints.clone(),
                    ))?;
                }
            }
            tracing::debug!(region = %config.id, "Region registered");
        }
        tracing::info!(count = regions.len(), "Regions initialized");
        Ok(())
    }

    /// Look up a region.
    pub fn get(&self, region_id: &str) -> RouterResult<RegionNode> {
        self.store
            .get_region(region_id)?
            .ok_or_else(|| RouterError::UnknownRegion(region_id.to_string()))
    }

    /// Apply a partial update to one region, creating it if absent.
    pub fn upsert(&self, region_id: &str, update: RegionUpdate) -> RouterResult<()> {
        let mut node = match self.store.get_region(region_id)? {
            Some(node) => node,
            None => RegionNode::new(region_id, Default::default(), Default::default()),
        };
        update.apply_to(&mut node);
        self.store.put_region(node)?;
        Ok(())
    }

    /// Apply a batch of updates to registered regions.
    ///
    /// Updates for ids that are not registered are skipped and logged.
    pub fn apply_batch(&self, updates: &[(String, RegionUpdate)]) -> RouterResult<()> {
        let missing = self.store.update_regions(updates)?;
        for region_id in missing {
            tracing::warn!(region = %region_id, "Dropped update for unregistered region");
        }
        Ok(())
    }

    /// All registered regions, ordered by id.
    pub fn list_all(&self) -> RouterResult<Vec<RegionNode>> {
        Ok(self.store.list_regions()?)
    }

    /// True if `region_id` is registered.
    pub fn contains(&self, region_id: &str) -> RouterResult<bool> {
        Ok(self.store.get_region(region_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouterConfig;
    use crate::region::RegionStatus;
    use crate::storage::MemoryStore;

    fn registry() -> RegionRegistry {
        let registry = RegionRegistry::new(Arc::new(MemoryStore::new()));
        registry.initialize(&RouterConfig::default().regions).unwrap();
        registry
    }

    #[test]
    fn test_get_unknown_region() {
        let err = registry().get("mars").unwrap_err();
        assert!(matches!(err, RouterError::UnknownRegion(id) if id == "mars"));
    }

    #[test]
    fn test_list_all_sorted() {
        let ids: Vec<String> = registry()
            .list_all()
            .unwrap()
            .into_iter()
            .map(|n| n.region_id)
            .collect();
        assert_eq!(ids, vec!["asia", "eu", "us"]);
    }

    #[test]
    fn test_reinitialize_keeps_status() {
        let registry = registry();
        registry
            .apply_batch(&[(
                "eu".into(),
                RegionUpdate {
                    status: Some(RegionStatus::Offline),
                    ..Default::default()
                },
            )])
            .unwrap();

        registry.initialize(&RouterConfig::default().regions).unwrap();
        assert_eq!(registry.get("eu").unwrap().status, RegionStatus::Offline);
    }

    #[test]
    fn test_reinitialize_drops_unconfigured_regions() {
        let registry = registry();
        let regions: Vec<_> = RouterConfig::default()
            .regions
            .into_iter()
            .filter(|r| r.id != "asia")
            .collect();

        registry.initialize(&regions).unwrap();

        let ids: Vec<String> = registry
            .list_all()
            .unwrap()
            .into_iter()
            .map(|n| n.region_id)
            .collect();
        assert_eq!(ids, vec!["eu", "us"]);
        assert!(!registry.contains("asia").unwrap());
    }

    #[test]
    fn test_upsert_partial() {
        let registry = registry();
        registry
            .upsert(
                "us",
                RegionUpdate {
                    latency_ms: Some(120.0),
                    ..Default::default()
                },
            )
            .unwrap();
        let node = registry.get("us").unwrap();
        assert_eq!(node.latency_ms, 120.0);
        assert_eq!(node.status, RegionStatus::Healthy);
    }
}

//! Forced failover of a user away from a region.
//!
//! # Responsibilities
//! - Re-probe every region before choosing a target
//! - Move all pinned services of the user in one write
//! - Append an audit event with the elapsed time
//!
//! # Design Decisions
//! - Unlike routing, failing to find a target is a hard error: a live
//!   session must not be moved onto an unhealthy region
//! - Candidates are ranked by freshly measured latency, ties by region id
//! - Exceeding the SLA is logged, never fatal

use arc_swap::ArcSwap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::clock::now_millis;
use crate::config::FailoverConfig;
use crate::error::{RouterError, RouterResult};
use crate::health::HealthChecker;
use crate::observability::metrics;
use crate::region::RegionRegistry;
use crate::routing::types::{FailoverEvent, FailoverReason, UserRegionMapping};
use crate::storage::Store;

/// Moves users off a region on demand.
#[derive(Debug, Clone)]
pub struct FailoverController {
    registry: RegionRegistry,
    store: Arc<dyn Store>,
    checker: Arc<HealthChecker>,
    config: Arc<ArcSwap<FailoverConfig>>,
}

impl FailoverController {
    /// Create a new failover controller.
    pub fn new(
        registry: RegionRegistry,
        store: Arc<dyn Store>,
        checker: Arc<HealthChecker>,
        config: Arc<ArcSwap<FailoverConfig>>,
    ) -> Self {
        Self {
            registry,
            store,
            checker,
            config,
        }
    }

    /// Move `user_id` off `from_region`.
    pub async fn failover(
        &self,
        user_id: &str,
        from_region: &str,
        reason: FailoverReason,
    ) -> RouterResult<FailoverEvent> {
        let started = Instant::now();

        // 1. The region being left must exist
        self.registry.get(from_region)?;

        // 2. Fresh health of every region
        let results = self.checker.check_all().await?;
        let target = results
            .iter()
            .filter(|r| r.healthy && r.region_id != from_region)
            .min_by(|a, b| {
                a.latency_ms
                    .total_cmp(&b.latency_ms)
                    .then_with(|| a.region_id.cmp(&b.region_id))
            })
            .ok_or_else(|| RouterError::NoHealthyRegion {
                excluded: from_region.to_string(),
            })?;

        // 3. Repin every service at once
        let occurred_at = now_millis();
        self.store.put_mapping(UserRegionMapping::pinned_to(
            user_id,
            &target.region_id,
            occurred_at,
        ))?;

        // 4. Audit
        let completed_in_ms = started.elapsed().as_millis() as u64;
        let event = FailoverEvent {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            from_region: from_region.to_string(),
            to_region: target.region_id.clone(),
            reason,
            occurred_at,
            completed_in_ms,
        };
        self.store.append_failover(event.clone())?;

        metrics::record_failover(reason.as_str(), completed_in_ms);
        tracing::info!(
            user_id = %user_id,
            from = %from_region,
            to = %event.to_region,
            reason = reason.as_str(),
            completed_in_ms,
            "Failover complete"
        );

        let sla_ms = self.config.load().sla_ms;
        if completed_in_ms > sla_ms {
            tracing::warn!(
                user_id = %user_id,
                completed_in_ms,
                sla_ms,
                "Failover exceeded SLA"
            );
        }

        Ok(event)
    }
}

//! Status transition smoothing.
//!
//! A probe yields a raw verdict. The tracker decides whether that verdict
//! becomes the region's persisted status, so a single slow probe does not
//! flip a region when hysteresis is configured.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;

use crate::config::TransitionPolicy;
use crate::region::RegionStatus;

#[derive(Debug, Default, Clone, Copy)]
struct Streak {
    successes: u32,
    failures: u32,
}

/// Tracks consecutive verdicts per region.
#[derive(Debug)]
pub struct TransitionTracker {
    policy: ArcSwap<TransitionPolicy>,
    streaks: DashMap<String, Streak>,
}

impl TransitionTracker {
    pub fn new(policy: TransitionPolicy) -> Self {
        Self {
            policy: ArcSwap::from_pointee(policy),
            streaks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        **self.policy.load()
    }

    /// Switch policy. Streaks counted under the old policy are dropped.
    pub fn set_policy(&self, policy: TransitionPolicy) {
        if self.policy() == policy {
            return;
        }
        self.policy.store(Arc::new(policy));
        self.streaks.clear();
    }

    /// Status to persist given the current status and a fresh verdict.
    pub fn next_status(
        &self,
        region_id: &str,
        current: RegionStatus,
        verdict: RegionStatus,
    ) -> RegionStatus {
        let (unhealthy_threshold, healthy_threshold) = match self.policy() {
            TransitionPolicy::Immediate => return verdict,
            TransitionPolicy::Consecutive {
                unhealthy_threshold,
                healthy_threshold,
            } => (unhealthy_threshold.max(1), healthy_threshold.max(1)),
        };

        let mut streak = self.streaks.entry(region_id.to_string()).or_default();

        if verdict.is_healthy() {
            streak.failures = 0;
            streak.successes += 1;
            if current.is_healthy() || streak.successes >= healthy_threshold {
                return RegionStatus::Healthy;
            }
            current
        } else {
            streak.successes = 0;
            streak.failures += 1;
            // Already unhealthy regions move freely between degraded and offline.
            if !current.is_healthy() || streak.failures >= unhealthy_threshold {
                return verdict;
            }
            current
        }
    }
}

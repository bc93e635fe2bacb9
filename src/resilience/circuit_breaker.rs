//! Circuit breaker for region probes.
//!
//! # States
//! - Closed: probes run normally
//! - Open: region assumed down, probes are skipped
//! - Half-Open: a single probe is let through to test recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= failure_threshold
//! Open → Half-Open: after the cooldown elapses
//! Half-Open → Closed: probe succeeds
//! Half-Open → Open: probe fails (cooldown grows with each trip)
//! Half-Open → Open (expired): probe abandoned before it finished
//! ```

use std::time::{Duration, Instant};

use crate::config::BreakerConfig;
use crate::resilience::backoff::backoff_delay;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open { until: Instant },
    HalfOpen,
}

/// Per-region probe breaker.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    /// Number of times the breaker opened since it last closed.
    trips: u32,
    failure_threshold: u32,
    cooldown_base: Duration,
    cooldown_max: Duration,
}

impl CircuitBreaker {
    pub fn new(config: &BreakerConfig) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            trips: 0,
            failure_threshold: config.failure_threshold.max(1),
            cooldown_base: Duration::from_millis(config.cooldown_base_ms),
            cooldown_max: Duration::from_millis(config.cooldown_max_ms),
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Ask permission to probe. Moves an expired Open breaker to Half-Open.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open { until } if now >= until => {
                self.state = BreakerState::HalfOpen;
                true
            }
            BreakerState::Open { .. } => false,
            // The half-open probe is already in flight.
            BreakerState::HalfOpen => false,
        }
    }

    pub fn record_success(&mut self) {
        if self.state != BreakerState::Closed {
            tracing::info!(trips = self.trips, "Probe breaker closed");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.trips = 0;
    }

    /// Release a permit whose probe never reported back. A half-open breaker
    /// goes back to an already expired Open state, so the next caller gets
    /// the trial probe; a closed breaker is left as it is.
    pub fn abandon(&mut self, now: Instant) {
        if self.state == BreakerState::HalfOpen {
            tracing::debug!(trips = self.trips, "Half-open probe abandoned");
            self.state = BreakerState::Open { until: now };
        }
    }

    pub fn record_failure(&mut self, now: Instant) {
        self.consecutive_failures += 1;
        let should_trip = match self.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => self.consecutive_failures >= self.failure_threshold,
            BreakerState::Open { .. } => false,
        };
        if should_trip {
            self.trips += 1;
            let cooldown = backoff_delay(self.trips, self.cooldown_base, self.cooldown_max);
            self.state = BreakerState::Open { until: now + cooldown };
            tracing::warn!(
                failures = self.consecutive_failures,
                cooldown_ms = cooldown.as_millis() as u64,
                "Probe breaker opened"
            );
        }
    }
}

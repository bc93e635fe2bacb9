//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Delay before the `attempt`-th retry (1-based), doubling from `base` and
/// capped at `max`, plus up to 10% jitter so regions that failed together
/// are not retried in lockstep.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u32.saturating_pow(attempt - 1);
    let capped = base.saturating_mul(factor).min(max);

    let jitter_range_ms = (capped.as_millis() / 10) as u64;
    let jitter_ms = if jitter_range_ms > 0 {
        rand::thread_rng().gen_range(0..jitter_range_ms)
    } else {
        0
    };

    capped + Duration::from_millis(jitter_ms)
}

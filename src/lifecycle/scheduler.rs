//! Periodic job runner.
//!
//! # Responsibilities
//! - Run a job on a fixed interval until shutdown
//! - Log job failures and retry at the next tick
//!
//! # Design Decisions
//! - Missed ticks are skipped, so a slow run never triggers a burst
//! - Shutdown is observed between runs only; a started run completes
//! - Jobs share no lock with each other

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Spawn `job` every `period` until `shutdown` fires.
///
/// The first run starts immediately.
pub fn spawn_periodic<F, Fut, E>(
    name: &'static str,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: Display + Send + 'static,
{
    tokio::spawn(async move {
        tracing::info!(job = name, period_ms = period.as_millis() as u64, "Scheduled job starting");
        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let started = Instant::now();
                    match job().await {
                        Ok(()) => tracing::debug!(
                            job = name,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Scheduled job completed"
                        ),
                        Err(e) => tracing::error!(job = name, error = %e, "Scheduled job failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!(job = name, "Scheduled job received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    })
}

//! Process-wide background timers.
//!
//! Started once by the composition root and never tied to individual
//! connections: the rate-counter reset and the stale-subscription sweep
//! run for the process lifetime.

use crate::limiter::RateLimiter;
use crate::now_ms;
use folio_storage::EntityStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How often the stale-subscription sweep runs.
pub const SUBSCRIPTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Subscription records inactive longer than this are evicted.
pub const SUBSCRIPTION_RETENTION: Duration = Duration::from_secs(60 * 60 * 24 * 7);

/// Spawns the rate-counter reset timer. Every tick, all non-zero counters
/// drop to zero; blocked sources stay blocked.
pub fn spawn_counter_reset(limiter: Arc<RateLimiter>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticks = tokio::time::interval_at(start, every);
        loop {
            ticks.tick().await;
            limiter.reset_counters();
        }
    })
}

/// Spawns the stale-subscription sweep. Every tick, records last active
/// longer than `retention` ago are deleted.
pub fn spawn_subscription_sweep(
    store: Arc<EntityStore>,
    every: Duration,
    retention: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticks = tokio::time::interval_at(start, every);
        loop {
            ticks.tick().await;
            let cutoff = now_ms() - retention.as_millis() as i64;
            match store.sweep_subscriptions(cutoff) {
                Ok(0) => {}
                Ok(removed) => info!(removed, "swept stale subscriptions"),
                Err(err) => warn!(%err, "subscription sweep failed"),
            }
        }
    })
}

//! Expiry Sweep Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::TtlCache;

/// Spawns a background task that sweeps expired entries out of `cache`
/// every `interval`, until `shutdown` is cancelled.
///
/// The first sweep runs one full interval after the task starts.
pub fn spawn_sweep_task(
    cache: Arc<TtlCache>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "Starting cache sweep task");

        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Cache sweep task stopped");
                    break;
                }
                _ = ticker.tick() => {
                    let removed = cache.cleanup_expired().await;
                    if removed > 0 {
                        info!(removed, "Cache sweep removed expired entries");
                    } else {
                        debug!("Cache sweep found no expired entries");
                    }
                }
            }
        }
    })
}

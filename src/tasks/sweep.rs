//! TTL Sweep Task
//!
//! Reads are the only eviction trigger inside the cache, so a key that is
//! written once and never read again stays in memory. This task bounds that
//! by periodically dropping every expired entry.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::SharedCache;

/// Spawns a background task that sweeps expired entries every `interval`.
///
/// The task holds the cache's write lock only for the duration of each
/// sweep. It exits when `shutdown` is cancelled; the returned handle can
/// also be aborted directly.
///
/// # Example
/// ```ignore
/// let fetcher = CachedFetcher::<String>::from_config(&config);
/// let shutdown = CancellationToken::new();
/// let handle = spawn_sweep_task(fetcher.cache(), Duration::from_secs(30), shutdown.clone());
/// // Later, during shutdown:
/// shutdown.cancel();
/// handle.await?;
/// ```
pub fn spawn_sweep_task<T>(
    cache: SharedCache<T>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    T: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            interval_ms = interval.as_millis() as u64,
            "Starting TTL sweep task"
        );

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let removed = cache.write().await.sweep_expired();

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }

        info!("TTL sweep task stopped");
    })
}

//! Cached Fetcher
//!
//! Composition root: checks the TTL cache, falls back to the retrying
//! executor on a miss, and caches only successful results.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cache::{CacheStats, SharedCache, TtlCache};
use crate::config::Config;
use crate::error::Result;
use crate::retry::{execute_cancellable, RetryPolicy};

// == Cached Fetcher ==
/// Read-through cache in front of a retried async operation.
///
/// Cloning is cheap and every clone shares the same cache. Concurrent misses
/// on one key are not coalesced: each caller runs its own operation and the
/// last one to finish wins the cache slot.
pub struct CachedFetcher<T> {
    cache: SharedCache<T>,
    default_ttl: Duration,
}

impl<T> Clone for CachedFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            cache: Arc::clone(&self.cache),
            default_ttl: self.default_ttl,
        }
    }
}

impl<T> fmt::Debug for CachedFetcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedFetcher")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl<T: Clone> CachedFetcher<T> {
    // == Constructor ==
    /// Creates a fetcher with an empty cache.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_cache(Arc::new(RwLock::new(TtlCache::new())), default_ttl)
    }

    /// Creates a fetcher over an existing shared cache.
    pub fn with_cache(cache: SharedCache<T>, default_ttl: Duration) -> Self {
        Self { cache, default_ttl }
    }

    /// Creates a fetcher using the configured default TTL.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.default_ttl())
    }

    /// Shared handle to the underlying cache, e.g. for a sweep task.
    pub fn cache(&self) -> SharedCache<T> {
        Arc::clone(&self.cache)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Fetch Cached ==
    /// Returns the cached value for `key`, or runs `operation` under `policy`
    /// and caches its result for `ttl`.
    ///
    /// Failures are returned unchanged and leave the cache untouched.
    pub async fn fetch_cached<E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        policy: &RetryPolicy<E>,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        self.fetch_cached_cancellable(key, ttl, policy, &CancellationToken::new(), operation)
            .await
    }

    /// [`fetch_cached`](Self::fetch_cached) with the fetcher's default TTL.
    pub async fn fetch<E, F, Fut>(
        &self,
        key: &str,
        policy: &RetryPolicy<E>,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        self.fetch_cached(key, self.default_ttl, policy, operation)
            .await
    }

    /// [`fetch_cached`](Self::fetch_cached) that stops retrying once `cancel` fires.
    ///
    /// A cache hit is returned even if `cancel` has already fired.
    pub async fn fetch_cached_cancellable<E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        policy: &RetryPolicy<E>,
        cancel: &CancellationToken,
        operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        // Write lock: a stale hit is evicted by the read
        if let Some(value) = self.cache.write().await.get(key) {
            debug!(key, "cache hit");
            return Ok(value);
        }

        debug!(key, "cache miss");
        let value = execute_cancellable(policy, cancel, operation).await?;

        self.cache.write().await.set(key, value.clone(), ttl);
        Ok(value)
    }

    // == Invalidate ==
    /// Drops the cached value for `key` so the next fetch runs the operation.
    pub async fn invalidate(&self, key: &str) {
        self.cache.write().await.clear(key);
    }

    /// Empties the cache, e.g. at shutdown or between tests.
    pub async fn clear_all(&self) {
        self.cache.write().await.clear_all();
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy<String> {
        RetryPolicy::new()
            .max_attempts(3)
            .base_delay(Duration::from_millis(1))
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_fetch_is_cache_hit() {
        let fetcher: CachedFetcher<String> = CachedFetcher::new(Duration::from_secs(60));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let op = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("report".to_string())
        };

        let first = fetcher.fetch("client:1", &fast_policy(), op).await.unwrap();
        let second = fetcher.fetch("client:1", &fast_policy(), op).await.unwrap();

        assert_eq!(first, "report");
        assert_eq!(second, "report");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = fetcher.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_not_cached() {
        let fetcher: CachedFetcher<u32> = CachedFetcher::new(Duration::from_secs(60));

        let err = fetcher
            .fetch("k", &fast_policy(), || async { Err::<u32, _>("down".to_string()) })
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::RetryExhausted { attempts_made: 3, .. }));
        assert!(fetcher.cache().read().await.is_empty());

        let value = fetcher
            .fetch("k", &fast_policy(), || async { Ok::<_, String>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_entry_is_refetched() {
        let fetcher: CachedFetcher<u32> = CachedFetcher::new(Duration::from_secs(60));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let op = move || async move { Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) + 1) };

        let ttl = Duration::from_millis(10);
        assert_eq!(fetcher.fetch_cached("k", ttl, &fast_policy(), op).await.unwrap(), 1);
        tokio::time::sleep(Duration::from_millis(11)).await;
        assert_eq!(fetcher.fetch_cached("k", ttl, &fast_policy(), op).await.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_refetch() {
        let fetcher: CachedFetcher<u32> = CachedFetcher::new(Duration::from_secs(60));
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let op = move || async move { Ok::<_, String>(calls.fetch_add(1, Ordering::SeqCst) + 1) };

        fetcher.fetch("k", &fast_policy(), op).await.unwrap();
        fetcher.invalidate("k").await;
        assert_eq!(fetcher.fetch("k", &fast_policy(), op).await.unwrap(), 2);

        fetcher.clear_all().await;
        assert!(fetcher.cache().read().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hit_ignores_cancellation() {
        let fetcher: CachedFetcher<u32> = CachedFetcher::new(Duration::from_secs(60));
        fetcher.cache().write().await.set("k", 5, Duration::from_secs(60));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let value = fetcher
            .fetch_cached_cancellable(
                "k",
                Duration::from_secs(60),
                &fast_policy(),
                &cancel,
                || async { Err::<u32, _>("unreachable".to_string()) },
            )
            .await
            .unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_cache() {
        let fetcher: CachedFetcher<u32> = CachedFetcher::from_config(&Config::default());
        let clone = fetcher.clone();

        fetcher
            .fetch("k", &fast_policy(), || async { Ok::<_, String>(1) })
            .await
            .unwrap();

        assert!(clone.cache().read().await.contains_live("k"));
        assert_eq!(clone.default_ttl(), Duration::from_secs(300));
    }
}

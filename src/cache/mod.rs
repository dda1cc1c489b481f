//! Cache Module
//!
//! Provides in-memory caching with TTL expiration.

mod entry;
mod stats;
mod store;


use std::sync::Arc;

use tokio::sync::RwLock;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::CacheStats;
pub use store::TtlCache;

/// Handle to a cache shared between the fetcher and background tasks.
pub type SharedCache<T> = Arc<RwLock<TtlCache<T>>>;

//! Retrying Cache - TTL caching and exponential-backoff retries for async reads
//!
//! Wraps any idempotent read against an unreliable dependency (a database
//! query, a third-party API call) with a read-through TTL cache and a retry
//! executor that backs off between attempts and honours cancellation.
//!
//! ```ignore
//! let config = Config::from_env();
//! let fetcher = CachedFetcher::<Report>::from_config(&config);
//! let policy = config.retry_policy().retry_if(|e: &ApiError| e.is_transient());
//!
//! let report = fetcher
//!     .fetch("report:42", &policy, || client.get_report(42))
//!     .await?;
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod retry;
pub mod tasks;

pub use cache::{CacheStats, SharedCache, TtlCache};
pub use config::Config;
pub use error::FetchError;
pub use fetcher::CachedFetcher;
pub use retry::{execute, execute_cancellable, RetryAttempt, RetryPolicy, RetryState};
pub use tasks::spawn_sweep_task;
pub use tokio_util::sync::CancellationToken;

//! Configuration Module
//!
//! Loads retry and cache defaults from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, ensure, Context};
use tracing::warn;

use crate::retry::RetryPolicy;

/// Process-wide defaults for the retrying cache.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Maximum attempts per fetch, including the first
    pub max_attempts: u32,
    /// Delay before the first retry, in milliseconds
    pub base_delay_ms: u64,
    /// Ceiling on any single retry delay, in milliseconds
    pub max_delay_ms: u64,
    /// Relative jitter applied to retry delays
    pub jitter: f64,
    /// TTL used by `CachedFetcher::fetch`, in milliseconds
    pub default_ttl_ms: u64,
    /// Interval of the background sweep in milliseconds, 0 = no sweep
    pub sweep_interval_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            jitter: 0.2,
            default_ttl_ms: 300_000,
            sweep_interval_ms: 0,
        }
    }
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// Missing, unparsable or out-of-range values fall back to their defaults
    /// with a warning, so the result always passes [`validate`](Self::validate).
    ///
    /// # Environment Variables
    /// - `RETRY_MAX_ATTEMPTS` - Attempts per fetch (default: 3)
    /// - `RETRY_BASE_DELAY_MS` - First retry delay (default: 500)
    /// - `RETRY_MAX_DELAY_MS` - Retry delay ceiling (default: 8000)
    /// - `RETRY_JITTER` - Relative jitter (default: 0.2)
    /// - `CACHE_DEFAULT_TTL_MS` - Default entry TTL (default: 300000)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Background sweep period (default: 0, disabled)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), but rejects malformed or out-of-range values.
    pub fn try_from_env() -> anyhow::Result<Self> {
        Self::try_from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let mut config = Self {
            max_attempts: lenient_var(&lookup, "RETRY_MAX_ATTEMPTS", defaults.max_attempts),
            base_delay_ms: lenient_var(&lookup, "RETRY_BASE_DELAY_MS", defaults.base_delay_ms),
            max_delay_ms: lenient_var(&lookup, "RETRY_MAX_DELAY_MS", defaults.max_delay_ms),
            jitter: lenient_var(&lookup, "RETRY_JITTER", defaults.jitter),
            default_ttl_ms: lenient_var(&lookup, "CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms),
            sweep_interval_ms: lenient_var(
                &lookup,
                "CACHE_SWEEP_INTERVAL_MS",
                defaults.sweep_interval_ms,
            ),
        };
        config.reset_out_of_range();
        config
    }

    fn reset_out_of_range(&mut self) {
        let defaults = Self::default();
        if self.max_attempts < 1 {
            warn!("RETRY_MAX_ATTEMPTS must be at least 1, using {}", defaults.max_attempts);
            self.max_attempts = defaults.max_attempts;
        }
        if self.base_delay_ms == 0 {
            warn!("RETRY_BASE_DELAY_MS must be positive, using {}", defaults.base_delay_ms);
            self.base_delay_ms = defaults.base_delay_ms;
        }
        if self.max_delay_ms < self.base_delay_ms {
            let fallback = defaults.max_delay_ms.max(self.base_delay_ms);
            warn!(
                "RETRY_MAX_DELAY_MS ({}) is below RETRY_BASE_DELAY_MS ({}), using {}",
                self.max_delay_ms, self.base_delay_ms, fallback
            );
            self.max_delay_ms = fallback;
        }
        if !(0.0..1.0).contains(&self.jitter) {
            warn!("RETRY_JITTER must be in [0, 1), using {}", defaults.jitter);
            self.jitter = defaults.jitter;
        }
        if self.default_ttl_ms == 0 {
            warn!("CACHE_DEFAULT_TTL_MS must be positive, using {}", defaults.default_ttl_ms);
            self.default_ttl_ms = defaults.default_ttl_ms;
        }
    }

    fn try_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            max_attempts: parse_var(&lookup, "RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            base_delay_ms: parse_var(&lookup, "RETRY_BASE_DELAY_MS", defaults.base_delay_ms)?,
            max_delay_ms: parse_var(&lookup, "RETRY_MAX_DELAY_MS", defaults.max_delay_ms)?,
            jitter: parse_var(&lookup, "RETRY_JITTER", defaults.jitter)?,
            default_ttl_ms: parse_var(&lookup, "CACHE_DEFAULT_TTL_MS", defaults.default_ttl_ms)?,
            sweep_interval_ms: parse_var(
                &lookup,
                "CACHE_SWEEP_INTERVAL_MS",
                defaults.sweep_interval_ms,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants a [`RetryPolicy`] relies on.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.max_attempts >= 1, "RETRY_MAX_ATTEMPTS must be at least 1");
        ensure!(self.base_delay_ms > 0, "RETRY_BASE_DELAY_MS must be positive");
        ensure!(
            self.max_delay_ms >= self.base_delay_ms,
            "RETRY_MAX_DELAY_MS ({}) must not be below RETRY_BASE_DELAY_MS ({})",
            self.max_delay_ms,
            self.base_delay_ms
        );
        if !(0.0..1.0).contains(&self.jitter) {
            bail!("RETRY_JITTER must be in [0, 1), got {}", self.jitter);
        }
        ensure!(self.default_ttl_ms > 0, "CACHE_DEFAULT_TTL_MS must be positive");
        Ok(())
    }

    /// Builds a retry policy from these defaults. Every error is retryable
    /// until the caller narrows it with [`RetryPolicy::retry_if`].
    pub fn retry_policy<E>(&self) -> RetryPolicy<E> {
        RetryPolicy::new()
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .jitter(self.jitter)
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Sweep period, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_ms > 0).then(|| Duration::from_millis(self.sweep_interval_ms))
    }
}

fn lenient_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> T {
    lookup(name)
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value {raw:?} for {name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 500);
        assert_eq!(config.max_delay_ms, 8000);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_eq!(config.sweep_interval(), None);
    }

    #[test]
    fn test_config_from_lookup_defaults() {
        let config = Config::from_lookup(lookup_from(&[]));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_from_lookup_overrides_and_ignores_garbage() {
        let config = Config::from_lookup(lookup_from(&[
            ("RETRY_MAX_ATTEMPTS", "5"),
            ("RETRY_BASE_DELAY_MS", " 100 "),
            ("RETRY_MAX_DELAY_MS", "not-a-number"),
            ("CACHE_SWEEP_INTERVAL_MS", "1000"),
        ]));

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 100);
        assert_eq!(config.max_delay_ms, 8000);
        assert_eq!(config.sweep_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_from_lookup_resets_out_of_range_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("RETRY_MAX_ATTEMPTS", "0"),
            ("RETRY_BASE_DELAY_MS", "2000"),
            ("RETRY_MAX_DELAY_MS", "10"),
            ("RETRY_JITTER", "1.5"),
            ("CACHE_DEFAULT_TTL_MS", "0"),
        ]));

        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay_ms, 2000);
        assert_eq!(config.max_delay_ms, 8000);
        assert_eq!(config.jitter, 0.2);
        assert_eq!(config.default_ttl(), Duration::from_secs(300));
        assert_ok!(config.validate());
    }

    #[test]
    fn test_try_from_lookup_reports_bad_variable() {
        let err = assert_err!(Config::try_from_lookup(lookup_from(&[(
            "RETRY_MAX_DELAY_MS",
            "soon"
        )])));
        assert!(err.to_string().contains("RETRY_MAX_DELAY_MS"), "{err:#}");
    }

    #[test]
    fn test_try_from_lookup_rejects_out_of_range() {
        let err = assert_err!(Config::try_from_lookup(lookup_from(&[
            ("RETRY_BASE_DELAY_MS", "1000"),
            ("RETRY_MAX_DELAY_MS", "10"),
        ])));
        assert!(err.to_string().contains("RETRY_MAX_DELAY_MS"));

        assert_err!(Config::try_from_lookup(lookup_from(&[("RETRY_MAX_ATTEMPTS", "0")])));
        assert_err!(Config::try_from_lookup(lookup_from(&[("RETRY_JITTER", "1.5")])));
        assert_err!(Config::try_from_lookup(lookup_from(&[("CACHE_DEFAULT_TTL_MS", "0")])));
        assert_ok!(Config::try_from_lookup(lookup_from(&[])));
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = Config {
            max_attempts: 4,
            base_delay_ms: 100,
            max_delay_ms: 1000,
            jitter: 0.0,
            ..Config::default()
        };
        let policy: RetryPolicy<String> = config.retry_policy();

        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_millis(1000));
        assert!(policy.is_retryable(&"anything".to_string()));
    }
}

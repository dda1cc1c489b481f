//! Backoff Policy
//!
//! Maps attempt numbers to delays and decides whether a failure is worth
//! another attempt. The policy knows nothing about the error type beyond the
//! caller-supplied predicate.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;

/// Default maximum number of attempts, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);
/// Default ceiling on any single delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_millis(8000);

const NANOS_PER_SEC: u128 = 1_000_000_000;

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

// == Retry Attempt ==
/// One planned or executed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt_number: u32,
    /// How long the executor waits before starting this attempt
    pub delay_before: Duration,
}

// == Retry Policy ==
/// Exponential backoff bounded by a ceiling, with optional jitter.
///
/// ```rust
/// # use retrying_cache::RetryPolicy;
/// # use std::time::Duration;
/// let policy: RetryPolicy<u16> = RetryPolicy::new()
///     .max_attempts(3)
///     .base_delay(Duration::from_millis(100))
///     .max_delay(Duration::from_secs(1))
///     .retry_if(|status| *status >= 500);
///
/// assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
/// assert!(!policy.should_retry(1, &404));
/// ```
pub struct RetryPolicy<E> {
    /// Maximum number of attempts (including the first). 1 = no retry.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Ceiling on any single delay.
    pub max_delay: Duration,
    /// Relative jitter, `0.0` for none.
    pub jitter: f64,
    retryable: Predicate<E>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            jitter: self.jitter,
            retryable: Arc::clone(&self.retryable),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .finish_non_exhaustive()
    }
}

impl<E> Default for RetryPolicy<E> {
    /// Three attempts, 500ms base, 8s ceiling, no jitter, every error retryable.
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            jitter: 0.0,
            retryable: Arc::new(|_: &E| true),
        }
    }
}

impl<E> RetryPolicy<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self::default().max_attempts(1)
    }

    /// Maximum attempts including the first. Values below 1 are raised to 1.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Delay before the first retry. A zero delay is raised to 1ms.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(self.base_delay);
        self
    }

    /// Ceiling on any single delay. Never lower than the base delay.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay.max(self.base_delay);
        self
    }

    /// Relative jitter applied to each delay, clamped to `[0.0, 1.0)`.
    /// `0.2` spreads delays over ±20%.
    pub fn jitter(mut self, fraction: f64) -> Self {
        self.jitter = clamp_jitter(fraction);
        self
    }

    /// Classifies which errors are worth retrying.
    pub fn retry_if<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retryable = Arc::new(predicate);
        self
    }

    pub fn is_retryable(&self, error: &E) -> bool {
        (self.retryable)(error)
    }

    // == Delay For Attempt ==
    /// `min(max_delay, base_delay * 2^(attempt - 1))` for `attempt >= 1`.
    ///
    /// Saturates instead of overflowing, so the result is non-decreasing in
    /// `attempt` for every input. Attempt 0 is treated as attempt 1.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let nanos = 1u128
            .checked_shl(exponent)
            .and_then(|factor| self.base_delay.as_nanos().checked_mul(factor));

        match nanos {
            Some(nanos) if nanos < self.max_delay.as_nanos() => Duration::new(
                (nanos / NANOS_PER_SEC) as u64,
                (nanos % NANOS_PER_SEC) as u32,
            ),
            _ => self.max_delay,
        }
    }

    /// [`delay_for_attempt`](Self::delay_for_attempt) spread by the configured jitter,
    /// still capped at `max_delay`.
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        let jitter = clamp_jitter(self.jitter);
        if jitter == 0.0 || delay.is_zero() {
            return delay;
        }

        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        Duration::try_from_secs_f64(delay.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    // == Should Retry ==
    /// Whether a failure on `attempt` should be followed by another attempt.
    pub fn should_retry(&self, attempt: u32, error: &E) -> bool {
        attempt < self.attempt_limit() && self.is_retryable(error)
    }

    /// Un-jittered plan: the first attempt has no delay, attempt `k` waits
    /// `delay_for_attempt(k - 1)`.
    pub fn schedule(&self) -> Vec<RetryAttempt> {
        (1..=self.attempt_limit())
            .map(|attempt_number| RetryAttempt {
                attempt_number,
                delay_before: self.wait_before(attempt_number),
            })
            .collect()
    }

    /// `max_attempts`, never below 1 even if the field was set directly.
    pub(crate) fn attempt_limit(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Un-jittered wait preceding `attempt`.
    pub(crate) fn wait_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            Duration::ZERO
        } else {
            self.delay_for_attempt(attempt - 1)
        }
    }
}

fn clamp_jitter(fraction: f64) -> f64 {
    if fraction.is_finite() {
        fraction.clamp(0.0, 0.99)
    } else {
        0.0
    }
}

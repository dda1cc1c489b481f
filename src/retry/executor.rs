//! Retrying Executor
//!
//! Drives an async operation through a [`RetryPolicy`] until it succeeds,
//! fails for good, or the caller cancels it. The only suspension points are
//! the operation itself and the backoff sleep between attempts.

use std::fmt;
use std::future::Future;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{FetchError, Result};
use crate::retry::{RetryAttempt, RetryPolicy};

// == Retry State ==
/// Lifecycle of a single `execute` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    /// Operation for the given attempt is in flight
    Attempting(u32),
    /// Attempt `n` failed with a retryable error; sleeping before `n + 1`
    Waiting(u32),
    Succeeded,
    Failed,
    Cancelled,
}

impl RetryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: RetryState) -> bool {
        use RetryState::*;
        match (self, next) {
            (Idle, Attempting(1)) | (Idle, Cancelled) => true,
            (Attempting(_), Succeeded | Failed | Cancelled) => true,
            (Attempting(n), Waiting(m)) => n == m,
            (Waiting(n), Attempting(m)) => m == n + 1,
            (Waiting(_), Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RetryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Attempting(n) => write!(f, "attempting({n})"),
            Self::Waiting(n) => write!(f, "waiting({n})"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

fn transition(state: &mut RetryState, next: RetryState) {
    debug_assert!(
        state.can_transition_to(next),
        "illegal retry transition {state} -> {next}"
    );
    debug!(from = %state, to = %next, "retry state transition");
    *state = next;
}

// == Execute ==
/// Runs `operation` under `policy` with no way to cancel it.
///
/// See [`execute_cancellable`] for the full semantics.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy<E>, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    execute_cancellable(policy, &CancellationToken::new(), operation).await
}

/// Runs `operation` under `policy`, stopping as soon as `cancel` fires.
///
/// - Attempt 1 starts immediately.
/// - A non-retryable error ends the call with [`FetchError::NonRetryable`], without delay.
/// - A retryable error on the last allowed attempt ends it with
///   [`FetchError::RetryExhausted`].
/// - Otherwise the executor sleeps `policy.jittered_delay(n)` after failed
///   attempt `n` and tries again.
/// - Cancellation is honoured before each attempt, while the operation is in
///   flight (the operation future is dropped) and during the sleep, and yields
///   [`FetchError::Cancelled`].
///
/// `E: Display` is the only bound on the error type; each failed attempt is
/// logged with the error's display form.
pub async fn execute_cancellable<T, E, F, Fut>(
    policy: &RetryPolicy<E>,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: fmt::Display,
{
    let max_attempts = policy.attempt_limit();
    let mut state = RetryState::Idle;
    let mut attempt = RetryAttempt {
        attempt_number: 1,
        delay_before: std::time::Duration::ZERO,
    };

    loop {
        let n = attempt.attempt_number;
        if cancel.is_cancelled() {
            transition(&mut state, RetryState::Cancelled);
            return Err(FetchError::Cancelled {
                attempts_made: n - 1,
            });
        }

        transition(&mut state, RetryState::Attempting(n));
        debug!(attempt = ?attempt, max_attempts, "starting attempt");

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            result = operation() => Some(result),
        };

        let error = match outcome {
            None => {
                transition(&mut state, RetryState::Cancelled);
                info!(attempt = n, "operation cancelled in flight");
                return Err(FetchError::Cancelled { attempts_made: n });
            }
            Some(Ok(value)) => {
                transition(&mut state, RetryState::Succeeded);
                if n > 1 {
                    info!(attempts_made = n, "operation succeeded after retrying");
                }
                return Ok(value);
            }
            Some(Err(error)) => error,
        };

        if !policy.is_retryable(&error) {
            transition(&mut state, RetryState::Failed);
            debug!(attempt = n, error = %error, "non-retryable error");
            return Err(FetchError::NonRetryable {
                attempts_made: n,
                source: error,
            });
        }

        if !policy.should_retry(n, &error) {
            transition(&mut state, RetryState::Failed);
            warn!(
                attempts_made = n,
                error = %error,
                "giving up after exhausting retry policy"
            );
            return Err(FetchError::RetryExhausted {
                attempts_made: n,
                source: error,
            });
        }

        let delay = policy.jittered_delay(n);
        transition(&mut state, RetryState::Waiting(n));
        warn!(
            attempt = n,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "retrying after transient error"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                transition(&mut state, RetryState::Cancelled);
                info!(attempt = n, "operation cancelled during backoff");
                return Err(FetchError::Cancelled { attempts_made: n });
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt = RetryAttempt {
            attempt_number: n + 1,
            delay_before: delay,
        };
    }
}

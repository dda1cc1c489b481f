//! Retry Module
//!
//! Exponential backoff policy and the executor that applies it.

mod executor;
mod policy;

pub use executor::{execute, execute_cancellable, RetryState};
pub use policy::{
    RetryAttempt, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY,
};

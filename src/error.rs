//! Error types for the retrying fetch path
//!
//! Provides unified error handling using thiserror. The cache itself never
//! fails; every variant here comes out of the retry executor.

use thiserror::Error;

/// Message shown to end users for any failure that may succeed later.
pub const UNAVAILABLE_MESSAGE: &str = "temporarily unavailable, please retry";

/// Message shown to end users when their own request was aborted.
pub const CANCELLED_MESSAGE: &str = "request cancelled";

// == Fetch Error Enum ==
/// Terminal outcome of a failed retried operation.
///
/// `E` is the raw error produced by the wrapped operation.
#[derive(Error, Debug)]
pub enum FetchError<E> {
    /// Every allowed attempt failed with a retryable error
    #[error("operation failed after {attempts_made} attempts: {source}")]
    RetryExhausted {
        attempts_made: u32,
        #[source]
        source: E,
    },

    /// The operation failed with an error the policy does not retry
    #[error("operation failed with a non-retryable error on attempt {attempts_made}: {source}")]
    NonRetryable {
        attempts_made: u32,
        #[source]
        source: E,
    },

    /// The caller cancelled the operation before it completed
    #[error("operation cancelled after {attempts_made} attempts")]
    Cancelled { attempts_made: u32 },
}

impl<E> FetchError<E> {
    /// Number of times the operation was started.
    pub fn attempts_made(&self) -> u32 {
        match self {
            Self::RetryExhausted { attempts_made, .. }
            | Self::NonRetryable { attempts_made, .. }
            | Self::Cancelled { attempts_made } => *attempts_made,
        }
    }

    /// The last error returned by the operation, if it produced one.
    pub fn source_error(&self) -> Option<&E> {
        match self {
            Self::RetryExhausted { source, .. } | Self::NonRetryable { source, .. } => {
                Some(source)
            }
            Self::Cancelled { .. } => None,
        }
    }

    pub fn into_source(self) -> Option<E> {
        match self {
            Self::RetryExhausted { source, .. } | Self::NonRetryable { source, .. } => {
                Some(source)
            }
            Self::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    // == User Message ==
    /// Text suitable for an application boundary; never exposes the raw error.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::RetryExhausted { .. } | Self::NonRetryable { .. } => UNAVAILABLE_MESSAGE,
            Self::Cancelled { .. } => CANCELLED_MESSAGE,
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for retried operations.
pub type Result<T, E> = std::result::Result<T, FetchError<E>>;

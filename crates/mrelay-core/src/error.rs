//! Typed failure taxonomy for the relay pipeline.
//!
//! The transfer engine classifies failures once, here; the retry layer only
//! re-attempts transport-class errors, and the pipeline maps each class to a
//! single user-facing message.

use std::io;
use thiserror::Error;

/// Failure classes raised by the pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The source link could not be resolved to a direct media URL. Fatal;
    /// resolution is cheap to resubmit, so it is never auto-retried.
    #[error("resolution failed: {0}")]
    Resolution(String),

    /// Network/transport failure (connection reset, DNS, retryable HTTP
    /// status). Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// A network operation exceeded its deadline. Retryable.
    #[error("operation timed out")]
    Timeout,

    /// Local sink failure (disk full, permissions). Fatal.
    #[error("sink write failed: {0}")]
    Sink(#[from] io::Error),

    /// Media is larger than the upload ceiling. Triggers the link fallback,
    /// not a failure.
    #[error("media size {size} exceeds upload ceiling {limit}")]
    SizeExceeded { size: u64, limit: u64 },

    /// Cancellation requested by the user. A normal terminal state, not an
    /// error to report as a failure.
    #[error("cancelled")]
    Cancelled,

    /// All retry attempts were spent; carries the final error and the attempt
    /// count for diagnostics.
    #[error("gave up after {attempts} attempt(s): {last}")]
    RetryExhausted { attempts: u32, last: Box<RelayError> },
}

impl RelayError {
    /// True for failures the retry policy may re-attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RelayError::Transport(_) | RelayError::Timeout)
    }

    /// True if this error (or the exhausted error it wraps) is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            RelayError::Cancelled => true,
            RelayError::RetryExhausted { last, .. } => last.is_cancelled(),
            _ => false,
        }
    }
}

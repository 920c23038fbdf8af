use std::time::Duration;

use crate::error::RelayError;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with caps.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Compute the next backoff delay for a given attempt and error.
    ///
    /// `attempt` is 1-based (1 = first attempt). Cancellation and fatal
    /// errors are never retried.
    pub fn decide(&self, attempt: u32, error: &RelayError) -> RetryDecision {
        if !error.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }
        // base * 2^(attempt-1), capped.
        let exp = 1u32 << attempt.saturating_sub(1).min(8);
        let raw = self.base_delay.saturating_mul(exp);
        RetryDecision::RetryAfter(raw.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn no_retry_for_cancellation_or_sink() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, &RelayError::Cancelled), RetryDecision::NoRetry);
        assert_eq!(
            p.decide(1, &RelayError::Sink(io::Error::other("disk full"))),
            RetryDecision::NoRetry
        );
        assert_eq!(
            p.decide(1, &RelayError::Resolution("expired".into())),
            RetryDecision::NoRetry
        );
    }

    #[test]
    fn backoff_grows_and_is_capped() {
        let mut p = RetryPolicy::default();
        p.max_attempts = 20;
        let err = RelayError::Timeout;
        let d1 = match p.decide(1, &err) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        let d2 = match p.decide(2, &err) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        assert!(d2 >= d1);
        let d_last = match p.decide(12, &err) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        assert!(d_last <= p.max_delay);
    }

    #[test]
    fn respects_max_attempts() {
        let mut p = RetryPolicy::default();
        p.max_attempts = 3;
        let err = RelayError::Transport("reset".into());
        assert!(matches!(p.decide(1, &err), RetryDecision::RetryAfter(_)));
        assert!(matches!(p.decide(2, &err), RetryDecision::RetryAfter(_)));
        assert_eq!(p.decide(3, &err), RetryDecision::NoRetry);
    }
}

//! Async retry loop around a fallible operation.

use std::future::Future;

use crate::error::RelayError;

use super::policy::{RetryDecision, RetryPolicy};

/// Runs `op` until it succeeds or the policy says to stop. `op` receives the
/// 1-based attempt number. On a retryable failure, sleeps for the backoff
/// duration then tries again.
///
/// Returns `(value, attempts)` on success. Fatal errors (cancellation, sink
/// failures) are surfaced unchanged; exhausting all attempts wraps the last
/// transport error in `RelayError::RetryExhausted` with the attempt count.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<(T, u32), RelayError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RelayError>>,
{
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(v) => return Ok((v, attempt)),
            Err(e) => match policy.decide(attempt, &e) {
                RetryDecision::NoRetry => {
                    if e.is_retryable() {
                        return Err(RelayError::RetryExhausted {
                            attempts: attempt,
                            last: Box::new(e),
                        });
                    }
                    return Err(e);
                }
                RetryDecision::RetryAfter(d) => {
                    tracing::debug!(attempt, delay_ms = d.as_millis() as u64, "retrying after {e}");
                    tokio::time::sleep(d).await;
                    attempt += 1;
                }
            },
        }
    }
}

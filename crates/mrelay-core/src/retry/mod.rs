//! Retry and backoff policy.
//!
//! Error classification lives on `RelayError` itself; this module decides
//! whether and when to re-attempt, so the download and upload phases share a
//! consistent policy.

mod policy;
mod run;

pub use policy::{RetryDecision, RetryPolicy};
pub use run::run_with_retry;

//! Streaming transfer engine.
//!
//! Moves bytes from a `ByteSource` to a `ByteSink` in chunks, polling a
//! cancellation flag between chunks and invoking a rate-limited progress
//! callback. Sources classify their own failures (transport vs. sink) so the
//! retry layer can tell transient errors from fatal ones.

mod engine;
pub mod file;
pub mod http;

pub use engine::{transfer, verify_length, TransferOptions};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RelayError;

/// Pull side of a transfer. Implementations classify their errors:
/// network reads raise `Transport`/`Timeout`, local reads raise `Sink`.
#[async_trait]
pub trait ByteSource: Send {
    /// Next chunk of data, or `None` at end of stream.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError>;
}

/// Push side of a transfer. Local sinks raise `Sink` (fatal); remote sinks
/// raise `Transport`/`Timeout` (retryable).
#[async_trait]
pub trait ByteSink: Send {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), RelayError>;

    /// Flush and complete the sink. Must be called exactly once, after the
    /// last chunk.
    async fn finish(&mut self) -> Result<(), RelayError>;
}

//! The chunked copy loop shared by the download and upload phases.

use std::time::{Duration, Instant};

use crate::error::RelayError;
use crate::job::CancelFlag;
use crate::progress::{ProgressSnapshot, ProgressTracker};

use super::{ByteSink, ByteSource};

/// Tunables for one transfer, taken from `RelayConfig`.
#[derive(Debug, Clone, Copy)]
pub struct TransferOptions {
    /// Write-buffer size; larger chunks trade memory for fewer writes and
    /// progress callbacks.
    pub chunk_size: usize,
    /// Expected total bytes, 0 when unknown. Used for percent/ETA only; the
    /// caller compares the returned byte count against it (`verify_length`).
    pub total_hint: u64,
    /// Minimum interval between progress callbacks. The final callback on
    /// completion always fires.
    pub progress_interval: Duration,
    /// Deadline for each chunk read; an expiry is a retryable `Timeout`.
    pub read_timeout: Duration,
}

impl Default for TransferOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1024 * 1024,
            total_hint: 0,
            progress_interval: Duration::from_secs(1),
            read_timeout: Duration::from_secs(60),
        }
    }
}

/// Streams `source` into `sink` and returns the total bytes moved.
///
/// The cancellation flag is polled between chunks, so worst-case cancellation
/// latency is one chunk's transfer time. On cancellation the sink is left
/// as-is; resource cleanup is the caller's responsibility.
pub async fn transfer<S, K, F>(
    source: &mut S,
    sink: &mut K,
    opts: &TransferOptions,
    cancel: &CancelFlag,
    mut on_progress: F,
) -> Result<u64, RelayError>
where
    S: ByteSource + ?Sized,
    K: ByteSink + ?Sized,
    F: FnMut(&ProgressSnapshot),
{
    let start = Instant::now();
    let mut tracker = ProgressTracker::new(opts.total_hint);
    let mut transferred: u64 = 0;
    let mut buffer: Vec<u8> = Vec::with_capacity(opts.chunk_size);
    let mut last_emit: Option<Instant> = None;

    loop {
        if cancel.is_requested() {
            return Err(RelayError::Cancelled);
        }

        let chunk = tokio::time::timeout(opts.read_timeout, source.next_chunk())
            .await
            .map_err(|_| RelayError::Timeout)??;
        let Some(chunk) = chunk else {
            break;
        };

        transferred += chunk.len() as u64;
        buffer.extend_from_slice(&chunk);

        if buffer.len() >= opts.chunk_size {
            sink.write_chunk(&buffer).await?;
            buffer.clear();

            let now = Instant::now();
            let due = last_emit
                .map(|t| now.duration_since(t) >= opts.progress_interval)
                .unwrap_or(true);
            if due {
                let snapshot = tracker.record(start.elapsed().as_secs_f64(), transferred);
                on_progress(&snapshot);
                last_emit = Some(now);
            }
        }
    }

    if !buffer.is_empty() {
        sink.write_chunk(&buffer).await?;
    }
    sink.finish().await?;

    // Terminal progress is always visible, rate limit or not.
    let snapshot = tracker.record(start.elapsed().as_secs_f64(), transferred);
    on_progress(&snapshot);

    Ok(transferred)
}

/// Compares moved bytes against the expected total. A short transfer is a
/// truncation, classified as retryable transport failure.
pub fn verify_length(transferred: u64, total_hint: u64) -> Result<(), RelayError> {
    if total_hint > 0 && transferred < total_hint {
        return Err(RelayError::Transport(format!(
            "truncated transfer: got {transferred} of {total_hint} bytes"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;

    struct VecSource {
        chunks: VecDeque<Bytes>,
    }

    impl VecSource {
        fn new(chunks: Vec<&[u8]>) -> Self {
            Self {
                chunks: chunks.into_iter().map(Bytes::copy_from_slice).collect(),
            }
        }
    }

    #[async_trait]
    impl super::super::ByteSource for VecSource {
        async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
            Ok(self.chunks.pop_front())
        }
    }

    #[derive(Default)]
    struct VecSink {
        data: Vec<u8>,
        finished: bool,
        fail_writes: bool,
    }

    #[async_trait]
    impl super::super::ByteSink for VecSink {
        async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), RelayError> {
            if self.fail_writes {
                return Err(RelayError::Sink(std::io::Error::other("disk full")));
            }
            self.data.extend_from_slice(chunk);
            Ok(())
        }

        async fn finish(&mut self) -> Result<(), RelayError> {
            self.finished = true;
            Ok(())
        }
    }

    fn small_opts(total: u64) -> TransferOptions {
        TransferOptions {
            chunk_size: 8,
            total_hint: total,
            progress_interval: Duration::from_millis(0),
            read_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn moves_all_bytes_and_finishes_sink() {
        let mut source = VecSource::new(vec![b"hello ", b"world", b"!"]);
        let mut sink = VecSink::default();
        let n = transfer(
            &mut source,
            &mut sink,
            &small_opts(12),
            &CancelFlag::new(),
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(n, 12);
        assert_eq!(sink.data, b"hello world!");
        assert!(sink.finished);
    }

    #[tokio::test]
    async fn final_progress_callback_always_fires() {
        let mut source = VecSource::new(vec![b"abc"]);
        let mut sink = VecSink::default();
        let mut snapshots = Vec::new();
        let opts = TransferOptions {
            progress_interval: Duration::from_secs(3600),
            ..small_opts(3)
        };
        transfer(&mut source, &mut sink, &opts, &CancelFlag::new(), |s| {
            snapshots.push(*s)
        })
        .await
        .unwrap();
        let last = snapshots.last().expect("terminal callback");
        assert_eq!(last.transferred, 3);
        assert_eq!(last.percent, 100.0);
    }

    #[tokio::test]
    async fn cancellation_aborts_before_next_chunk() {
        let mut source = VecSource::new(vec![b"aaaa", b"bbbb"]);
        let mut sink = VecSink::default();
        let cancel = CancelFlag::new();
        cancel.request();
        let err = transfer(&mut source, &mut sink, &small_opts(8), &cancel, |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Cancelled));
        assert!(sink.data.is_empty());
        assert!(!sink.finished);
    }

    #[tokio::test]
    async fn sink_errors_propagate_as_fatal() {
        let mut source = VecSource::new(vec![b"0123456789abcdef"]);
        let mut sink = VecSink {
            fail_writes: true,
            ..Default::default()
        };
        let err = transfer(
            &mut source,
            &mut sink,
            &small_opts(16),
            &CancelFlag::new(),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RelayError::Sink(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn verify_length_flags_truncation_as_retryable() {
        assert!(verify_length(10, 10).is_ok());
        assert!(verify_length(10, 0).is_ok());
        let err = verify_length(5, 10).unwrap_err();
        assert!(err.is_retryable());
    }
}

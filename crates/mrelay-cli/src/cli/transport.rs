//! Spool-directory chat transport.
//!
//! Stand-in for a real chat backend: status messages go to stdout and the
//! log, relayed media land as files in a per-user outbox directory. A chat
//! integration replaces this by implementing the same trait.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use mrelay_core::error::RelayError;
use mrelay_core::storage::temp_path;
use mrelay_core::transfer::file::FileSink;
use mrelay_core::transfer::ByteSink;
use mrelay_core::transport::{ChatTransport, MessageHandle};

pub struct SpoolTransport {
    outbox: PathBuf,
    next_handle: AtomicU64,
}

impl SpoolTransport {
    pub fn new(outbox: PathBuf) -> Self {
        Self {
            outbox,
            next_handle: AtomicU64::new(1),
        }
    }

    fn user_dir(&self, chat: i64) -> PathBuf {
        self.outbox.join(chat.to_string())
    }
}

#[async_trait]
impl ChatTransport for SpoolTransport {
    async fn send_status(&self, chat: i64, text: &str) -> Result<MessageHandle, RelayError> {
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        println!("[user {chat}] {text}");
        tracing::info!(chat, message = id, "status: {}", text.lines().next().unwrap_or(""));
        Ok(MessageHandle(id))
    }

    async fn edit_status(
        &self,
        chat: i64,
        message: &MessageHandle,
        text: &str,
    ) -> Result<(), RelayError> {
        tracing::debug!(chat, message = message.0, "status edit: {}", text.lines().next().unwrap_or(""));
        Ok(())
    }

    async fn delete_status(&self, chat: i64, message: &MessageHandle) -> Result<(), RelayError> {
        tracing::debug!(chat, message = message.0, "status deleted");
        Ok(())
    }

    async fn media_sink(
        &self,
        chat: i64,
        filename: &str,
        caption: &str,
        size_hint: u64,
    ) -> Result<Box<dyn ByteSink>, RelayError> {
        let dir = self.user_dir(chat);
        tokio::fs::create_dir_all(&dir).await?;
        let dest = dir.join(filename);
        tracing::info!(chat, path = %dest.display(), size_hint, caption, "opening media sink");
        Ok(Box::new(SpoolSink::open(dest).await?))
    }
}

/// Stages the upload in a `.part` file and renames it into place on
/// `finish`, so an upload that dies mid-stream never leaves a truncated
/// file at the delivered path.
struct SpoolSink {
    inner: FileSink,
    staging: PathBuf,
    dest: PathBuf,
}

impl SpoolSink {
    async fn open(dest: PathBuf) -> Result<Self, RelayError> {
        let staging = temp_path(&dest);
        let inner = FileSink::create(&staging).await?;
        Ok(Self {
            inner,
            staging,
            dest,
        })
    }
}

#[async_trait]
impl ByteSink for SpoolSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), RelayError> {
        self.inner.write_chunk(chunk).await
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        self.inner.finish().await?;
        tokio::fs::rename(&self.staging, &self.dest).await?;
        Ok(())
    }
}

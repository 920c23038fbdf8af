//! Chat transport interface: status messages and the media upload sink.
//!
//! The chat protocol itself is out of scope; the pipeline only needs to send
//! and edit status messages and stream media bytes out. The upload side is a
//! `ByteSink` so the transfer engine can report progress while uploading.

use async_trait::async_trait;

use crate::error::RelayError;
use crate::job::UserId;
use crate::transfer::ByteSink;

/// Opaque handle to a previously sent status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle(pub u64);

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Sends a new status message to `chat` and returns its handle.
    async fn send_status(&self, chat: UserId, text: &str) -> Result<MessageHandle, RelayError>;

    /// Edits a previously sent status message in place.
    async fn edit_status(
        &self,
        chat: UserId,
        message: &MessageHandle,
        text: &str,
    ) -> Result<(), RelayError>;

    /// Deletes a previously sent status message. Best-effort.
    async fn delete_status(&self, chat: UserId, message: &MessageHandle) -> Result<(), RelayError>;

    /// Opens a streaming sink that delivers media to `chat`. The transfer
    /// engine writes the file through it and calls `finish` when done, so
    /// upload progress flows through the same callbacks as the download.
    async fn media_sink(
        &self,
        chat: UserId,
        filename: &str,
        caption: &str,
        size_hint: u64,
    ) -> Result<Box<dyn ByteSink>, RelayError>;
}

//! Local file source and sink for the transfer engine.
//!
//! Local I/O failures are sink-class (fatal, never retried): a full disk or
//! a vanished temp file will not get better on a second attempt.

use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::RelayError;

use super::{ByteSink, ByteSource};

/// Writes the download phase's bytes to a temp file.
#[derive(Debug)]
pub struct FileSink {
    file: File,
}

impl FileSink {
    /// Creates (or truncates) the file at `path`.
    pub async fn create(path: &Path) -> Result<Self, RelayError> {
        let file = File::create(path).await?;
        Ok(Self { file })
    }
}

#[async_trait]
impl ByteSink for FileSink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), RelayError> {
        self.file.write_all(chunk).await?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        Ok(())
    }
}

/// Reads a completed temp file back out for the upload phase.
#[derive(Debug)]
pub struct FileSource {
    file: File,
    chunk_size: usize,
}

impl FileSource {
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, RelayError> {
        let file = File::open(path).await?;
        Ok(Self {
            file,
            chunk_size: chunk_size.max(1),
        })
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, RelayError> {
        let mut buf = vec![0u8; self.chunk_size];
        let n = self.file.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(Bytes::from(buf)))
    }
}

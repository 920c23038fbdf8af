//! In-memory collaborators for pipeline integration tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use mrelay_core::error::RelayError;
use mrelay_core::history::{JobRecord, RecordStore};
use mrelay_core::resolver::{ResolvedMedia, Resolver};
use mrelay_core::transfer::ByteSink;
use mrelay_core::transport::{ChatTransport, MessageHandle};

/// Resolver that returns a fixed result (or a fixed error).
pub struct StaticResolver {
    result: Mutex<Option<Result<ResolvedMedia, String>>>,
}

impl StaticResolver {
    pub fn ok(media: ResolvedMedia) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(Ok(media))),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(Err(message.to_string()))),
        })
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, _source_url: &str) -> Result<ResolvedMedia, RelayError> {
        match self.result.lock().unwrap().clone() {
            Some(Ok(media)) => Ok(media),
            Some(Err(msg)) => Err(RelayError::Resolution(msg)),
            None => Err(RelayError::Resolution("no result configured".into())),
        }
    }
}

/// One completed upload captured by the transport.
#[derive(Debug, Clone)]
pub struct Upload {
    pub chat: i64,
    pub filename: String,
    pub caption: String,
    pub data: Vec<u8>,
}

#[derive(Default)]
pub struct TransportLog {
    pub sent: Vec<(i64, String)>,
    pub edits: Vec<(u64, String)>,
    pub deleted: Vec<u64>,
    pub uploads: Vec<Upload>,
}

/// Transport that records everything and stores uploads in memory.
#[derive(Default)]
pub struct RecordingTransport {
    pub log: Arc<Mutex<TransportLog>>,
}

impl RecordingTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn final_texts(&self) -> Vec<String> {
        let log = self.log.lock().unwrap();
        log.sent
            .iter()
            .map(|(_, t)| t.clone())
            .chain(log.edits.iter().map(|(_, t)| t.clone()))
            .collect()
    }
}

#[async_trait]
impl ChatTransport for RecordingTransport {
    async fn send_status(&self, chat: i64, text: &str) -> Result<MessageHandle, RelayError> {
        let mut log = self.log.lock().unwrap();
        log.sent.push((chat, text.to_string()));
        Ok(MessageHandle(log.sent.len() as u64))
    }

    async fn edit_status(
        &self,
        _chat: i64,
        message: &MessageHandle,
        text: &str,
    ) -> Result<(), RelayError> {
        self.log
            .lock()
            .unwrap()
            .edits
            .push((message.0, text.to_string()));
        Ok(())
    }

    async fn delete_status(&self, _chat: i64, message: &MessageHandle) -> Result<(), RelayError> {
        self.log.lock().unwrap().deleted.push(message.0);
        Ok(())
    }

    async fn media_sink(
        &self,
        chat: i64,
        filename: &str,
        caption: &str,
        _size_hint: u64,
    ) -> Result<Box<dyn ByteSink>, RelayError> {
        Ok(Box::new(MemorySink {
            log: Arc::clone(&self.log),
            upload: Upload {
                chat,
                filename: filename.to_string(),
                caption: caption.to_string(),
                data: Vec::new(),
            },
        }))
    }
}

/// Buffers upload bytes; committed to the transport log on `finish`.
pub struct MemorySink {
    log: Arc<Mutex<TransportLog>>,
    upload: Upload,
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), RelayError> {
        self.upload.data.extend_from_slice(chunk);
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), RelayError> {
        self.log.lock().unwrap().uploads.push(self.upload.clone());
        Ok(())
    }
}

/// Record store backed by a Vec.
#[derive(Default)]
pub struct MemoryStore {
    pub records: Arc<Mutex<Vec<JobRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn append_record(&self, record: &JobRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn count_by_user(&self, user: i64) -> anyhow::Result<i64> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user)
            .count() as i64)
    }

    async fn recent_for_user(&self, user: i64, limit: i64) -> anyhow::Result<Vec<JobRecord>> {
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .rev()
            .filter(|r| r.user_id == user)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

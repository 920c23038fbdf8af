//! Resolver interface for turning source links into direct media URLs.
//!
//! The pipeline only depends on this trait; the actual link-resolution
//! backends (hosting-site APIs and so on) plug in from outside the core.

use async_trait::async_trait;

use crate::error::RelayError;

/// What a resolver learns about a source link.
#[derive(Debug, Clone)]
pub struct ResolvedMedia {
    /// Directly fetchable media URL.
    pub direct_url: String,
    /// Byte size if the backend reports one; probed later when absent.
    pub size_hint: Option<u64>,
    /// Display title for status messages and the local filename.
    pub title: String,
}

/// Maps an opaque source URL to direct media metadata. Failures are
/// `RelayError::Resolution`: terminal, never retried.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, source_url: &str) -> Result<ResolvedMedia, RelayError>;
}

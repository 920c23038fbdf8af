//! Temp file lifecycle for one job.
//!
//! Each pipeline run exclusively owns one `.part` file between the download
//! and the end of the upload. The guard deletes it on drop, which covers
//! every exit path: success, failure, and cancellation.

use std::path::{Path, PathBuf};

/// Temporary file suffix used while a download is in flight.
pub const TEMP_SUFFIX: &str = ".part";

/// Path for the temp file: appends `.part` to the final name.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Deletes the guarded path when dropped (if it exists).
#[derive(Debug)]
pub struct TempFileGuard {
    path: PathBuf,
}

impl TempFileGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                tracing::warn!(path = %self.path.display(), "temp file cleanup failed: {e}");
            } else {
                tracing::debug!(path = %self.path.display(), "temp file removed");
            }
        }
    }
}

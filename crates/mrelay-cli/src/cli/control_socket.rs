//! Control socket: server (during `mrelay run`) and client (other commands).
//!
//! Protocol, one line per command:
//!   "submit <user> <url>"
//!   "cancel <user> <job_id>"
//!   "cancel-user <user>"
//! Malformed lines are ignored.

use anyhow::{bail, Result};
use mrelay_core::service::RelayService;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixListener;

/// Spawns a task that listens on `path` and feeds each parsed line into the
/// service.
pub fn spawn_control_listener(
    service: Arc<RelayService>,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let handle = tokio::spawn(async move {
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(path = %path.display(), "control socket bind: {}", e);
                return;
            }
        };
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let service = Arc::clone(&service);
                    tokio::spawn(async move {
                        let mut reader = BufReader::new(stream).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            dispatch_line(&service, line.trim()).await;
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

async fn dispatch_line(service: &RelayService, line: &str) {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("submit") => {
            if let (Some(Ok(user)), Some(url)) =
                (parts.next().map(str::parse::<i64>), parts.next())
            {
                service.submit(user, url).await;
            }
        }
        Some("cancel") => {
            if let (Some(Ok(user)), Some(Ok(id))) = (
                parts.next().map(str::parse::<i64>),
                parts.next().map(str::parse::<u64>),
            ) {
                service.cancel_job(user, id).await;
            }
        }
        Some("cancel-user") => {
            if let Some(Ok(user)) = parts.next().map(str::parse::<i64>) {
                service.cancel_all(user).await;
            }
        }
        _ => tracing::debug!(line, "ignoring unknown control line"),
    }
}

/// Sends one command line to the running service's control socket.
pub async fn send_line(socket_path: &Path, line: &str) -> Result<()> {
    if !socket_path.exists() {
        bail!("service is not running (no socket at {})", socket_path.display());
    }
    let mut stream = tokio::net::UnixStream::connect(socket_path).await?;
    stream.write_all(format!("{line}\n").as_bytes()).await?;
    Ok(())
}

//! `mrelay run` – run the relay service until interrupted.

use anyhow::Result;
use mrelay_core::config::{control_socket_path, RelayConfig};
use mrelay_core::gate::{AccessGate, AllowListGate, OpenGate};
use mrelay_core::history::SqliteRecordStore;
use mrelay_core::pipeline::RelayPipeline;
use mrelay_core::scheduler::{spawn_sweeper, JobScheduler};
use mrelay_core::service::RelayService;
use mrelay_core::transport::ChatTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::control_socket;
use crate::cli::resolver::DirectResolver;
use crate::cli::transport::SpoolTransport;

pub async fn run_service(cfg: RelayConfig) -> Result<()> {
    let store = Arc::new(SqliteRecordStore::open_default().await?);

    let outbox = cfg
        .download_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("outbox");
    std::fs::create_dir_all(&outbox)?;
    let transport: Arc<dyn ChatTransport> = Arc::new(SpoolTransport::new(outbox));

    let resolver = Arc::new(DirectResolver::new(cfg.transfer_timeout()));

    let pipeline = Arc::new(RelayPipeline::new(
        resolver,
        Arc::clone(&transport),
        store,
        cfg.clone(),
    ));
    let scheduler = JobScheduler::new(cfg.max_jobs_per_user, pipeline);
    spawn_sweeper(
        Arc::clone(&scheduler),
        Duration::from_secs(cfg.sweep_interval_secs),
        Duration::from_secs(cfg.sweep_grace_secs),
    );

    let gate: Arc<dyn AccessGate> = match &cfg.allowed_users {
        Some(users) => Arc::new(AllowListGate::new(users.iter().copied())),
        None => Arc::new(OpenGate),
    };
    let service = Arc::new(RelayService::new(gate, scheduler, transport));

    let socket_path = control_socket_path()?;
    control_socket::spawn_control_listener(Arc::clone(&service), &socket_path)?;
    tracing::info!(socket = %socket_path.display(), "relay service started");
    println!(
        "mrelay service running; control socket at {}",
        socket_path.display()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupt received, shutting down");
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

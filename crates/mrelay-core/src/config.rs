use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per phase (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 1.0,
            max_delay_secs: 30,
        }
    }
}

/// Global configuration loaded from `~/.config/mrelay/config.toml`.
///
/// Every pipeline tunable lives here; nothing is hardcoded in the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Concurrent active jobs allowed per user; further submissions queue.
    pub max_jobs_per_user: usize,
    /// Transfer write-buffer size in bytes.
    pub chunk_size_bytes: usize,
    /// Deadline for each network operation (probe, chunk read) in seconds.
    pub transfer_timeout_secs: u64,
    /// Media larger than this is not uploaded; the user gets a direct link.
    pub upload_ceiling_bytes: u64,
    /// Minimum seconds between progress-message edits.
    pub progress_interval_secs: u64,
    /// How often the scheduler sweeps for dead pipeline tasks.
    pub sweep_interval_secs: u64,
    /// Grace period before a dead task's slot is reclaimed.
    pub sweep_grace_secs: u64,
    /// Where temp files are written (None = current directory).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Users allowed to submit (None = everyone).
    #[serde(default)]
    pub allowed_users: Option<Vec<i64>>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_jobs_per_user: 2,
            chunk_size_bytes: 1024 * 1024,
            transfer_timeout_secs: 60,
            upload_ceiling_bytes: 2 * 1024 * 1024 * 1024,
            progress_interval_secs: 1,
            sweep_interval_secs: 30,
            sweep_grace_secs: 60,
            download_dir: None,
            allowed_users: None,
            retry: None,
        }
    }
}

impl RelayConfig {
    /// Retry policy from the optional `[retry]` table, or defaults.
    pub fn retry_policy(&self) -> RetryPolicy {
        match &self.retry {
            Some(r) => RetryPolicy {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
            },
            None => RetryPolicy::default(),
        }
    }

    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_secs(self.progress_interval_secs)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mrelay")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Path of the Unix control socket the running service listens on.
pub fn control_socket_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mrelay")?;
    let state_dir = xdg_dirs.get_state_home();
    fs::create_dir_all(&state_dir)?;
    Ok(state_dir.join("control.sock"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<RelayConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = RelayConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: RelayConfig = toml::from_str(&data)?;
    Ok(cfg)
}

//! CLI for the mrelay media relay service.

mod commands;
pub mod control_socket;
mod resolver;
mod transport;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mrelay_core::config;

use commands::{run_cancel, run_cancel_user, run_history, run_service, run_submit};

/// Top-level CLI for the mrelay media relay.
#[derive(Debug, Parser)]
#[command(name = "mrelay")]
#[command(about = "mrelay: queue-managed media download/upload relay", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Run the relay service (scheduler, pipelines, control socket).
    Run,

    /// Submit a source link on behalf of a user to the running service.
    Submit {
        /// User id the job belongs to (also the status destination).
        user_id: i64,
        /// Source link to relay.
        url: String,
    },

    /// Cancel one job by id.
    Cancel {
        /// User id the job belongs to.
        user_id: i64,
        /// Job identifier (as reported at submission).
        job_id: u64,
    },

    /// Cancel all of a user's jobs, active and queued.
    CancelUser {
        /// User id whose jobs to cancel.
        user_id: i64,
    },

    /// Show a user's recent relay history.
    History {
        /// User id to look up.
        user_id: i64,
        /// Maximum rows to print.
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Run => run_service(cfg).await?,
            CliCommand::Submit { user_id, url } => run_submit(user_id, &url).await?,
            CliCommand::Cancel { user_id, job_id } => run_cancel(user_id, job_id).await?,
            CliCommand::CancelUser { user_id } => run_cancel_user(user_id).await?,
            CliCommand::History { user_id, limit } => run_history(user_id, limit).await?,
        }

        Ok(())
    }
}

//! `mrelay cancel` / `mrelay cancel-user` – request cancellations.

use anyhow::Result;
use mrelay_core::config::control_socket_path;

use crate::cli::control_socket;

pub async fn run_cancel(user_id: i64, job_id: u64) -> Result<()> {
    let socket = control_socket_path()?;
    control_socket::send_line(&socket, &format!("cancel {user_id} {job_id}")).await?;
    println!("cancellation requested for job {job_id}");
    Ok(())
}

pub async fn run_cancel_user(user_id: i64) -> Result<()> {
    let socket = control_socket_path()?;
    control_socket::send_line(&socket, &format!("cancel-user {user_id}")).await?;
    println!("cancellation requested for all jobs of user {user_id}");
    Ok(())
}

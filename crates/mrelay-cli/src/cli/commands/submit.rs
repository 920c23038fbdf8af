//! `mrelay submit` – hand a source link to the running service.

use anyhow::Result;
use mrelay_core::config::control_socket_path;

use crate::cli::control_socket;

pub async fn run_submit(user_id: i64, url: &str) -> Result<()> {
    let socket = control_socket_path()?;
    control_socket::send_line(&socket, &format!("submit {user_id} {url}")).await?;
    println!("submitted for user {user_id}: {url}");
    Ok(())
}

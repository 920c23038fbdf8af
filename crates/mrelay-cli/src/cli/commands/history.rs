//! `mrelay history` – show a user's recent relays.

use anyhow::Result;
use mrelay_core::history::{RecordStore, SqliteRecordStore};
use mrelay_core::progress::format_size;

pub async fn run_history(user_id: i64, limit: i64) -> Result<()> {
    let store = SqliteRecordStore::open_default().await?;
    let records = store.recent_for_user(user_id, limit).await?;
    if records.is_empty() {
        println!("No history for user {user_id}.");
        return Ok(());
    }
    println!(
        "{:<6} {:<10} {:<9} {:<8} {}",
        "JOB", "STATE", "SIZE", "TRIES", "TITLE"
    );
    for r in records {
        println!(
            "{:<6} {:<10} {:<9} {:<8} {}",
            r.job_id,
            r.state,
            format_size(r.bytes_transferred.max(0) as u64),
            r.attempts,
            r.title
        );
    }
    Ok(())
}

//! Append-only relay records (SQLite via sqlx).
//!
//! Stores one summary row per finished job for historical/stat queries. The
//! pipeline depends only on the `RecordStore` trait; nothing here affects
//! pipeline correctness.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;

use crate::job::UserId;

/// Summary of one finished job, appended at the end of its pipeline run.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: i64,
    pub user_id: UserId,
    pub source_url: String,
    pub title: String,
    /// Terminal state as a string ("completed", "failed", "cancelled").
    pub state: String,
    pub bytes_transferred: i64,
    /// Download attempts spent (1 = no retries).
    pub attempts: i64,
    pub created_at: i64,
    pub finished_at: i64,
}

/// Append-only store of job summaries.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn append_record(&self, record: &JobRecord) -> Result<()>;
    async fn count_by_user(&self, user: UserId) -> Result<i64>;
    async fn recent_for_user(&self, user: UserId, limit: i64) -> Result<Vec<JobRecord>>;
}

/// SQLite-backed record store.
///
/// The database file lives under the XDG state directory:
/// `~/.local/state/mrelay/records.db`.
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: Pool<Sqlite>,
}

impl SqliteRecordStore {
    /// Open (or create) the default record database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("mrelay")?;
        let state_dir = xdg_dirs.get_state_home();
        tokio::fs::create_dir_all(&state_dir).await?;
        Self::open_at(&state_dir.join("records.db")).await
    }

    /// Open (or create) a record database at an explicit path.
    pub async fn open_at(path: &Path) -> Result<Self> {
        let uri = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect(&uri)
            .await?;
        let store = SqliteRecordStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                source_url TEXT NOT NULL,
                title TEXT NOT NULL,
                state TEXT NOT NULL,
                bytes_transferred INTEGER NOT NULL,
                attempts INTEGER NOT NULL,
                created_at INTEGER NOT NULL,
                finished_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn append_record(&self, record: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO records (
                job_id, user_id, source_url, title, state,
                bytes_transferred, attempts, created_at, finished_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(record.job_id)
        .bind(record.user_id)
        .bind(&record.source_url)
        .bind(&record.title)
        .bind(&record.state)
        .bind(record.bytes_transferred)
        .bind(record.attempts)
        .bind(record.created_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count_by_user(&self, user: UserId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM records WHERE user_id = ?1")
            .bind(user)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    async fn recent_for_user(&self, user: UserId, limit: i64) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT job_id, user_id, source_url, title, state,
                   bytes_transferred, attempts, created_at, finished_at
            FROM records
            WHERE user_id = ?1
            ORDER BY finished_at DESC, id DESC
            LIMIT ?2
            "#,
        )
        .bind(user)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(JobRecord {
                job_id: row.get("job_id"),
                user_id: row.get("user_id"),
                source_url: row.get("source_url"),
                title: row.get("title"),
                state: row.get("state"),
                bytes_transferred: row.get("bytes_transferred"),
                attempts: row.get("attempts"),
                created_at: row.get("created_at"),
                finished_at: row.get("finished_at"),
            });
        }
        Ok(out)
    }
}

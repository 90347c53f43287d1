mod migrations;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::SyncError;
use crate::sync::CursorStore;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database, running migrations if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or migrations fail.
    pub async fn new(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(10));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| {
                format!("Failed to open SQLite database at {}", path.display())
            })?;

        let db = Self { pool };
        migrations::run(&db.pool).await?;
        info!(path = %path.display(), "Cursor database ready");

        Ok(db)
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Get the saved watermark for an application id.
///
/// # Errors
///
/// Returns an error if the query fails or the stored value is not a valid
/// RFC 3339 timestamp.
pub async fn get_cursor(pool: &SqlitePool, app_id: &str) -> Result<Option<DateTime<Utc>>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT last_run_at FROM sync_cursor WHERE app_id = ?")
            .bind(app_id)
            .fetch_optional(pool)
            .await
            .context("Failed to read sync cursor")?;

    row.map(|(value,)| {
        DateTime::parse_from_rfc3339(&value)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("Stored cursor {value:?} is not a valid timestamp"))
    })
    .transpose()
}

/// Replace the saved watermark for an application id.
///
/// # Errors
///
/// Returns an error if the write fails.
pub async fn set_cursor(pool: &SqlitePool, app_id: &str, last_run_at: DateTime<Utc>) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO sync_cursor (app_id, last_run_at, updated_at)
        VALUES (?, ?, datetime('now'))
        ON CONFLICT(app_id) DO UPDATE SET
            last_run_at = excluded.last_run_at,
            updated_at = excluded.updated_at
        ",
    )
    .bind(app_id)
    .bind(last_run_at.to_rfc3339())
    .execute(pool)
    .await
    .context("Failed to write sync cursor")?;

    Ok(())
}

/// [`CursorStore`] backed by the SQLite database, one row per application id.
#[derive(Debug, Clone)]
pub struct SqliteCursorStore {
    db: Database,
    app_id: String,
}

impl SqliteCursorStore {
    #[must_use]
    pub fn new(db: Database, app_id: impl Into<String>) -> Self {
        Self {
            db,
            app_id: app_id.into(),
        }
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn load(&self) -> Result<Option<DateTime<Utc>>, SyncError> {
        get_cursor(self.db.pool(), &self.app_id)
            .await
            .map_err(|e| SyncError::Store(format!("{e:#}")))
    }

    async fn save(&self, last_run_at: DateTime<Utc>) -> Result<(), SyncError> {
        set_cursor(self.db.pool(), &self.app_id, last_run_at)
            .await
            .map_err(|e| SyncError::Store(format!("{e:#}")))?;
        debug!(app_id = %self.app_id, %last_run_at, "Cursor saved");
        Ok(())
    }
}

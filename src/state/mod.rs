mod poll;
mod score;
mod vote;

use chrono::Duration;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::str::FromStr;

/// Tables are created on startup when missing. `poll_state` holds a single row.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS poll_state (
        id INTEGER PRIMARY KEY,
        is_open BOOLEAN NOT NULL,
        start_time TEXT
    )",
    "CREATE TABLE IF NOT EXISTS votes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        voter_id TEXT NOT NULL,
        poll_start_time TEXT NOT NULL,
        jersey_number INTEGER NOT NULL,
        points INTEGER NOT NULL CHECK (points BETWEEN 1 AND 3),
        UNIQUE (voter_id, poll_start_time, jersey_number)
    )",
    "CREATE TABLE IF NOT EXISTS poll_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        closed_at TEXT NOT NULL,
        voter_id TEXT NOT NULL,
        jersey_number INTEGER NOT NULL,
        points INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS poll_history_closed_at ON poll_history (closed_at)",
];

/// Shared application state
///
/// The pool is opened once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// How long an opened poll accepts votes
    pub poll_window: Duration,
}

impl AppState {
    /// Open (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str, poll_window: Duration) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::with_pool(db, poll_window).await
    }

    /// Private in-memory database, gone once the state is dropped.
    pub async fn in_memory(poll_window: Duration) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is its own database, so keep exactly one alive
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::with_pool(db, poll_window).await
    }

    async fn with_pool(db: SqlitePool, poll_window: Duration) -> Result<Self, sqlx::Error> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&db).await?;
        }

        sqlx::query("INSERT OR IGNORE INTO poll_state (id, is_open, start_time) VALUES (?, 0, NULL)")
            .bind(crate::types::POLL_STATE_ID)
            .execute(&db)
            .await?;

        tracing::debug!("Database schema ready");

        Ok(Self { db, poll_window })
    }

    /// Begin a transaction that already holds the database write lock.
    ///
    /// The first statement is a write, so SQLite takes the lock before any
    /// read and waits out `busy_timeout` instead of failing with
    /// `SQLITE_BUSY` when another connection commits in between.
    pub(crate) async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE poll_state SET is_open = is_open WHERE id = ?")
            .bind(crate::types::POLL_STATE_ID)
            .execute(&mut *tx)
            .await?;

        Ok(tx)
    }

    /// Close the pool, waiting for in-flight queries
    pub async fn close(&self) {
        self.db.close().await;
        tracing::info!("Database connection closed");
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    AppState::in_memory(Duration::hours(crate::types::DEFAULT_POLL_WINDOW_HOURS))
        .await
        .expect("in-memory database")
}

//! Repository layer for SQLite persistence.
//!
//! Repositories open a connection per call and initialize their own
//! schema on construction. The database is required: if it cannot be
//! opened or written, operations fail with `RepoError::Storage` rather
//! than degrading to empty results.

mod offer;
mod search;

pub use offer::{OfferFilter, OfferPage, OfferRepository, UserStats};
pub use search::SearchRepository;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use thiserror::Error;

/// Errors surfaced by the repository layer.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, RepoError>;

/// Open a connection to the shared database file.
///
/// WAL mode plus a busy timeout lets concurrent scrape runs write
/// without stepping on each other; row-level dedup itself is enforced
/// by unique indexes, not by callers.
pub(crate) fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_secs(5))?;
    let _: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    Ok(conn)
}

/// Create every table and index. Both repositories run this on
/// construction so either can be opened first against a fresh database;
/// the cascading search delete touches `job_offers` and must not depend
/// on which repository initialized the file.
pub(crate) fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS job_searches (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            keywords TEXT NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            last_run_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_job_searches_user
            ON job_searches (user_id);

        CREATE TABLE IF NOT EXISTS job_offers (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL,
            title TEXT NOT NULL,
            company TEXT NOT NULL,
            location TEXT NOT NULL,
            url TEXT NOT NULL,
            job_search_id TEXT NOT NULL REFERENCES job_searches (id),
            status TEXT NOT NULL,
            discovered_at TEXT NOT NULL,
            last_seen_at TEXT NOT NULL,
            UNIQUE (job_search_id, external_id)
        );
        CREATE INDEX IF NOT EXISTS idx_job_offers_last_seen
            ON job_offers (last_seen_at);
        CREATE INDEX IF NOT EXISTS idx_job_offers_status
            ON job_offers (job_search_id, status);
    "#,
    )?;
    Ok(())
}

/// Map `QueryReturnedNoRows` to `None`.
pub(crate) fn to_option<T>(result: rusqlite::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Parse an optional datetime string from the database.
pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

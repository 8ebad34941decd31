//! SQLite-backed repository for saved searches.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::{parse_datetime, parse_datetime_opt, to_option, RepoError, Result};
use crate::models::JobSearch;

/// Repository for `JobSearch` rows.
pub struct SearchRepository {
    db_path: PathBuf,
}

impl SearchRepository {
    /// Create a new search repository, initializing its schema.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        super::ensure_schema(&conn)
    }

    fn row_to_search(row: &Row) -> rusqlite::Result<JobSearch> {
        Ok(JobSearch {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            keywords: row.get("keywords")?,
            active: row.get::<_, i64>("active")? != 0,
            created_at: parse_datetime(&row.get::<_, String>("created_at")?),
            updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
            last_run_at: parse_datetime_opt(row.get::<_, Option<String>>("last_run_at")?),
        })
    }

    /// Create a new search. Keywords must be non-empty after trimming.
    pub fn create(&self, user_id: &str, keywords: &str) -> Result<JobSearch> {
        let keywords = keywords.trim();
        if keywords.is_empty() {
            return Err(RepoError::InvalidArgument(
                "search keywords must not be empty".to_string(),
            ));
        }
        if user_id.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "user_id must not be empty".to_string(),
            ));
        }

        let search = JobSearch::new(user_id.to_string(), keywords.to_string());
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO job_searches (id, user_id, keywords, active, created_at, updated_at, last_run_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                search.id,
                search.user_id,
                search.keywords,
                search.active as i64,
                search.created_at.to_rfc3339(),
                search.updated_at.to_rfc3339(),
                search.last_run_at.map(|dt| dt.to_rfc3339()),
            ],
        )?;
        Ok(search)
    }

    /// Get a search by ID.
    pub fn get(&self, id: &str) -> Result<Option<JobSearch>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM job_searches WHERE id = ?")?;
        to_option(stmt.query_row(params![id], Self::row_to_search))
    }

    /// Get all searches belonging to a user, newest first.
    pub fn get_for_user(&self, user_id: &str) -> Result<Vec<JobSearch>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM job_searches WHERE user_id = ? ORDER BY created_at DESC",
        )?;
        let searches = stmt
            .query_map(params![user_id], Self::row_to_search)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(searches)
    }

    /// Get every active search, across all users. Used by scheduled runs.
    pub fn get_active(&self) -> Result<Vec<JobSearch>> {
        let conn = self.connect()?;
        let mut stmt =
            conn.prepare("SELECT * FROM job_searches WHERE active = 1 ORDER BY created_at")?;
        let searches = stmt
            .query_map([], Self::row_to_search)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(searches)
    }

    /// Flip the activity flag. Does not trigger a scrape.
    pub fn toggle_active(&self, id: &str) -> Result<JobSearch> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE job_searches SET active = 1 - active, updated_at = ? WHERE id = ?",
            params![Utc::now().to_rfc3339(), id],
        )?;
        if updated == 0 {
            return Err(RepoError::NotFound(format!("search {}", id)));
        }
        self.get(id)?
            .ok_or_else(|| RepoError::NotFound(format!("search {}", id)))
    }

    /// Record that a scrape run concluded for this search.
    pub fn update_last_run(&self, id: &str, timestamp: DateTime<Utc>) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE job_searches SET last_run_at = ?, updated_at = ? WHERE id = ?",
            params![timestamp.to_rfc3339(), Utc::now().to_rfc3339(), id],
        )?;
        Ok(())
    }

    /// Total number of searches across all users.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM job_searches", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete a search and every offer under it, in one transaction.
    ///
    /// Offers are hard-deleted; they are re-discoverable by re-running
    /// an equivalent search, so no tombstones are kept.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM job_offers WHERE job_search_id = ?",
            params![id],
        )?;
        let rows = tx.execute("DELETE FROM job_searches WHERE id = ?", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }
}

//! SQLite-backed repository for discovered offers.
//!
//! Dedup is enforced here, at the storage layer: the unique index on
//! `(job_search_id, external_id)` makes `upsert_seen` safe to repeat
//! and safe under overlapping runs for the same search.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::types::ToSql;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::Serialize;

use super::{parse_datetime, to_option, RepoError, Result};
use crate::models::{JobOffer, OfferStatus};

/// Hard cap on page size regardless of what the caller asks for.
pub const MAX_PER_PAGE: u32 = 50;

/// Filters for listing offers. `user_id` scopes everything: a user only
/// ever sees offers under their own searches.
#[derive(Debug, Clone, Default)]
pub struct OfferFilter {
    pub user_id: String,
    pub status: Option<OfferStatus>,
    pub job_search_id: Option<String>,
    /// Case-insensitive match against title, company and location.
    pub text: Option<String>,
}

/// One page of offers plus totals.
#[derive(Debug, Clone, Serialize)]
pub struct OfferPage {
    pub items: Vec<JobOffer>,
    pub total: u64,
    pub total_pages: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Aggregate counts for one user's searches and offers.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_searches: u64,
    pub active_searches: u64,
    pub total_offers: u64,
    /// Offers first discovered within the current UTC calendar day.
    pub today_offers: u64,
    /// Counts per status. Always contains all four statuses; the values
    /// sum to `total_offers`.
    pub offers_by_status: HashMap<String, u64>,
}

/// Repository for `JobOffer` rows.
pub struct OfferRepository {
    db_path: PathBuf,
}

impl OfferRepository {
    /// Create a new offer repository, initializing its schema.
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

    fn row_to_offer(row: &Row) -> rusqlite::Result<JobOffer> {
        Ok(JobOffer {
            id: row.get("id")?,
            external_id: row.get("external_id")?,
            title: row.get("title")?,
            company: row.get("company")?,
            location: row.get("location")?,
            url: row.get("url")?,
            job_search_id: row.get("job_search_id")?,
            status: OfferStatus::from_str(&row.get::<_, String>("status")?)
                .unwrap_or(OfferStatus::Active),
            discovered_at: parse_datetime(&row.get::<_, String>("discovered_at")?),
            last_seen_at: parse_datetime(&row.get::<_, String>("last_seen_at")?),
        })
    }

    /// Record a sighting of an offer. Returns true if the offer was
    /// unseen and inserted, false if only `last_seen_at` was refreshed.
    ///
    /// Insert and refresh run inside one transaction keyed on the unique
    /// `(job_search_id, external_id)` index, so two overlapping runs for
    /// the same search cannot duplicate a row. The stored status is
    /// never touched for a known offer.
    pub fn upsert_seen(&self, offer: &JobOffer) -> Result<bool> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            r#"
            INSERT OR IGNORE INTO job_offers
                (id, external_id, title, company, location, url,
                 job_search_id, status, discovered_at, last_seen_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                offer.id,
                offer.external_id,
                offer.title,
                offer.company,
                offer.location,
                offer.url,
                offer.job_search_id,
                offer.status.as_str(),
                offer.discovered_at.to_rfc3339(),
                offer.last_seen_at.to_rfc3339(),
            ],
        )? > 0;

        if !inserted {
            tx.execute(
                "UPDATE job_offers SET last_seen_at = ?1
                 WHERE job_search_id = ?2 AND external_id = ?3",
                params![
                    offer.last_seen_at.to_rfc3339(),
                    offer.job_search_id,
                    offer.external_id
                ],
            )?;
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Get an offer by ID.
    pub fn get(&self, id: &str) -> Result<Option<JobOffer>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare("SELECT * FROM job_offers WHERE id = ?")?;
        to_option(stmt.query_row(params![id], Self::row_to_offer))
    }

    /// Overwrite the triage status of an offer. Last writer wins.
    ///
    /// This is the only path that changes `status` after creation; the
    /// scraper never goes through here.
    pub fn set_status(&self, id: &str, status: OfferStatus) -> Result<JobOffer> {
        let conn = self.connect()?;
        let updated = conn.execute(
            "UPDATE job_offers SET status = ? WHERE id = ?",
            params![status.as_str(), id],
        )?;
        if updated == 0 {
            return Err(RepoError::NotFound(format!("offer {}", id)));
        }
        self.get(id)?
            .ok_or_else(|| RepoError::NotFound(format!("offer {}", id)))
    }

    /// List offers matching a filter, most recently seen first.
    pub fn list(&self, filter: &OfferFilter, page: u32, per_page: u32) -> Result<OfferPage> {
        if filter.user_id.trim().is_empty() {
            return Err(RepoError::InvalidArgument(
                "user_id is required".to_string(),
            ));
        }

        let page = page.max(1);
        let per_page = per_page.clamp(1, MAX_PER_PAGE);

        let mut clauses = vec!["s.user_id = ?".to_string()];
        let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(filter.user_id.clone())];

        if let Some(status) = filter.status {
            clauses.push("o.status = ?".to_string());
            args.push(Box::new(status.as_str().to_string()));
        }
        if let Some(search_id) = &filter.job_search_id {
            clauses.push("o.job_search_id = ?".to_string());
            args.push(Box::new(search_id.clone()));
        }
        if let Some(text) = &filter.text {
            let text = text.trim();
            if !text.is_empty() {
                clauses.push(
                    "(o.title LIKE ? COLLATE NOCASE \
                      OR o.company LIKE ? COLLATE NOCASE \
                      OR o.location LIKE ? COLLATE NOCASE)"
                        .to_string(),
                );
                let pattern = format!("%{}%", text);
                args.push(Box::new(pattern.clone()));
                args.push(Box::new(pattern.clone()));
                args.push(Box::new(pattern));
            }
        }

        let where_sql = clauses.join(" AND ");
        let conn = self.connect()?;

        let total: u64 = conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM job_offers o
                 JOIN job_searches s ON o.job_search_id = s.id
                 WHERE {}",
                where_sql
            ),
            params_from_iter(args.iter().map(|a| a.as_ref())),
            |row| row.get::<_, i64>(0).map(|n| n as u64),
        )?;

        let offset = (page as u64 - 1) * per_page as u64;
        let mut stmt = conn.prepare(&format!(
            "SELECT o.* FROM job_offers o
             JOIN job_searches s ON o.job_search_id = s.id
             WHERE {}
             ORDER BY o.last_seen_at DESC, o.id
             LIMIT {} OFFSET {}",
            where_sql, per_page, offset
        ))?;
        let items = stmt
            .query_map(
                params_from_iter(args.iter().map(|a| a.as_ref())),
                Self::row_to_offer,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(OfferPage {
            items,
            total,
            total_pages: total.div_ceil(per_page as u64),
            page,
            per_page,
        })
    }

    /// Aggregate counts scoped to one user's searches.
    ///
    /// `today_offers` uses the UTC calendar day: an offer discovered at
    /// 23:59:59Z yesterday does not count, one at 00:00:00Z today does.
    pub fn stats(&self, user_id: &str) -> Result<UserStats> {
        let conn = self.connect()?;

        let total_searches: u64 = conn.query_row(
            "SELECT COUNT(*) FROM job_searches WHERE user_id = ?",
            params![user_id],
            |row| row.get::<_, i64>(0).map(|n| n as u64),
        )?;
        let active_searches: u64 = conn.query_row(
            "SELECT COUNT(*) FROM job_searches WHERE user_id = ? AND active = 1",
            params![user_id],
            |row| row.get::<_, i64>(0).map(|n| n as u64),
        )?;

        let mut offers_by_status: HashMap<String, u64> = OfferStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        let mut total_offers = 0u64;
        {
            let mut stmt = conn.prepare(
                "SELECT o.status, COUNT(*) FROM job_offers o
                 JOIN job_searches s ON o.job_search_id = s.id
                 WHERE s.user_id = ?
                 GROUP BY o.status",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?;
            for row in rows {
                let (status, count) = row?;
                total_offers += count;
                *offers_by_status.entry(status).or_insert(0) += count;
            }
        }

        // Midnight UTC in the same RFC 3339 shape the rows are stored
        // in, so the comparison stays lexicographic-safe.
        let today_start = Utc::now()
            .date_naive()
            .and_time(chrono::NaiveTime::MIN)
            .and_utc();
        let today_offers: u64 = conn.query_row(
            "SELECT COUNT(*) FROM job_offers o
             JOIN job_searches s ON o.job_search_id = s.id
             WHERE s.user_id = ? AND o.discovered_at >= ?",
            params![user_id, today_start.to_rfc3339()],
            |row| row.get::<_, i64>(0).map(|n| n as u64),
        )?;

        Ok(UserStats {
            total_searches,
            active_searches,
            total_offers,
            today_offers,
            offers_by_status,
        })
    }

    /// Total number of offers across all searches.
    pub fn count(&self) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM job_offers", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Delete an offer by ID.
    pub fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let rows = conn.execute("DELETE FROM job_offers WHERE id = ?", params![id])?;
        Ok(rows > 0)
    }
}

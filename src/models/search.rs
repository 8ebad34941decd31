//! Saved keyword searches that drive scrape runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A saved keyword query a user wants kept up to date.
///
/// Searches own their discovered offers; deleting a search removes
/// its offers in the same transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSearch {
    /// Unique identifier, immutable once created.
    pub id: String,
    /// Owning user.
    pub user_id: String,
    /// Keyword query sent to the listing site. Never empty.
    pub keywords: String,
    /// Whether scheduled runs include this search.
    pub active: bool,
    /// When the search was created.
    pub created_at: DateTime<Utc>,
    /// When the search was last modified.
    pub updated_at: DateTime<Utc>,
    /// When a scrape run last completed for this search.
    pub last_run_at: Option<DateTime<Utc>>,
}

impl JobSearch {
    /// Create a new active search for a user.
    pub fn new(user_id: String, keywords: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id,
            keywords,
            active: true,
            created_at: now,
            updated_at: now,
            last_run_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_search_is_active() {
        let search = JobSearch::new("david".to_string(), "react developer".to_string());
        assert!(search.active);
        assert!(search.last_run_at.is_none());
        assert_eq!(search.created_at, search.updated_at);
    }

    #[test]
    fn test_new_searches_get_distinct_ids() {
        let a = JobSearch::new("david".to_string(), "rust".to_string());
        let b = JobSearch::new("david".to_string(), "rust".to_string());
        assert_ne!(a.id, b.id);
    }
}

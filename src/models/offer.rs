//! Discovered job offers and their triage status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Triage status of an offer.
///
/// `Active` is the only value the scraper ever assigns. The other three
/// are set by a human through the triage paths and survive later scrape
/// runs untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Active,
    Discarded,
    InterestedDavid,
    InterestedIvan,
}

impl OfferStatus {
    /// All statuses, in display order.
    pub const ALL: [OfferStatus; 4] = [
        Self::Active,
        Self::Discarded,
        Self::InterestedDavid,
        Self::InterestedIvan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Discarded => "discarded",
            Self::InterestedDavid => "interested_david",
            Self::InterestedIvan => "interested_ivan",
        }
    }

    /// Parse a status name. Case-insensitive so API callers may send
    /// either `interested_david` or `INTERESTED_DAVID`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Some(Self::Active),
            "discarded" => Some(Self::Discarded),
            "interested_david" => Some(Self::InterestedDavid),
            "interested_ivan" => Some(Self::InterestedIvan),
            _ => None,
        }
    }
}

/// One discovered posting under a search.
///
/// The pair `(job_search_id, external_id)` is unique: a posting that
/// reappears in a later run refreshes `last_seen_at` instead of
/// creating a second row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOffer {
    /// Internally generated identifier.
    pub id: String,
    /// Site-assigned identifier, stable across runs.
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Detail page URL on the listing site.
    pub url: String,
    /// Owning search.
    pub job_search_id: String,
    pub status: OfferStatus,
    /// First sighting.
    pub discovered_at: DateTime<Utc>,
    /// Most recent sighting.
    pub last_seen_at: DateTime<Utc>,
}

impl JobOffer {
    /// Create a freshly discovered offer with status `Active`.
    pub fn new(
        job_search_id: String,
        external_id: String,
        title: String,
        company: String,
        location: String,
        url: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            external_id,
            title,
            company,
            location,
            url,
            job_search_id,
            status: OfferStatus::Active,
            discovered_at: now,
            last_seen_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in OfferStatus::ALL {
            assert_eq!(OfferStatus::from_str(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            OfferStatus::from_str("INTERESTED_DAVID"),
            Some(OfferStatus::InterestedDavid)
        );
        assert_eq!(OfferStatus::from_str("Active"), Some(OfferStatus::Active));
    }

    #[test]
    fn test_status_rejects_unknown_values() {
        assert_eq!(OfferStatus::from_str("archived"), None);
        assert_eq!(OfferStatus::from_str(""), None);
    }

    #[test]
    fn test_new_offer_is_active() {
        let offer = JobOffer::new(
            "search-1".to_string(),
            "9912".to_string(),
            "React Developer".to_string(),
            "Acme".to_string(),
            "Madrid".to_string(),
            "https://jobs.example.com/job-offer/9912".to_string(),
        );
        assert_eq!(offer.status, OfferStatus::Active);
        assert_eq!(offer.discovered_at, offer.last_seen_at);
    }
}

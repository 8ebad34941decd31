//! Scraping layer: HTTP fetch with anti-blocking measures, and the
//! listing-page parser for the target job board.

mod http_client;
mod listing;

pub use http_client::{FetchClient, FetchError, BROWSER_IDENTITIES};
pub use listing::{
    extract_external_id, is_offer_link, parse_listing, resolve_url, search_url, ParseError,
};

use async_trait::async_trait;

/// One posting as extracted from a listing page, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingCandidate {
    /// Site-assigned identifier, derived from the detail URL or a data
    /// attribute. Never positional.
    pub external_id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    /// Detail URL as found in the page; may be relative.
    pub url: String,
}

/// Seam between the orchestrator and the network.
///
/// `FetchClient` is the production implementation; tests drive the
/// orchestrator with canned pages behind this trait.
#[async_trait]
pub trait ListingFetcher: Send + Sync {
    /// Fetch one listing page, applying the anti-blocking policy.
    async fn fetch_listing(&self, url: &str) -> Result<String, FetchError>;
}

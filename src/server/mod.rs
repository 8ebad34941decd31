//! JSON API for triggering scrapes and triaging offers.
//!
//! This is the surface the dashboard collaborator consumes; the
//! dashboard itself (UI, auth, uploads) lives elsewhere. Everything
//! here is a thin layer over the repositories and the scrape service.

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Settings;
use crate::repository::{OfferRepository, SearchRepository};
use crate::scrapers::FetchClient;
use crate::services::{ScrapeLimits, ScrapeService};

/// Shared state for the API server.
#[derive(Clone)]
pub struct AppState {
    pub searches: Arc<SearchRepository>,
    pub offers: Arc<OfferRepository>,
    pub scraper: ScrapeService,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let searches = Arc::new(SearchRepository::new(&settings.database_path)?);
        let offers = Arc::new(OfferRepository::new(&settings.database_path)?);

        let fetcher = Arc::new(FetchClient::new(
            Duration::from_secs(settings.scrape.timeout_secs),
            (settings.scrape.delay_ms_min, settings.scrape.delay_ms_max),
            settings.scrape.max_attempts,
            settings.scrape.expected_markers.clone(),
        ));
        let scraper = ScrapeService::new(
            searches.clone(),
            offers.clone(),
            fetcher,
            settings.base_url.clone(),
            ScrapeLimits {
                max_pages: settings.scrape.max_pages,
                max_run_duration: Duration::from_secs(settings.scrape.max_run_secs),
                parse_retries: settings.scrape.parse_retries,
            },
            settings.scrape.max_concurrent_runs,
        );

        Ok(Self {
            searches,
            offers,
            scraper,
        })
    }
}

/// Start the API server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings)?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

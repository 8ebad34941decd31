//! Scrape orchestration: fetch -> parse -> persist, page by page.
//!
//! One run covers one search from page 1 until pagination exhausts or a
//! guard trips. Pages are strictly ordered: page n+1 is not fetched
//! until page n's candidates are persisted, so an aborted run never
//! leaves holes. Runs for the same search never overlap; runs for
//! different searches share a process-wide concurrency cap.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::models::{JobOffer, JobSearch, RunErrorKind, RunReport};
use crate::repository::{OfferRepository, RepoError, SearchRepository};
use crate::scrapers::{
    parse_listing, resolve_url, search_url, FetchError, ListingFetcher,
};

/// Guards against a run that never terminates on its own.
#[derive(Debug, Clone, Copy)]
pub struct ScrapeLimits {
    /// Hard page cap per run; protects against a site structure change
    /// that makes pagination look infinite.
    pub max_pages: u32,
    /// Wall-clock budget per run.
    pub max_run_duration: Duration,
    /// Re-fetches granted when a fetched page fails to parse.
    pub parse_retries: u32,
}

impl Default for ScrapeLimits {
    fn default() -> Self {
        Self {
            max_pages: 20,
            max_run_duration: Duration::from_secs(300),
            parse_retries: 2,
        }
    }
}

/// Failures that abort a run before it can produce a report.
///
/// Fetch and parse trouble never lands here: those are recovered up to
/// their budgets and then recorded inside the report. Only a missing
/// search, an overlapping trigger, or the storage layer failing aborts
/// the run outright.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("search not found: {0}")]
    SearchNotFound(String),
    #[error("a run is already in flight for search {0}")]
    AlreadyRunning(String),
    #[error(transparent)]
    Storage(#[from] RepoError),
}

/// Drives scrape runs against the repositories.
#[derive(Clone)]
pub struct ScrapeService {
    searches: Arc<SearchRepository>,
    offers: Arc<OfferRepository>,
    fetcher: Arc<dyn ListingFetcher>,
    base_url: String,
    limits: ScrapeLimits,
    /// Process-wide cap on concurrent runs, initialized once.
    permits: Arc<Semaphore>,
    /// Searches with a run currently in flight (single-flight).
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ScrapeService {
    pub fn new(
        searches: Arc<SearchRepository>,
        offers: Arc<OfferRepository>,
        fetcher: Arc<dyn ListingFetcher>,
        base_url: String,
        limits: ScrapeLimits,
        max_concurrent_runs: usize,
    ) -> Self {
        Self {
            searches,
            offers,
            fetcher,
            base_url,
            limits,
            permits: Arc::new(Semaphore::new(max_concurrent_runs.max(1))),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Run a scrape for one search.
    ///
    /// Always returns a structured report for a run that started, even
    /// when it failed partway; partial results stay persisted because
    /// `upsert_seen` is idempotent.
    pub async fn run_search(&self, search_id: &str) -> Result<RunReport, ScrapeError> {
        let search = self
            .searches
            .get(search_id)?
            .ok_or_else(|| ScrapeError::SearchNotFound(search_id.to_string()))?;

        let _flight = FlightGuard::acquire(&self.in_flight, search_id)
            .ok_or_else(|| ScrapeError::AlreadyRunning(search_id.to_string()))?;
        let _permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .expect("run concurrency limiter lives for the process lifetime");

        info!(search_id, keywords = %search.keywords, "starting scrape run");
        let started = Instant::now();
        let mut report = RunReport::new(search_id);

        for page in 1..=self.limits.max_pages {
            if started.elapsed() >= self.limits.max_run_duration {
                info!(search_id, page, "run duration budget reached, stopping");
                break;
            }

            match self.scrape_page(&search, page, &mut report).await? {
                PageOutcome::Continue => {}
                PageOutcome::Exhausted => {
                    debug!(search_id, page, "no candidates, pagination complete");
                    break;
                }
                PageOutcome::Abort => {
                    report.fail();
                    break;
                }
            }
        }

        self.searches.update_last_run(&search.id, Utc::now())?;
        report.finish();
        info!(
            search_id,
            outcome = ?report.outcome,
            new_offers = report.new_offers,
            total_processed = report.total_processed,
            "scrape run concluded"
        );
        Ok(report)
    }

    /// Run every active search, concurrently up to the global cap.
    pub async fn run_all_active(&self) -> Result<Vec<(JobSearch, Result<RunReport, ScrapeError>)>, RepoError> {
        let searches = self.searches.get_active()?;
        let runs = searches.iter().map(|search| {
            let service = self.clone();
            let id = search.id.clone();
            async move { service.run_search(&id).await }
        });
        let results = futures::future::join_all(runs).await;
        Ok(searches.into_iter().zip(results).collect())
    }

    /// Fetch, parse and persist one page.
    async fn scrape_page(
        &self,
        search: &JobSearch,
        page: u32,
        report: &mut RunReport,
    ) -> Result<PageOutcome, ScrapeError> {
        let url = search_url(&self.base_url, &search.keywords, page);

        // The fetcher retries and rotates identities internally; once
        // it gives up the run is over.
        let mut html = match self.fetcher.fetch_listing(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(page, error = %e, "fetch budget exhausted");
                report.record_error(page, fetch_error_kind(&e), e.to_string());
                return Ok(PageOutcome::Abort);
            }
        };
        report.pages_fetched += 1;

        // A page that fetched fine but does not parse gets a bounded
        // number of fresh fetches; layout drift and half-rendered
        // responses look identical from here.
        let mut parse_attempt = 0;
        let candidates = loop {
            match parse_listing(&html) {
                Ok(candidates) => break candidates,
                Err(e) if parse_attempt < self.limits.parse_retries => {
                    parse_attempt += 1;
                    warn!(page, parse_attempt, error = %e, "parse failed, refetching page");
                    match self.fetcher.fetch_listing(&url).await {
                        Ok(fresh) => html = fresh,
                        Err(fetch_err) => {
                            report.record_error(
                                page,
                                fetch_error_kind(&fetch_err),
                                fetch_err.to_string(),
                            );
                            return Ok(PageOutcome::Abort);
                        }
                    }
                }
                Err(e) => {
                    report.record_error(page, RunErrorKind::Parse, e.to_string());
                    return Ok(PageOutcome::Abort);
                }
            }
        };

        if candidates.is_empty() {
            // First page: legitimate "no results". Later page:
            // pagination exhausted. Both end the run as Done.
            return Ok(PageOutcome::Exhausted);
        }

        for candidate in candidates {
            let offer = JobOffer::new(
                search.id.clone(),
                candidate.external_id,
                candidate.title,
                candidate.company,
                candidate.location,
                resolve_url(&self.base_url, &candidate.url),
            );
            // Storage failure is not recovered: surface it verbatim.
            // Everything persisted so far stays.
            if self.offers.upsert_seen(&offer)? {
                report.new_offers += 1;
            }
            report.total_processed += 1;
        }

        Ok(PageOutcome::Continue)
    }
}

enum PageOutcome {
    Continue,
    Exhausted,
    Abort,
}

fn fetch_error_kind(error: &FetchError) -> RunErrorKind {
    match error.root() {
        FetchError::SoftBlock => RunErrorKind::SoftBlock,
        FetchError::Status { .. } => RunErrorKind::HttpStatus,
        _ => RunErrorKind::Transport,
    }
}

/// Membership in the in-flight set for the lifetime of a run.
struct FlightGuard {
    registry: Arc<Mutex<HashSet<String>>>,
    search_id: String,
}

impl FlightGuard {
    fn acquire(registry: &Arc<Mutex<HashSet<String>>>, search_id: &str) -> Option<Self> {
        let mut in_flight = registry.lock().expect("in-flight registry poisoned");
        if !in_flight.insert(search_id.to_string()) {
            return None;
        }
        Some(Self {
            registry: registry.clone(),
            search_id: search_id.to_string(),
        })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.registry.lock() {
            in_flight.remove(&self.search_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_guard_is_single_flight() {
        let registry = Arc::new(Mutex::new(HashSet::new()));
        let first = FlightGuard::acquire(&registry, "s1");
        assert!(first.is_some());
        assert!(FlightGuard::acquire(&registry, "s1").is_none());
        // A different search is unaffected.
        assert!(FlightGuard::acquire(&registry, "s2").is_some());

        drop(first);
        assert!(FlightGuard::acquire(&registry, "s1").is_some());
    }

    #[test]
    fn test_fetch_error_kind_unwraps_exhaustion() {
        let exhausted = FetchError::RetriesExhausted {
            attempts: 4,
            last: Box::new(FetchError::SoftBlock),
        };
        assert_eq!(fetch_error_kind(&exhausted), RunErrorKind::SoftBlock);
        assert_eq!(
            fetch_error_kind(&FetchError::Status { code: 500 }),
            RunErrorKind::HttpStatus
        );
    }
}

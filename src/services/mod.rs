//! Services driving the scrape pipeline.

mod scrape;

pub use scrape::{ScrapeError, ScrapeLimits, ScrapeService};

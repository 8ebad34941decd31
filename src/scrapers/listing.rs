//! Listing-page parser for the target job board.
//!
//! Pure functions over HTML: no I/O, deterministic for identical input,
//! which is what keeps them testable against saved fixtures. The board
//! has one shape: a `#search-results` container of `article.offer-item`
//! rows, each carrying a detail link under `/job-offer/<id>/...` and a
//! `data-offer-id` attribute.

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use super::ListingCandidate;

/// Parse failures. Zero results is not an error; only a page whose
/// structure is unrecognized (layout change, interstitial) gets here.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("unrecognized listing page structure")]
    Unrecognized,
}

fn offer_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/job-offer/(\d+)(?:[/?-]|$)").unwrap())
}

/// Whether an anchor href points at a real offer detail page.
///
/// The board decorates result rows with promotional anchors ("work at
/// Acme", company profiles) that look like listings; only the
/// `/job-offer/<id>` pattern is accepted.
pub fn is_offer_link(href: &str) -> bool {
    offer_id_pattern().is_match(href)
}

/// Derive the site-assigned offer identifier from a detail URL.
///
/// Deterministic in the URL alone; row position is never used because
/// positions shift between pages and reloads.
pub fn extract_external_id(href: &str) -> Option<String> {
    offer_id_pattern()
        .captures(href)
        .map(|caps| caps[1].to_string())
}

/// Build the result-list URL for a keyword query and 1-based page.
pub fn search_url(base_url: &str, keywords: &str, page: u32) -> String {
    format!(
        "{}/search?q={}&page={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(keywords),
        page
    )
}

/// Resolve a detail path to a full URL, handling both absolute and relative paths.
pub fn resolve_url(base_url: &str, path: &str) -> String {
    match url::Url::parse(base_url).and_then(|base| base.join(path)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => format!("{}{}", base_url.trim_end_matches('/'), path),
    }
}

fn collapse_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn select_text(element: ElementRef, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|n| collapse_ws(&n.text().collect::<String>()))
        .unwrap_or_default()
}

/// Parse one listing page into candidates.
///
/// Returns `Ok(vec![])` both for a recognized "no results" page and for
/// an exhausted pagination tail (container present, no rows); those end
/// pagination normally. Returns `Err` only when the page structure is
/// unrecognized, which the orchestrator treats as retryable.
pub fn parse_listing(html: &str) -> Result<Vec<ListingCandidate>, ParseError> {
    let container_sel = Selector::parse("#search-results").unwrap();
    let no_results_sel = Selector::parse(".no-results").unwrap();
    let item_sel = Selector::parse("article.offer-item").unwrap();
    let link_sel = Selector::parse("h2.offer-title a, a.offer-link").unwrap();
    let company_sel = Selector::parse(".company").unwrap();
    let location_sel = Selector::parse(".location").unwrap();

    let document = Html::parse_document(html);

    let Some(container) = document.select(&container_sel).next() else {
        return Err(ParseError::Unrecognized);
    };

    if container.select(&no_results_sel).next().is_some() {
        return Ok(Vec::new());
    }

    let mut candidates = Vec::new();
    for item in container.select(&item_sel) {
        let Some(link) = item.select(&link_sel).next() else {
            continue;
        };
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if !is_offer_link(href) {
            continue;
        }

        // Prefer the embedded attribute, fall back to the URL. A row
        // with no resolvable identifier is dropped, not emitted
        // malformed.
        let external_id = item
            .value()
            .attr("data-offer-id")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| extract_external_id(href));
        let Some(external_id) = external_id else {
            continue;
        };

        candidates.push(ListingCandidate {
            external_id,
            title: collapse_ws(&link.text().collect::<String>()),
            company: select_text(item, &company_sel),
            location: select_text(item, &location_sel),
            url: href.to_string(),
        });
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str) -> String {
        format!(
            r#"<html><body><div id="search-results">{}</div></body></html>"#,
            rows
        )
    }

    fn row(id: &str, title: &str, company: &str, location: &str) -> String {
        format!(
            r#"<article class="offer-item" data-offer-id="{id}">
                 <h2 class="offer-title"><a href="/job-offer/{id}/slug">{title}</a></h2>
                 <span class="company">{company}</span>
                 <span class="location">{location}</span>
               </article>"#
        )
    }

    #[test]
    fn test_parse_extracts_fields() {
        let html = page(&row("4411", "React  Developer", "Acme Corp", "Madrid"));
        let candidates = parse_listing(&html).unwrap();
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.external_id, "4411");
        assert_eq!(c.title, "React Developer");
        assert_eq!(c.company, "Acme Corp");
        assert_eq!(c.location, "Madrid");
        assert_eq!(c.url, "/job-offer/4411/slug");
    }

    #[test]
    fn test_parse_no_results_is_empty_not_error() {
        let html = page(r#"<p class="no-results">No offers matched your search.</p>"#);
        assert!(parse_listing(&html).unwrap().is_empty());
    }

    #[test]
    fn test_parse_empty_container_is_empty() {
        // Pagination tail: container exists but carries no rows.
        assert!(parse_listing(&page("")).unwrap().is_empty());
    }

    #[test]
    fn test_parse_unrecognized_structure_is_error() {
        let html = "<html><body><h1>Verifying your browser…</h1></body></html>";
        assert!(matches!(parse_listing(html), Err(ParseError::Unrecognized)));
    }

    #[test]
    fn test_promotional_anchors_are_filtered() {
        let promo = r#"<article class="offer-item">
             <h2 class="offer-title"><a href="/company/acme/careers">Work at Acme!</a></h2>
           </article>"#;
        let html = page(&format!("{}{}", promo, row("7", "Backend Dev", "Beta", "Remote")));
        let candidates = parse_listing(&html).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].external_id, "7");
    }

    #[test]
    fn test_row_without_identifier_is_dropped() {
        // Offer-looking link but no numeric id anywhere.
        let bad = r#"<article class="offer-item">
             <h2 class="offer-title"><a href="/job-offer/featured">Featured</a></h2>
           </article>"#;
        assert!(parse_listing(&page(bad)).unwrap().is_empty());
    }

    #[test]
    fn test_external_id_from_url_when_attribute_missing() {
        let no_attr = r#"<article class="offer-item">
             <h2 class="offer-title"><a href="/job-offer/889-senior-rust">Senior Rust</a></h2>
           </article>"#;
        let candidates = parse_listing(&page(no_attr)).unwrap();
        assert_eq!(candidates[0].external_id, "889");
    }

    #[test]
    fn test_is_offer_link() {
        assert!(is_offer_link("/job-offer/123/react-dev"));
        assert!(is_offer_link("https://jobs.example.com/job-offer/123"));
        assert!(!is_offer_link("/company/acme"));
        assert!(!is_offer_link("/job-offer/latest-news"));
    }

    #[test]
    fn test_extract_external_id() {
        assert_eq!(extract_external_id("/job-offer/42/slug"), Some("42".to_string()));
        assert_eq!(extract_external_id("/job-offer/42-slug"), Some("42".to_string()));
        assert_eq!(extract_external_id("/job-offer/42"), Some("42".to_string()));
        assert_eq!(extract_external_id("/about"), None);
    }

    #[test]
    fn test_search_url_encodes_keywords() {
        assert_eq!(
            search_url("https://jobs.example.com/", "react developer", 2),
            "https://jobs.example.com/search?q=react%20developer&page=2"
        );
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(
            resolve_url("https://jobs.example.com", "/job-offer/1"),
            "https://jobs.example.com/job-offer/1"
        );
        assert_eq!(
            resolve_url("https://jobs.example.com", "https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );
    }
}

//! HTTP fetch layer with identity rotation and soft-block detection.
//!
//! The target site fingerprints clients and substitutes interstitial
//! pages for requests it dislikes, so every attempt goes out with a
//! different browser identity, behind a randomized delay, and the body
//! is checked for the markers a real listing page always carries.

use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use super::ListingFetcher;

/// One browser signature: user agent plus the accept headers that
/// browser actually sends.
#[derive(Debug, Clone, Copy)]
pub struct BrowserIdentity {
    pub user_agent: &'static str,
    pub accept: &'static str,
    pub accept_language: &'static str,
}

const HTML_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";

/// Rotating pool of realistic browser identities (updated Jan 2025).
pub const BROWSER_IDENTITIES: &[BrowserIdentity] = &[
    // Chrome on Windows
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
    },
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-GB,en;q=0.8",
    },
    // Chrome on Mac
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9,es;q=0.6",
    },
    // Firefox on Windows
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.5",
    },
    // Firefox on Mac
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "es-ES,es;q=0.8,en;q=0.5",
    },
    // Safari on Mac
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.1 Safari/605.1.15",
        accept: "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        accept_language: "en-US,en;q=0.9",
    },
    // Edge on Windows
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
    },
    // Chrome on Linux
    BrowserIdentity {
        user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
        accept: HTML_ACCEPT,
        accept_language: "en-US,en;q=0.9",
    },
];

/// Pick a pseudo-random index without carrying an RNG dependency.
fn entropy() -> usize {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos() as usize)
        .unwrap_or(0)
}

/// Fetch failures, classified for retry decisions.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level failure: connect, timeout, TLS.
    #[error("network error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-success HTTP status from the site.
    #[error("unexpected HTTP status {code}")]
    Status { code: u16 },
    /// 200 response whose body carries none of the expected listing
    /// markers; the anti-automation layer substituted the page.
    #[error("soft block: 200 response without listing markers")]
    SoftBlock,
    /// The bounded attempt budget ran out.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt (with a rotated identity) may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Status { .. } | Self::SoftBlock => true,
            Self::RetriesExhausted { .. } => false,
        }
    }

    /// The innermost failure, unwrapping `RetriesExhausted`.
    pub fn root(&self) -> &FetchError {
        match self {
            Self::RetriesExhausted { last, .. } => last.root(),
            other => other,
        }
    }
}

/// HTTP client for listing pages.
///
/// Purely a transport abstraction: nothing is cached across calls (the
/// listing content changes between polls and caching would defeat the
/// point), and HTTP error statuses come back as typed failures, never
/// panics.
pub struct FetchClient {
    timeout: Duration,
    delay_range_ms: (u64, u64),
    max_attempts: u32,
    /// Substrings at least one of which a genuine listing page carries.
    expected_markers: Vec<String>,
}

impl FetchClient {
    /// Create a client with the given per-request policy.
    pub fn new(
        timeout: Duration,
        delay_range_ms: (u64, u64),
        max_attempts: u32,
        expected_markers: Vec<String>,
    ) -> Self {
        Self {
            timeout,
            delay_range_ms,
            max_attempts: max_attempts.max(1),
            expected_markers,
        }
    }

    /// Randomized delay within the configured range, stretched by the
    /// attempt number as a crude backoff.
    fn attempt_delay(&self, attempt: u32) -> Duration {
        let (min, max) = self.delay_range_ms;
        let span = max.saturating_sub(min).max(1);
        let base = min + (entropy() as u64 % span);
        Duration::from_millis(base * (attempt as u64 + 1))
    }

    fn pick_identity(attempt: u32) -> &'static BrowserIdentity {
        let index = (entropy() + attempt as usize) % BROWSER_IDENTITIES.len();
        &BROWSER_IDENTITIES[index]
    }

    fn looks_like_listing(&self, body: &str) -> bool {
        self.expected_markers.is_empty()
            || self.expected_markers.iter().any(|m| body.contains(m))
    }

    /// One request with one identity. A fresh client per attempt keeps
    /// cookies from correlating rotated identities.
    async fn attempt(&self, url: &str, identity: &BrowserIdentity) -> Result<String, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(identity.user_agent)
            .timeout(self.timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        let response = client
            .get(url)
            .header(reqwest::header::ACCEPT, identity.accept)
            .header(reqwest::header::ACCEPT_LANGUAGE, identity.accept_language)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        if !self.looks_like_listing(&body) {
            return Err(FetchError::SoftBlock);
        }
        Ok(body)
    }
}

#[async_trait]
impl ListingFetcher for FetchClient {
    async fn fetch_listing(&self, url: &str) -> Result<String, FetchError> {
        let mut last: Option<FetchError> = None;

        for attempt in 0..self.max_attempts {
            tokio::time::sleep(self.attempt_delay(attempt)).await;

            let identity = Self::pick_identity(attempt);
            debug!(url, attempt, ua = identity.user_agent, "fetching listing page");

            match self.attempt(url, identity).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() => {
                    warn!(url, attempt, error = %e, "fetch attempt failed, rotating identity");
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::RetriesExhausted {
            attempts: self.max_attempts,
            last: Box::new(last.unwrap_or(FetchError::SoftBlock)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_pool_is_varied() {
        assert!(BROWSER_IDENTITIES.len() >= 8);
        let mut agents: Vec<_> = BROWSER_IDENTITIES.iter().map(|i| i.user_agent).collect();
        agents.sort();
        agents.dedup();
        assert_eq!(agents.len(), BROWSER_IDENTITIES.len());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(FetchError::Status { code: 503 }.is_retryable());
        assert!(FetchError::Status { code: 404 }.is_retryable());
        assert!(FetchError::SoftBlock.is_retryable());
        let exhausted = FetchError::RetriesExhausted {
            attempts: 4,
            last: Box::new(FetchError::SoftBlock),
        };
        assert!(!exhausted.is_retryable());
    }

    #[test]
    fn test_root_unwraps_exhaustion() {
        let exhausted = FetchError::RetriesExhausted {
            attempts: 4,
            last: Box::new(FetchError::Status { code: 429 }),
        };
        assert!(matches!(exhausted.root(), FetchError::Status { code: 429 }));
    }

    #[test]
    fn test_soft_block_marker_detection() {
        let client = FetchClient::new(
            Duration::from_secs(10),
            (1, 2),
            3,
            vec!["id=\"search-results\"".to_string(), "class=\"no-results\"".to_string()],
        );
        assert!(client.looks_like_listing(r#"<div id="search-results"></div>"#));
        assert!(client.looks_like_listing(r#"<p class="no-results">nothing</p>"#));
        assert!(!client.looks_like_listing("<html>Access denied</html>"));
    }

    #[test]
    fn test_delay_grows_with_attempts() {
        let client = FetchClient::new(Duration::from_secs(10), (100, 200), 3, Vec::new());
        let first = client.attempt_delay(0);
        assert!(first >= Duration::from_millis(100));
        assert!(first < Duration::from_millis(200));
        assert!(client.attempt_delay(2) >= Duration::from_millis(300));
    }
}

//! Per-run results reported by the scrape orchestrator.
//!
//! A run is not persisted; the report is handed back to whatever
//! triggered it (CLI, API, scheduler) even when the run fails partway.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Pagination finished, or a stop guard (max pages / max duration) hit.
    Done,
    /// A retry budget was exhausted; partial results were kept.
    Failed,
}

/// Classification of an error recorded during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunErrorKind {
    /// Network-level failure (connect, timeout).
    Transport,
    /// Listing site answered with a non-success HTTP status.
    HttpStatus,
    /// 200 response whose body lacked the expected listing markers.
    SoftBlock,
    /// Page structure was not recognized by the parser.
    Parse,
    /// Persistence layer failure.
    Storage,
}

/// One error observed on one page of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunErrorInfo {
    /// 1-based page index the error occurred on.
    pub page: u32,
    pub kind: RunErrorKind,
    pub message: String,
}

/// Result of one scrape run for one search.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub job_search_id: String,
    pub outcome: RunOutcome,
    /// Pages fetched successfully.
    pub pages_fetched: u32,
    /// Candidates handed to the repository.
    pub total_processed: u32,
    /// Candidates that were unseen and inserted as `active`.
    pub new_offers: u32,
    pub errors: Vec<RunErrorInfo>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    /// Start an empty report for a search.
    pub fn new(job_search_id: &str) -> Self {
        Self {
            job_search_id: job_search_id.to_string(),
            outcome: RunOutcome::Done,
            pages_fetched: 0,
            total_processed: 0,
            new_offers: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record an error against a page.
    pub fn record_error(&mut self, page: u32, kind: RunErrorKind, message: impl Into<String>) {
        self.errors.push(RunErrorInfo {
            page,
            kind,
            message: message.into(),
        });
    }

    /// Mark the run failed and stamp the finish time.
    pub fn fail(&mut self) {
        self.outcome = RunOutcome::Failed;
        self.finished_at = Some(Utc::now());
    }

    /// Stamp the finish time, keeping the `Done` outcome.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_starts_done_and_empty() {
        let report = RunReport::new("s1");
        assert_eq!(report.outcome, RunOutcome::Done);
        assert_eq!(report.new_offers, 0);
        assert!(report.errors.is_empty());
        assert!(report.finished_at.is_none());
    }

    #[test]
    fn test_fail_keeps_recorded_errors() {
        let mut report = RunReport::new("s1");
        report.record_error(3, RunErrorKind::SoftBlock, "blocked");
        report.fail();
        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].page, 3);
        assert_eq!(report.errors[0].kind, RunErrorKind::SoftBlock);
    }
}

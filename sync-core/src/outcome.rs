//! What a sync cycle did.
//!
//! Cycles never crash the process. Their result is a [`CycleOutcome`] that the
//! scheduler publishes, so callers and tests can inspect it directly.

use chrono::{DateTime, Utc};
use issue_sync_types::IssueId;

/// A comment thread that could not be synced this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadFailure {
    /// Issue whose thread failed.
    pub issue_id: IssueId,
    /// Human-facing issue number.
    pub number: i64,
    /// Rendered error.
    pub error: String,
}

/// Counters for one completed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    /// Wall-clock time captured when the cycle started; cursors advance to it.
    pub started_at: DateTime<Utc>,
    /// Issue cursor the fetch started from (`None` = full history).
    pub since: Option<DateTime<Utc>>,
    /// Issues returned by the remote.
    pub issues_fetched: usize,
    /// Comment threads fetched and persisted.
    pub threads_synced: usize,
    /// Threads left alone (no comments, or already fresh).
    pub threads_skipped: usize,
    /// Comment rows written across all threads.
    pub comments_written: usize,
    /// Threads that failed; siblings were still processed.
    pub failures: Vec<ThreadFailure>,
}

impl CycleReport {
    /// An empty report for a cycle starting now-ish.
    pub fn new(started_at: DateTime<Utc>, since: Option<DateTime<Utc>>) -> Self {
        Self {
            started_at,
            since,
            issues_fetched: 0,
            threads_synced: 0,
            threads_skipped: 0,
            comments_written: 0,
            failures: Vec::new(),
        }
    }

    /// Classify the report.
    pub fn into_outcome(self) -> CycleOutcome {
        if self.failures.is_empty() {
            CycleOutcome::Success(self)
        } else {
            CycleOutcome::Partial(self)
        }
    }
}

/// Result of one scheduled cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Everything fetched was persisted.
    Success(CycleReport),
    /// Issues were persisted but some comment threads failed.
    Partial(CycleReport),
    /// The cycle aborted before issues were persisted; cursors are unchanged.
    Failed {
        /// When the cycle started.
        started_at: DateTime<Utc>,
        /// Rendered error.
        reason: String,
    },
}

impl CycleOutcome {
    /// Short lowercase label ("success", "partial", "failed").
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Partial(_) => "partial",
            Self::Failed { .. } => "failed",
        }
    }
}

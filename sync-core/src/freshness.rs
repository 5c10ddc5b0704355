//! Comment-thread staleness rule.
//!
//! An issue's comments are re-fetched when they were never synced, or when the
//! issue itself changed after the last comment sync. A new comment bumps the
//! issue's `updated_at`, so unchanged issues never trigger a comment fetch.

use chrono::{DateTime, Utc};

/// Why a thread is left alone this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The remote reports zero comments.
    NoComments,
    /// Comments were synced after the issue's last update.
    UpToDate,
}

/// Decision for one issue's comment thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadPlan {
    /// Leave the stored comments as they are.
    Skip(SkipReason),
    /// Fetch comments updated since `since` (everything when `None`).
    Fetch {
        /// Existing comment cursor, passed on as the `since` watermark.
        since: Option<DateTime<Utc>>,
    },
}

/// `true` iff no cursor exists or the issue changed strictly after it.
pub fn comments_are_stale(
    issue_updated_at: DateTime<Utc>,
    comment_cursor: Option<DateTime<Utc>>,
) -> bool {
    match comment_cursor {
        None => true,
        Some(cursor) => issue_updated_at > cursor,
    }
}

/// Decide what to do with an issue's comments this cycle.
pub fn plan_thread(
    comment_count: u32,
    issue_updated_at: DateTime<Utc>,
    comment_cursor: Option<DateTime<Utc>>,
) -> ThreadPlan {
    if comment_count == 0 {
        return ThreadPlan::Skip(SkipReason::NoComments);
    }
    if comments_are_stale(issue_updated_at, comment_cursor) {
        ThreadPlan::Fetch {
            since: comment_cursor,
        }
    } else {
        ThreadPlan::Skip(SkipReason::UpToDate)
    }
}

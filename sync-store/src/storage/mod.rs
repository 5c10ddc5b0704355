//! Storage layer for sync-store.
//!
//! Provides the mirror tables behind a single async trait so the engine can
//! be exercised against any backend.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sync_types::{Comment, Issue, IssueId, RepoScope};

/// Result rows returned by search when the caller does not ask for a limit.
pub const DEFAULT_SEARCH_LIMIT: u32 = 50;

/// How a comment batch was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// No comment cursor existed: stored comments were deleted first.
    Replace,
    /// A comment cursor existed: the batch was merged by id.
    Merge,
}

/// Summary of a `save_comments` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentWrite {
    /// Replace or merge.
    pub mode: WriteMode,
    /// Comments inserted or updated.
    pub written: usize,
    /// Comments deleted by a full replace.
    pub removed: u64,
}

/// Aggregate view of one repository's mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    /// Repository described.
    pub repository: RepoScope,
    /// Stored issues (pull requests included).
    pub issue_count: u64,
    /// Stored issues in the "open" state.
    pub open_issue_count: u64,
    /// Stored comments.
    pub comment_count: u64,
    /// Newest `updated_at` among stored issues.
    pub latest_issue_update: Option<DateTime<Utc>>,
    /// Newest `updated_at` among stored comments.
    pub latest_comment_update: Option<DateTime<Utc>>,
    /// Current issue cursor.
    pub last_issue_sync: Option<DateTime<Utc>>,
    /// Issues with a comment cursor.
    pub synced_threads: u64,
}

/// Rows removed by a teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CleanupSummary {
    /// Issue rows deleted.
    pub issues: u64,
    /// Comment rows deleted.
    pub comments: u64,
    /// Comment cursors deleted.
    pub comment_cursors: u64,
    /// Repository cursors deleted (0 or 1).
    pub repo_cursors: u64,
}

/// Trait for mirror storage backends.
///
/// Writes that account for fetched data (`save_issues`, `save_comments`) are
/// atomic. Cursor writes are separate statements that the engine issues only
/// after the corresponding data write returned.
#[async_trait]
pub trait MirrorStorage: Send + Sync {
    /// Issue cursor of a repository (`None` until the first non-empty sync).
    async fn issue_cursor(&self, scope: &RepoScope) -> StorageResult<Option<DateTime<Utc>>>;

    /// Create or move the issue cursor of a repository.
    async fn set_issue_cursor(&self, scope: &RepoScope, at: DateTime<Utc>) -> StorageResult<()>;

    /// Comment cursor of an issue (`None` = comments never synced).
    async fn comment_cursor(
        &self,
        issue_id: IssueId,
        scope: &RepoScope,
    ) -> StorageResult<Option<DateTime<Utc>>>;

    /// Create or move the comment cursor of an issue.
    async fn set_comment_cursor(
        &self,
        issue_id: IssueId,
        scope: &RepoScope,
        at: DateTime<Utc>,
    ) -> StorageResult<()>;

    /// Delete the comment cursor of an issue, forcing the next comment write
    /// to be a full replace. Returns whether a cursor existed.
    async fn clear_comment_cursor(&self, issue_id: IssueId, scope: &RepoScope)
        -> StorageResult<bool>;

    /// Upsert a batch of issues by id in one transaction.
    ///
    /// Returns the number of issues written.
    async fn save_issues(&self, issues: &[Issue]) -> StorageResult<usize>;

    /// Write one issue's comment batch in one transaction.
    ///
    /// Without a comment cursor, every stored comment of the issue is deleted
    /// first; with one, the batch is merged by id.
    async fn save_comments(
        &self,
        issue_id: IssueId,
        scope: &RepoScope,
        comments: &[Comment],
    ) -> StorageResult<CommentWrite>;

    /// Look up an issue by its human-facing number.
    async fn find_issue(&self, scope: &RepoScope, number: i64) -> StorageResult<Option<Issue>>;

    /// Comments of an issue, oldest first. Empty when the issue is unknown.
    async fn comments_for_issue(&self, scope: &RepoScope, number: i64)
        -> StorageResult<Vec<Comment>>;

    /// Case-insensitive substring search over title, body, author and labels,
    /// most recently updated first.
    async fn search_issues(
        &self,
        scope: &RepoScope,
        needle: &str,
        limit: u32,
    ) -> StorageResult<Vec<Issue>>;

    /// Case-insensitive substring search over comment body and author, most
    /// recently updated first.
    async fn search_comments(
        &self,
        scope: &RepoScope,
        needle: &str,
        limit: u32,
    ) -> StorageResult<Vec<Comment>>;

    /// Counts, newest timestamps and cursor state of a repository.
    async fn status(&self, scope: &RepoScope) -> StorageResult<RepoStatus>;

    /// Delete every row and cursor of a repository in one transaction.
    async fn cleanup(&self, scope: &RepoScope) -> StorageResult<CleanupSummary>;
}

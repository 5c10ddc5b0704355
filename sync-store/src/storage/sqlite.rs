//! SQLite storage backend for sync-store.

use super::{CleanupSummary, CommentWrite, MirrorStorage, RepoStatus, WriteMode};
use crate::error::{StorageResult, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use sync_types::{Comment, CommentId, Issue, IssueId, RepoScope};

/// SQLite-based mirror storage.
///
/// Uses WAL mode so the query surface can read while a cycle writes.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Open (or create) the database file at `path`.
    pub async fn new(path: &Path) -> StorageResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.create_tables().await?;
        tracing::debug!(path = %path.display(), "Mirror store opened");
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str(":memory:")?.foreign_keys(true);

        // A single connection that is never recycled: closing it would drop
        // the whole in-memory database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.create_tables().await?;
        Ok(storage)
    }

    /// Create the mirror tables if missing. There is no versioned migration.
    async fn create_tables(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS issues (
                id INTEGER PRIMARY KEY,
                repository TEXT NOT NULL,
                number INTEGER NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                state TEXT NOT NULL,
                labels TEXT NOT NULL DEFAULT '[]',
                assignee TEXT,
                author TEXT NOT NULL,
                comment_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                closed_at INTEGER,
                is_pull_request INTEGER NOT NULL DEFAULT 0,
                UNIQUE(repository, number)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                issue_id INTEGER NOT NULL REFERENCES issues(id),
                repository TEXT NOT NULL,
                body TEXT NOT NULL,
                author TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS repo_sync_state (
                repository TEXT PRIMARY KEY,
                last_issue_sync INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS comment_sync_state (
                issue_id INTEGER PRIMARY KEY,
                repository TEXT NOT NULL,
                last_comment_sync INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_issues_repo_updated ON issues(repository, updated_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_issue_created ON comments(issue_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comments_repo_updated ON comments(repository, updated_at)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_comment_sync_repo ON comment_sync_state(repository)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn upsert_issue(tx: &mut Transaction<'_, Sqlite>, issue: &Issue) -> StorageResult<()> {
        let labels = serde_json::to_string(&issue.labels)?;

        sqlx::query(
            r#"
            INSERT INTO issues (
                id, repository, number, title, body, state, labels, assignee, author,
                comment_count, created_at, updated_at, closed_at, is_pull_request
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ON CONFLICT(id) DO UPDATE SET
                repository = excluded.repository,
                number = excluded.number,
                title = excluded.title,
                body = excluded.body,
                state = excluded.state,
                labels = excluded.labels,
                assignee = excluded.assignee,
                author = excluded.author,
                comment_count = excluded.comment_count,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                closed_at = excluded.closed_at,
                is_pull_request = excluded.is_pull_request
            "#,
        )
        .bind(issue.id.value())
        .bind(issue.repository.as_str())
        .bind(issue.number)
        .bind(&issue.title)
        .bind(&issue.body)
        .bind(&issue.state)
        .bind(labels)
        .bind(issue.assignee.as_deref())
        .bind(&issue.author)
        .bind(i64::from(issue.comment_count))
        .bind(issue.created_at.timestamp_millis())
        .bind(issue.updated_at.timestamp_millis())
        .bind(issue.closed_at.map(|at| at.timestamp_millis()))
        .bind(issue.is_pull_request)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    async fn upsert_comment(
        tx: &mut Transaction<'_, Sqlite>,
        comment: &Comment,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comments (id, issue_id, repository, body, author, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                issue_id = excluded.issue_id,
                repository = excluded.repository,
                body = excluded.body,
                author = excluded.author,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(comment.id.value())
        .bind(comment.issue_id.value())
        .bind(comment.repository.as_str())
        .bind(&comment.body)
        .bind(&comment.author)
        .bind(comment.created_at.timestamp_millis())
        .bind(comment.updated_at.timestamp_millis())
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

/// Turn a stored millisecond timestamp back into a UTC instant.
fn from_millis(table: &'static str, id: i64, millis: i64) -> StorageResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| StoreError::Corrupt {
        table,
        id,
        reason: format!("timestamp {millis} out of range"),
    })
}

/// Wrap a needle for `LIKE ... ESCAPE '\'`, matching `%`, `_` and `\` literally.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

#[async_trait]
impl MirrorStorage for SqliteStorage {
    async fn issue_cursor(&self, scope: &RepoScope) -> StorageResult<Option<DateTime<Utc>>> {
        let millis: Option<i64> = sqlx::query_scalar(
            "SELECT last_issue_sync FROM repo_sync_state WHERE repository = ?1",
        )
        .bind(scope.as_str())
        .fetch_optional(&self.pool)
        .await?;

        millis
            .map(|ms| from_millis("repo_sync_state", 0, ms))
            .transpose()
    }

    async fn set_issue_cursor(&self, scope: &RepoScope, at: DateTime<Utc>) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO repo_sync_state (repository, last_issue_sync)
            VALUES (?1, ?2)
            ON CONFLICT(repository) DO UPDATE SET last_issue_sync = excluded.last_issue_sync
            "#,
        )
        .bind(scope.as_str())
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn comment_cursor(
        &self,
        issue_id: IssueId,
        scope: &RepoScope,
    ) -> StorageResult<Option<DateTime<Utc>>> {
        let millis: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT last_comment_sync FROM comment_sync_state
            WHERE issue_id = ?1 AND repository = ?2
            "#,
        )
        .bind(issue_id.value())
        .bind(scope.as_str())
        .fetch_optional(&self.pool)
        .await?;

        millis
            .map(|ms| from_millis("comment_sync_state", issue_id.value(), ms))
            .transpose()
    }

    async fn set_comment_cursor(
        &self,
        issue_id: IssueId,
        scope: &RepoScope,
        at: DateTime<Utc>,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO comment_sync_state (issue_id, repository, last_comment_sync)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(issue_id) DO UPDATE SET
                repository = excluded.repository,
                last_comment_sync = excluded.last_comment_sync
            "#,
        )
        .bind(issue_id.value())
        .bind(scope.as_str())
        .bind(at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_comment_cursor(
        &self,
        issue_id: IssueId,
        scope: &RepoScope,
    ) -> StorageResult<bool> {
        let result = sqlx::query(
            "DELETE FROM comment_sync_state WHERE issue_id = ?1 AND repository = ?2",
        )
        .bind(issue_id.value())
        .bind(scope.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn save_issues(&self, issues: &[Issue]) -> StorageResult<usize> {
        if issues.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        for issue in issues {
            Self::upsert_issue(&mut tx, issue).await?;
        }
        tx.commit().await?;

        Ok(issues.len())
    }

    async fn save_comments(
        &self,
        issue_id: IssueId,
        scope: &RepoScope,
        comments: &[Comment],
    ) -> StorageResult<CommentWrite> {
        if let Some(stray) = comments
            .iter()
            .find(|c| c.issue_id != issue_id || &c.repository != scope)
        {
            return Err(StoreError::InvalidBatch(format!(
                "comment {} belongs to issue {} in {}, batch is for issue {} in {}",
                stray.id, stray.issue_id, stray.repository, issue_id, scope
            )));
        }

        let mut tx = self.pool.begin().await?;

        let has_cursor: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM comment_sync_state WHERE issue_id = ?1 AND repository = ?2",
        )
        .bind(issue_id.value())
        .bind(scope.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let (mode, removed) = if has_cursor.is_some() {
            (WriteMode::Merge, 0)
        } else {
            let result =
                sqlx::query("DELETE FROM comments WHERE issue_id = ?1 AND repository = ?2")
                    .bind(issue_id.value())
                    .bind(scope.as_str())
                    .execute(&mut *tx)
                    .await?;
            (WriteMode::Replace, result.rows_affected())
        };

        for comment in comments {
            Self::upsert_comment(&mut tx, comment).await?;
        }
        tx.commit().await?;

        Ok(CommentWrite {
            mode,
            written: comments.len(),
            removed,
        })
    }

    async fn find_issue(&self, scope: &RepoScope, number: i64) -> StorageResult<Option<Issue>> {
        let row = sqlx::query_as::<_, IssueRow>(
            r#"
            SELECT id, repository, number, title, body, state, labels, assignee, author,
                   comment_count, created_at, updated_at, closed_at, is_pull_request
            FROM issues
            WHERE repository = ?1 AND number = ?2
            "#,
        )
        .bind(scope.as_str())
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Issue::try_from).transpose()
    }

    async fn comments_for_issue(
        &self,
        scope: &RepoScope,
        number: i64,
    ) -> StorageResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT c.id, c.issue_id, c.repository, c.body, c.author, c.created_at, c.updated_at
            FROM comments c
            JOIN issues i ON i.id = c.issue_id
            WHERE i.repository = ?1 AND i.number = ?2 AND c.repository = ?1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(scope.as_str())
        .bind(number)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Comment::try_from).collect()
    }

    async fn search_issues(
        &self,
        scope: &RepoScope,
        needle: &str,
        limit: u32,
    ) -> StorageResult<Vec<Issue>> {
        let rows = sqlx::query_as::<_, IssueRow>(
            r#"
            SELECT id, repository, number, title, body, state, labels, assignee, author,
                   comment_count, created_at, updated_at, closed_at, is_pull_request
            FROM issues
            WHERE repository = ?1
              AND (title LIKE ?2 ESCAPE '\'
                   OR body LIKE ?2 ESCAPE '\'
                   OR author LIKE ?2 ESCAPE '\'
                   OR labels LIKE ?2 ESCAPE '\')
            ORDER BY updated_at DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(scope.as_str())
        .bind(like_pattern(needle))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Issue::try_from).collect()
    }

    async fn search_comments(
        &self,
        scope: &RepoScope,
        needle: &str,
        limit: u32,
    ) -> StorageResult<Vec<Comment>> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r#"
            SELECT id, issue_id, repository, body, author, created_at, updated_at
            FROM comments
            WHERE repository = ?1
              AND (body LIKE ?2 ESCAPE '\' OR author LIKE ?2 ESCAPE '\')
            ORDER BY updated_at DESC, id DESC
            LIMIT ?3
            "#,
        )
        .bind(scope.as_str())
        .bind(like_pattern(needle))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Comment::try_from).collect()
    }

    async fn status(&self, scope: &RepoScope) -> StorageResult<RepoStatus> {
        let (issue_count, open_issue_count, latest_issue): (i64, Option<i64>, Option<i64>) =
            sqlx::query_as(
                r#"
                SELECT COUNT(*),
                       SUM(CASE WHEN state = 'open' THEN 1 ELSE 0 END),
                       MAX(updated_at)
                FROM issues
                WHERE repository = ?1
                "#,
            )
            .bind(scope.as_str())
            .fetch_one(&self.pool)
            .await?;

        let (comment_count, latest_comment): (i64, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), MAX(updated_at) FROM comments WHERE repository = ?1",
        )
        .bind(scope.as_str())
        .fetch_one(&self.pool)
        .await?;

        let synced_threads: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM comment_sync_state WHERE repository = ?1")
                .bind(scope.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(RepoStatus {
            repository: scope.clone(),
            issue_count: count(issue_count),
            open_issue_count: count(open_issue_count.unwrap_or(0)),
            comment_count: count(comment_count),
            latest_issue_update: latest_issue
                .map(|ms| from_millis("issues", 0, ms))
                .transpose()?,
            latest_comment_update: latest_comment
                .map(|ms| from_millis("comments", 0, ms))
                .transpose()?,
            last_issue_sync: self.issue_cursor(scope).await?,
            synced_threads: count(synced_threads),
        })
    }

    async fn cleanup(&self, scope: &RepoScope) -> StorageResult<CleanupSummary> {
        let mut tx = self.pool.begin().await?;

        // Comments go first: they reference issues.
        let comments = sqlx::query("DELETE FROM comments WHERE repository = ?1")
            .bind(scope.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let comment_cursors = sqlx::query("DELETE FROM comment_sync_state WHERE repository = ?1")
            .bind(scope.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let issues = sqlx::query("DELETE FROM issues WHERE repository = ?1")
            .bind(scope.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let repo_cursors = sqlx::query("DELETE FROM repo_sync_state WHERE repository = ?1")
            .bind(scope.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        let summary = CleanupSummary {
            issues,
            comments,
            comment_cursors,
            repo_cursors,
        };
        tracing::info!(
            repository = %scope,
            issues = summary.issues,
            comments = summary.comments,
            "Mirror rows removed"
        );
        Ok(summary)
    }
}

/// Internal row type for issue queries.
#[derive(sqlx::FromRow)]
struct IssueRow {
    id: i64,
    repository: String,
    number: i64,
    title: String,
    body: String,
    state: String,
    labels: String,
    assignee: Option<String>,
    author: String,
    comment_count: i64,
    created_at: i64,
    updated_at: i64,
    closed_at: Option<i64>,
    is_pull_request: bool,
}

impl TryFrom<IssueRow> for Issue {
    type Error = StoreError;

    fn try_from(row: IssueRow) -> Result<Self, Self::Error> {
        let corrupt = |reason: String| StoreError::Corrupt {
            table: "issues",
            id: row.id,
            reason,
        };

        Ok(Issue {
            id: IssueId::new(row.id),
            number: row.number,
            labels: serde_json::from_str(&row.labels)
                .map_err(|e| corrupt(format!("labels: {e}")))?,
            repository: RepoScope::parse(&row.repository).map_err(|e| corrupt(e.to_string()))?,
            comment_count: u32::try_from(row.comment_count)
                .map_err(|_| corrupt(format!("comment_count {}", row.comment_count)))?,
            created_at: from_millis("issues", row.id, row.created_at)?,
            updated_at: from_millis("issues", row.id, row.updated_at)?,
            closed_at: row
                .closed_at
                .map(|ms| from_millis("issues", row.id, ms))
                .transpose()?,
            title: row.title,
            body: row.body,
            state: row.state,
            assignee: row.assignee,
            author: row.author,
            is_pull_request: row.is_pull_request,
        })
    }
}

/// Internal row type for comment queries.
#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    issue_id: i64,
    repository: String,
    body: String,
    author: String,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<CommentRow> for Comment {
    type Error = StoreError;

    fn try_from(row: CommentRow) -> Result<Self, Self::Error> {
        Ok(Comment {
            id: CommentId::new(row.id),
            issue_id: IssueId::new(row.issue_id),
            repository: RepoScope::parse(&row.repository).map_err(|e| StoreError::Corrupt {
                table: "comments",
                id: row.id,
                reason: e.to_string(),
            })?,
            created_at: from_millis("comments", row.id, row.created_at)?,
            updated_at: from_millis("comments", row.id, row.updated_at)?,
            body: row.body,
            author: row.author,
        })
    }
}

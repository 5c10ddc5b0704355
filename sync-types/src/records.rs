//! Issue and comment records.
//!
//! Two shapes exist for each record kind:
//! - `Remote*` mirrors the JSON the tracker returns and is only used at the
//!   fetch boundary.
//! - [`Issue`] / [`Comment`] are validated and scoped to a repository; these are
//!   what the store persists and the query surface returns.

use crate::{CommentId, IssueId, RecordError, RepoScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Login recorded when the remote reports no author (deleted account).
pub const GHOST_LOGIN: &str = "ghost";

/// A user reference as sent by the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteUser {
    /// Account login.
    pub login: String,
}

/// A label as sent by the tracker: either a full label object or a bare name.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RemoteLabel {
    /// Label object; only the name is kept.
    Object {
        /// Label name.
        name: String,
    },
    /// Bare label name.
    Name(String),
}

impl RemoteLabel {
    /// The label's display name.
    pub fn name(&self) -> &str {
        match self {
            Self::Object { name } | Self::Name(name) => name,
        }
    }
}

/// An issue exactly as the tracker's issues endpoint returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteIssue {
    /// Stable id.
    pub id: i64,
    /// Human-facing number within the repository.
    pub number: i64,
    /// Title.
    pub title: String,
    /// Body; null for issues opened without a description.
    #[serde(default)]
    pub body: Option<String>,
    /// "open" or "closed".
    pub state: String,
    /// Labels attached to the issue.
    #[serde(default)]
    pub labels: Vec<RemoteLabel>,
    /// Opening author.
    #[serde(default)]
    pub user: Option<RemoteUser>,
    /// Current assignee.
    #[serde(default)]
    pub assignee: Option<RemoteUser>,
    /// Number of comments on the remote.
    #[serde(default)]
    pub comments: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Close time.
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// Present (with any content) when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

impl RemoteIssue {
    /// Decode one element of an issues page.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        serde_json::from_value(value).map_err(|source| RecordError::Malformed {
            kind: "issue",
            source,
        })
    }

    /// Validate and scope this issue to a repository.
    pub fn into_issue(self, repository: &RepoScope) -> Result<Issue, RecordError> {
        let invalid = |reason: &str| RecordError::InvalidField {
            kind: "issue",
            id: self.id,
            reason: reason.to_string(),
        };
        if self.id <= 0 {
            return Err(invalid("id must be positive"));
        }
        if self.number <= 0 {
            return Err(invalid("number must be positive"));
        }
        if self.state.is_empty() {
            return Err(invalid("state is empty"));
        }

        Ok(Issue {
            id: IssueId::new(self.id),
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state: self.state,
            labels: self.labels.iter().map(|l| l.name().to_string()).collect(),
            assignee: self.assignee.map(|u| u.login),
            author: self
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| GHOST_LOGIN.to_string()),
            comment_count: self.comments,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
            repository: repository.clone(),
            is_pull_request: self.pull_request.is_some(),
        })
    }
}

/// A comment exactly as the tracker's issue-comments endpoint returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteComment {
    /// Stable id.
    pub id: i64,
    /// Comment text.
    #[serde(default)]
    pub body: Option<String>,
    /// Author.
    #[serde(default)]
    pub user: Option<RemoteUser>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
    /// API URL of the issue the comment belongs to.
    #[serde(default)]
    pub issue_url: Option<String>,
}

impl RemoteComment {
    /// Decode one element of a comments page.
    pub fn from_value(value: serde_json::Value) -> Result<Self, RecordError> {
        serde_json::from_value(value).map_err(|source| RecordError::Malformed {
            kind: "comment",
            source,
        })
    }

    /// Validate this comment against the issue it was fetched for.
    pub fn into_comment(self, issue: &Issue) -> Result<Comment, RecordError> {
        let invalid = |reason: String| RecordError::InvalidField {
            kind: "comment",
            id: self.id,
            reason,
        };
        if self.id <= 0 {
            return Err(invalid("id must be positive".into()));
        }
        if let Some(url) = &self.issue_url {
            let suffix = format!("/issues/{}", issue.number);
            if !url.ends_with(&suffix) {
                return Err(invalid(format!(
                    "belongs to {url}, expected issue #{}",
                    issue.number
                )));
            }
        }

        Ok(Comment {
            id: CommentId::new(self.id),
            issue_id: issue.id,
            body: self.body.unwrap_or_default(),
            author: self
                .user
                .map(|u| u.login)
                .unwrap_or_else(|| GHOST_LOGIN.to_string()),
            created_at: self.created_at,
            updated_at: self.updated_at,
            repository: issue.repository.clone(),
        })
    }
}

/// An issue as mirrored in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Stable remote id (primary key).
    pub id: IssueId,
    /// Human-facing number, unique per repository.
    pub number: i64,
    /// Title.
    pub title: String,
    /// Body (empty when the remote has none).
    pub body: String,
    /// "open" or "closed".
    pub state: String,
    /// Label names.
    pub labels: Vec<String>,
    /// Assignee login.
    pub assignee: Option<String>,
    /// Author login.
    pub author: String,
    /// Remote comment count at fetch time.
    pub comment_count: u32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
    /// Close time.
    pub closed_at: Option<DateTime<Utc>>,
    /// Scope key.
    pub repository: RepoScope,
    /// Whether the remote lists this issue as a pull request.
    pub is_pull_request: bool,
}

/// A comment as mirrored in the local store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Stable remote id (primary key).
    pub id: CommentId,
    /// Issue this comment belongs to.
    pub issue_id: IssueId,
    /// Comment text.
    pub body: String,
    /// Author login.
    pub author: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last edit time.
    pub updated_at: DateTime<Utc>,
    /// Scope key.
    pub repository: RepoScope,
}

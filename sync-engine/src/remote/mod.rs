//! Remote tracker abstraction for issue-sync.
//!
//! The engine only needs two capabilities from the tracker:
//! - `validate()` checks that the credential is accepted
//! - `fetch_page()` returns one page of JSON records for an endpoint
//!
//! Pagination, decoding and validation of the records are done by the
//! [`Fetcher`](crate::fetcher::Fetcher), so implementations stay thin.
//!
//! # Example
//!
//! ```ignore
//! let remote = MockRemote::new();
//! remote.push_page(Endpoint::issues(&scope), vec![issue_json]);
//! let page = remote.fetch_page(&Endpoint::issues(&scope), &params).await?;
//! ```

mod http;
mod mock;

pub use http::HttpRemote;
pub use mock::MockRemote;

use async_trait::async_trait;
use std::fmt;
use sync_types::RepoScope;
use thiserror::Error;

/// A listable collection on the remote.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Every issue (and pull request) of a repository.
    Issues {
        /// Repository listed.
        repository: RepoScope,
    },
    /// The comment thread of one issue.
    IssueComments {
        /// Repository of the issue.
        repository: RepoScope,
        /// Issue number.
        number: i64,
    },
}

impl Endpoint {
    /// Issues endpoint of a repository.
    pub fn issues(repository: &RepoScope) -> Self {
        Self::Issues {
            repository: repository.clone(),
        }
    }

    /// Comments endpoint of an issue.
    pub fn comments(repository: &RepoScope, number: i64) -> Self {
        Self::IssueComments {
            repository: repository.clone(),
            number,
        }
    }

    /// Path below the API base URL.
    pub fn path(&self) -> String {
        match self {
            Self::Issues { repository } => {
                format!("/repos/{}/{}/issues", repository.owner(), repository.name())
            }
            Self::IssueComments { repository, number } => format!(
                "/repos/{}/{}/issues/{}/comments",
                repository.owner(),
                repository.name(),
                number
            ),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Remote errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The remote answered with a non-success status.
    #[error("remote returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Parsed JSON body, or the raw text as a JSON string.
        body: serde_json::Value,
    },

    /// The request never got a response (connect, timeout, TLS, ...).
    #[error("transport failed: {0}")]
    Transport(String),

    /// The response was not the expected shape.
    #[error("invalid response: {0}")]
    Validation(String),

    /// Pages kept coming past the configured limit.
    #[error("{endpoint} still returned records after {pages} pages")]
    PageLimit {
        /// Endpoint being walked.
        endpoint: String,
        /// Pages fetched.
        pages: u32,
    },
}

impl RemoteError {
    /// Transport failures, rate limiting (429) and server errors (5xx) may
    /// succeed on a later attempt. Everything else needs a human.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Validation(_) | Self::PageLimit { .. } => false,
        }
    }
}

/// Source of issue and comment pages.
///
/// Implementations handle the underlying connection mechanism
/// (HTTPS via reqwest, scripted pages for tests).
#[async_trait]
pub trait RemoteSource: Send + Sync {
    /// Lightweight authenticated probe; fails when the credential is rejected.
    async fn validate(&self) -> Result<(), RemoteError>;

    /// Fetch one page of `endpoint` with the given query parameters.
    ///
    /// Returns the page's records as raw JSON objects.
    async fn fetch_page(
        &self,
        endpoint: &Endpoint,
        params: &[(String, String)],
    ) -> Result<Vec<serde_json::Value>, RemoteError>;
}

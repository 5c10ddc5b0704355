//! Paginated fetcher.
//!
//! Drains every page of an endpoint into memory and decodes the records. A
//! fetch is all-or-nothing: any failed page fails the whole fetch, and a
//! retry starts again from page 1.

use crate::remote::{Endpoint, RemoteError, RemoteSource};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use sync_core::{PagePlan, PageStep};
use sync_types::{Comment, Issue, RemoteComment, RemoteIssue, RepoScope};

/// Walks pages of a [`RemoteSource`].
pub struct Fetcher<R> {
    remote: Arc<R>,
    max_pages: u32,
}

impl<R> Clone for Fetcher<R> {
    fn clone(&self) -> Self {
        Self {
            remote: Arc::clone(&self.remote),
            max_pages: self.max_pages,
        }
    }
}

impl<R: RemoteSource> Fetcher<R> {
    /// Create a fetcher that gives up after `max_pages` non-empty pages.
    pub fn new(remote: Arc<R>, max_pages: u32) -> Self {
        Self { remote, max_pages }
    }

    /// The underlying remote.
    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    /// Fetch every raw record of `endpoint` updated since `since`.
    pub async fn fetch_all(
        &self,
        endpoint: &Endpoint,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>, RemoteError> {
        let mut plan = PagePlan::with_max_pages(since, self.max_pages);
        let mut request = plan.request();
        let mut records = Vec::new();

        loop {
            let page = self.remote.fetch_page(endpoint, &request.params()).await?;
            let count = page.len();
            records.extend(page);

            match plan.advance(count) {
                PageStep::Next(next) => request = next,
                PageStep::Done => break,
                PageStep::LimitReached { pages } => {
                    return Err(RemoteError::PageLimit {
                        endpoint: endpoint.to_string(),
                        pages,
                    })
                }
            }
        }

        tracing::debug!(%endpoint, records = records.len(), "Fetched all pages");
        Ok(records)
    }

    /// Fetch and validate every issue of a repository updated since `since`.
    pub async fn fetch_issues(
        &self,
        repository: &RepoScope,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Issue>, RemoteError> {
        self.fetch_all(&Endpoint::issues(repository), since)
            .await?
            .into_iter()
            .map(|value| {
                RemoteIssue::from_value(value)
                    .and_then(|remote| remote.into_issue(repository))
                    .map_err(|e| RemoteError::Validation(e.to_string()))
            })
            .collect()
    }

    /// Fetch and validate the comments of `issue` updated since `since`.
    pub async fn fetch_comments(
        &self,
        issue: &Issue,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, RemoteError> {
        self.fetch_all(&Endpoint::comments(&issue.repository, issue.number), since)
            .await?
            .into_iter()
            .map(|value| {
                RemoteComment::from_value(value)
                    .and_then(|remote| remote.into_comment(issue))
                    .map_err(|e| RemoteError::Validation(e.to_string()))
            })
            .collect()
    }
}

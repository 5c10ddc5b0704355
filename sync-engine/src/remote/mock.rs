//! Mock remote for testing.
//!
//! Serves scripted records per endpoint, honoring `page`, `per_page` and
//! `since` like the real tracker, and records every request for verification.

use super::{Endpoint, RemoteError, RemoteSource};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

/// Mock remote for testing.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Default, Clone)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    records: HashMap<Endpoint, Vec<Value>>,
    requests: Vec<(Endpoint, Vec<(String, String)>)>,
    validate_calls: u32,
    fail_validate: VecDeque<Failure>,
    fail_fetch: HashMap<Endpoint, VecDeque<Failure>>,
    broken: HashSet<Endpoint>,
}

#[derive(Debug, Clone)]
enum Failure {
    Status(u16),
    Transport(String),
}

impl Failure {
    fn to_error(&self) -> RemoteError {
        match self {
            Self::Status(status) => RemoteError::Status {
                status: *status,
                body: serde_json::json!({ "message": "mock failure" }),
            },
            Self::Transport(reason) => RemoteError::Transport(reason.clone()),
        }
    }
}

impl MockRemote {
    /// Create a mock remote with no records.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the records served by `endpoint`.
    pub fn set_records(&self, endpoint: Endpoint, records: Vec<Value>) {
        let mut inner = self.inner.lock().unwrap();
        inner.records.insert(endpoint, records);
    }

    /// Every fetch made so far, in order.
    pub fn requests(&self) -> Vec<(Endpoint, Vec<(String, String)>)> {
        let inner = self.inner.lock().unwrap();
        inner.requests.clone()
    }

    /// Fetches made against one endpoint.
    pub fn requests_for(&self, endpoint: &Endpoint) -> Vec<Vec<(String, String)>> {
        let inner = self.inner.lock().unwrap();
        inner
            .requests
            .iter()
            .filter(|(e, _)| e == endpoint)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Number of `validate()` calls.
    pub fn validate_calls(&self) -> u32 {
        let inner = self.inner.lock().unwrap();
        inner.validate_calls
    }

    /// Cause the next `validate()` to fail with the given status.
    pub fn fail_next_validate(&self, status: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_validate.push_back(Failure::Status(status));
    }

    /// Cause the next fetch of `endpoint` to fail with the given status.
    pub fn fail_next_fetch(&self, endpoint: Endpoint, status: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .fail_fetch
            .entry(endpoint)
            .or_default()
            .push_back(Failure::Status(status));
    }

    /// Cause the next fetch of `endpoint` to fail before any response.
    pub fn fail_next_transport(&self, endpoint: Endpoint, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .fail_fetch
            .entry(endpoint)
            .or_default()
            .push_back(Failure::Transport(reason.to_string()));
    }

    /// Make every fetch of `endpoint` fail with a 500 until [`reset`](Self::reset).
    pub fn break_endpoint(&self, endpoint: Endpoint) {
        let mut inner = self.inner.lock().unwrap();
        inner.broken.insert(endpoint);
    }

    /// Clear all state (records, requests, failures).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        *inner = MockRemoteInner::default();
    }
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn updated_at(record: &Value) -> Option<DateTime<Utc>> {
    record
        .get("updated_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

#[async_trait]
impl RemoteSource for MockRemote {
    async fn validate(&self) -> Result<(), RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.validate_calls += 1;

        // Check for forced failure
        if let Some(failure) = inner.fail_validate.pop_front() {
            return Err(failure.to_error());
        }
        Ok(())
    }

    async fn fetch_page(
        &self,
        endpoint: &Endpoint,
        params: &[(String, String)],
    ) -> Result<Vec<Value>, RemoteError> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.push((endpoint.clone(), params.to_vec()));

        // Check for forced failure
        if let Some(failure) = inner
            .fail_fetch
            .get_mut(endpoint)
            .and_then(VecDeque::pop_front)
        {
            return Err(failure.to_error());
        }
        if inner.broken.contains(endpoint) {
            return Err(Failure::Status(500).to_error());
        }

        let page: usize = param(params, "page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(1);
        let per_page: usize = param(params, "per_page")
            .and_then(|p| p.parse().ok())
            .unwrap_or(30);
        let since = param(params, "since")
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));

        let mut matching: Vec<Value> = inner
            .records
            .get(endpoint)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| match (since, updated_at(r)) {
                        (Some(since), Some(updated)) => updated >= since,
                        _ => true,
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by_key(|r| std::cmp::Reverse(updated_at(r)));

        Ok(matching
            .into_iter()
            .skip(page.saturating_sub(1) * per_page)
            .take(per_page)
            .collect())
    }
}

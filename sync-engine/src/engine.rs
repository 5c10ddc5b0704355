//! Sync orchestrator.
//!
//! One [`SyncEngine`] mirrors one repository. Several engines may share a
//! store; each one only touches rows of its own repository.
//!
//! A cycle:
//! 1. reads the issue cursor,
//! 2. fetches every issue updated since it,
//! 3. persists them and moves the issue cursor to the cycle start time,
//! 4. re-fetches the comment thread of every fetched issue whose comments are
//!    stale, persisting each thread and then moving its comment cursor.
//!
//! Failures in steps 1-3 abort the cycle with cursors untouched. A failing
//! thread in step 4 is recorded in the report and its siblings still sync.

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::fetcher::Fetcher;
use crate::remote::RemoteSource;
use crate::retry;
use crate::scheduler::{spawn_schedule, ScheduleHandle};
use chrono::{DateTime, SubsecRound, Utc};
use std::sync::Arc;
use std::time::Duration;
use sync_core::{
    plan_thread, Backoff, BackoffConfig, CycleOutcome, CycleReport, EngineEvent, EngineState,
    ThreadFailure, ThreadPlan, DEFAULT_MAX_PAGES,
};
use sync_store::{CleanupSummary, MirrorStorage, RepoStatus, DEFAULT_SEARCH_LIMIT};
use sync_types::{Comment, Issue, IssueId, RepoScope};
use tokio::sync::{watch, Mutex};

/// Tunables of one engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Pause between the end of one cycle and the start of the next.
    pub poll_interval: Duration,
    /// Pages walked per fetch before giving up.
    pub max_pages: u32,
    /// Retry policy of the bootstrap (credential probe plus first cycle).
    pub bootstrap: BackoffConfig,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(300),
            max_pages: DEFAULT_MAX_PAGES,
            bootstrap: BackoffConfig::default(),
        }
    }
}

impl EngineOptions {
    /// Options from a loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            poll_interval: config.sync.poll_interval(),
            max_pages: config.sync.max_pages,
            bootstrap: config.backoff.to_backoff_config(),
        }
    }
}

/// Result of a forced comment re-sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// No stored issue has that number in this repository.
    NotFound,
    /// The thread was replaced with the remote's current comments.
    Resynced {
        /// Issue whose thread was replaced.
        issue_id: IssueId,
        /// Comments now stored for it.
        comments: usize,
    },
}

/// Incremental mirror of one repository.
///
/// Cheap to clone; clones share the same engine.
pub struct SyncEngine<R> {
    inner: Arc<EngineInner<R>>,
}

impl<R> Clone for SyncEngine<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct EngineInner<R> {
    repository: RepoScope,
    fetcher: Fetcher<R>,
    store: Arc<dyn MirrorStorage>,
    options: EngineOptions,
    /// Serializes everything that writes cursors or mirror rows.
    cycle_lock: Mutex<()>,
    state: watch::Sender<EngineState>,
    schedule: Mutex<Option<ScheduleHandle>>,
}

impl<R: RemoteSource + 'static> SyncEngine<R> {
    /// Create an engine for `repository`. Nothing runs until
    /// [`initialize`](Self::initialize) or [`run_cycle`](Self::run_cycle).
    pub fn new(
        repository: RepoScope,
        remote: Arc<R>,
        store: Arc<dyn MirrorStorage>,
        options: EngineOptions,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Uninitialized);
        Self {
            inner: Arc::new(EngineInner {
                repository,
                fetcher: Fetcher::new(remote, options.max_pages),
                store,
                options,
                cycle_lock: Mutex::new(()),
                state,
                schedule: Mutex::new(None),
            }),
        }
    }

    /// Repository this engine mirrors.
    pub fn repository(&self) -> &RepoScope {
        &self.inner.repository
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.inner.state.borrow().clone()
    }

    /// Watch lifecycle changes.
    pub fn subscribe_state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    fn apply(&self, event: EngineEvent) {
        self.inner.state.send_modify(|state| {
            let next = state.clone().on_event(event);
            if *state != next {
                tracing::debug!(
                    repository = %self.inner.repository,
                    from = state.name(),
                    to = next.name(),
                    "Engine state changed"
                );
            }
            *state = next;
        });
    }

    /// Validate the credential and run the first cycle, retrying both as one
    /// unit, then start polling.
    ///
    /// Returns the report of the first cycle.
    ///
    /// # Errors
    ///
    /// Returns the last failure when a bounded retry budget runs out, or
    /// `InvalidState` if the engine was already started or is stopped
    /// meanwhile.
    pub async fn initialize(&self) -> Result<CycleReport> {
        let report = self.bootstrap().await?;
        self.start_schedule(Some(report.clone().into_outcome())).await;
        Ok(report)
    }

    /// Validate the credential and run the first cycle without starting the
    /// schedule. Used for one-shot syncs.
    pub async fn bootstrap(&self) -> Result<CycleReport> {
        let state = self.state();
        if state != EngineState::Uninitialized {
            return Err(EngineError::InvalidState {
                operation: "initialize",
                state: state.name(),
            });
        }
        self.apply(EngineEvent::Start);
        tracing::info!(repository = %self.inner.repository, "Bootstrapping");

        let mut backoff = Backoff::new(self.inner.options.bootstrap.clone());
        let label = format!("bootstrap {}", self.inner.repository);
        let outcome = retry::execute(&mut backoff, &label, || self.bootstrap_attempt())
            .await
            .and_then(|attempt| attempt);

        match outcome {
            Ok(report) => {
                backoff.reset();
                self.apply(EngineEvent::InitialSyncCompleted);
                tracing::info!(
                    repository = %self.inner.repository,
                    issues = report.issues_fetched,
                    threads = report.threads_synced,
                    "Bootstrap complete"
                );
                Ok(report)
            }
            Err(e) => {
                self.apply(EngineEvent::BootstrapAbandoned);
                Err(e)
            }
        }
    }

    /// One bootstrap attempt. `Ok(Err(_))` ends the retry loop without
    /// another attempt.
    async fn bootstrap_attempt(&self) -> Result<Result<CycleReport>> {
        if let Some(stopped) = self.stopped_during_bootstrap() {
            return Ok(Err(stopped));
        }

        if let Err(e) = self.inner.fetcher.remote().validate().await {
            let e = EngineError::from(e);
            self.bootstrap_failed(&e);
            return Err(e);
        }
        // stop() may have returned while the probe was in flight.
        if let Some(stopped) = self.stopped_during_bootstrap() {
            return Ok(Err(stopped));
        }
        self.apply(EngineEvent::CredentialAccepted);

        let _guard = self.inner.cycle_lock.lock().await;
        if let Some(stopped) = self.stopped_during_bootstrap() {
            return Ok(Err(stopped));
        }
        match self.cycle().await {
            Ok(report) => Ok(Ok(report)),
            Err(e) => {
                self.bootstrap_failed(&e);
                Err(e)
            }
        }
    }

    fn bootstrap_failed(&self, error: &EngineError) {
        self.apply(EngineEvent::BootstrapFailed);
        // Rejected credentials or a bad URL are still retried, but need a human.
        if !error.is_retryable() {
            tracing::error!(
                repository = %self.inner.repository,
                "Bootstrap failed with a non-transient error: {}",
                error
            );
        }
    }

    fn stopped_during_bootstrap(&self) -> Option<EngineError> {
        self.state().is_stopped().then_some(EngineError::InvalidState {
            operation: "initialize",
            state: "stopped",
        })
    }

    async fn start_schedule(&self, initial: Option<CycleOutcome>) {
        let mut schedule = self.inner.schedule.lock().await;
        // A stop that raced the bootstrap wins.
        if !self.state().is_steady() || schedule.is_some() {
            return;
        }

        let engine = self.clone();
        *schedule = Some(spawn_schedule(
            self.inner.repository.to_string(),
            self.inner.options.poll_interval,
            initial,
            move || {
                let engine = engine.clone();
                async move { engine.scheduled_cycle().await }
            },
        ));
    }

    async fn scheduled_cycle(&self) -> CycleOutcome {
        let started_at = now();
        match self.run_cycle().await {
            Ok(report) => report.into_outcome(),
            Err(e) => CycleOutcome::Failed {
                started_at,
                reason: e.to_string(),
            },
        }
    }

    /// Latest outcome published by the schedule, if it is running.
    pub async fn outcomes(&self) -> Option<watch::Receiver<Option<CycleOutcome>>> {
        self.inner
            .schedule
            .lock()
            .await
            .as_ref()
            .filter(|handle| !handle.is_finished())
            .map(ScheduleHandle::outcomes)
    }

    /// Stop polling and wait for an in-flight cycle to finish.
    ///
    /// Idempotent; a no-op before [`initialize`](Self::initialize).
    pub async fn stop(&self) {
        let state = self.state();
        if state == EngineState::Uninitialized || state.is_stopped() {
            return;
        }
        self.apply(EngineEvent::StopRequested);

        let handle = self.inner.schedule.lock().await.take();
        if let Some(handle) = handle {
            handle.shutdown().await;
        }
        // Wait out a manual cycle or resync.
        drop(self.inner.cycle_lock.lock().await);

        tracing::info!(repository = %self.inner.repository, "Engine stopped");
    }

    /// Run one sync cycle now.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the issue cursor, fetching issues or
    /// persisting them failed; cursors are then unchanged. Thread failures
    /// are reported in the returned [`CycleReport`] instead.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        self.ensure_running("run a cycle")?;
        let _guard = self.inner.cycle_lock.lock().await;
        self.cycle().await
    }

    fn ensure_running(&self, operation: &'static str) -> Result<()> {
        let state = self.state();
        if state.is_stopped() {
            return Err(EngineError::InvalidState {
                operation,
                state: state.name(),
            });
        }
        Ok(())
    }

    /// The cycle body. Callers hold `cycle_lock`.
    async fn cycle(&self) -> Result<CycleReport> {
        let repository = &self.inner.repository;
        let store = &self.inner.store;
        let started_at = now();

        let since = store.issue_cursor(repository).await?;
        tracing::info!(
            repository = %repository,
            since = ?since,
            "Cycle started"
        );

        let issues = self.inner.fetcher.fetch_issues(repository, since).await?;
        let mut report = CycleReport::new(started_at, since);
        report.issues_fetched = issues.len();

        if !issues.is_empty() {
            store.save_issues(&issues).await?;
            store.set_issue_cursor(repository, started_at).await?;
        }

        for issue in &issues {
            match self.sync_thread(issue, started_at).await {
                Ok(Some(written)) => {
                    report.threads_synced += 1;
                    report.comments_written += written;
                }
                Ok(None) => report.threads_skipped += 1,
                Err(e) => {
                    tracing::warn!(
                        repository = %repository,
                        issue = issue.number,
                        retryable = e.is_retryable(),
                        "Comment sync failed: {}",
                        e
                    );
                    report.failures.push(ThreadFailure {
                        issue_id: issue.id,
                        number: issue.number,
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            repository = %repository,
            issues = report.issues_fetched,
            threads_synced = report.threads_synced,
            threads_skipped = report.threads_skipped,
            comments = report.comments_written,
            failures = report.failures.len(),
            "Cycle finished"
        );
        Ok(report)
    }

    /// Sync one issue's comments if stale. Returns the comments written, or
    /// `None` when the thread was skipped.
    async fn sync_thread(&self, issue: &Issue, started_at: DateTime<Utc>) -> Result<Option<usize>> {
        let repository = &self.inner.repository;
        let cursor = self.inner.store.comment_cursor(issue.id, repository).await?;

        let since = match plan_thread(issue.comment_count, issue.updated_at, cursor) {
            ThreadPlan::Skip(reason) => {
                tracing::trace!(issue = issue.number, ?reason, "Thread skipped");
                return Ok(None);
            }
            ThreadPlan::Fetch { since } => since,
        };

        let comments = self.inner.fetcher.fetch_comments(issue, since).await?;
        let write = self
            .inner
            .store
            .save_comments(issue.id, repository, &comments)
            .await?;
        self.inner
            .store
            .set_comment_cursor(issue.id, repository, started_at)
            .await?;

        tracing::debug!(
            issue = issue.number,
            mode = ?write.mode,
            written = write.written,
            "Thread synced"
        );
        Ok(Some(write.written))
    }

    /// Discard an issue's stored thread and fetch it again in full.
    ///
    /// An unknown issue number is reported as [`ResyncOutcome::NotFound`].
    pub async fn force_resync_comments(&self, number: i64) -> Result<ResyncOutcome> {
        self.ensure_running("resync comments")?;
        let _guard = self.inner.cycle_lock.lock().await;
        let repository = &self.inner.repository;
        let store = &self.inner.store;

        let Some(issue) = store.find_issue(repository, number).await? else {
            tracing::info!(repository = %repository, issue = number, "Resync skipped: issue not stored");
            return Ok(ResyncOutcome::NotFound);
        };

        let started_at = now();
        store.clear_comment_cursor(issue.id, repository).await?;
        let comments = self.inner.fetcher.fetch_comments(&issue, None).await?;
        let write = store.save_comments(issue.id, repository, &comments).await?;
        store
            .set_comment_cursor(issue.id, repository, started_at)
            .await?;

        tracing::info!(
            repository = %repository,
            issue = number,
            comments = write.written,
            removed = write.removed,
            "Thread resynced"
        );
        Ok(ResyncOutcome::Resynced {
            issue_id: issue.id,
            comments: write.written,
        })
    }

    /// Stored comments of an issue, oldest first.
    pub async fn comments(&self, number: i64) -> Result<Vec<Comment>> {
        Ok(self
            .inner
            .store
            .comments_for_issue(&self.inner.repository, number)
            .await?)
    }

    /// Substring search over stored issues.
    pub async fn search_issues(&self, text: &str, limit: Option<u32>) -> Result<Vec<Issue>> {
        Ok(self
            .inner
            .store
            .search_issues(
                &self.inner.repository,
                text,
                limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            )
            .await?)
    }

    /// Substring search over stored comments.
    pub async fn search_comments(&self, text: &str, limit: Option<u32>) -> Result<Vec<Comment>> {
        Ok(self
            .inner
            .store
            .search_comments(
                &self.inner.repository,
                text,
                limit.unwrap_or(DEFAULT_SEARCH_LIMIT),
            )
            .await?)
    }

    /// Counts and cursor state of the mirror.
    pub async fn status(&self) -> Result<RepoStatus> {
        Ok(self.inner.store.status(&self.inner.repository).await?)
    }

    /// Delete everything stored for this repository.
    pub async fn cleanup(&self) -> Result<CleanupSummary> {
        let _guard = self.inner.cycle_lock.lock().await;
        Ok(self.inner.store.cleanup(&self.inner.repository).await?)
    }
}

/// Wall-clock time at the store's millisecond precision, so a report's
/// `started_at` equals the cursor written from it.
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Endpoint, MockRemote, RemoteError};
    use serde_json::{json, Value};
    use sync_store::SqliteStorage;
    use tokio::sync::Notify;

    fn scope() -> RepoScope {
        RepoScope::parse("octo/hello").unwrap()
    }

    fn issue_json(id: i64, number: i64, comments: u32, updated: &str) -> Value {
        json!({
            "id": id,
            "number": number,
            "title": format!("Issue {number}"),
            "body": "details",
            "state": "open",
            "labels": [],
            "user": { "login": "alice" },
            "comments": comments,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": updated,
        })
    }

    fn comment_json(id: i64, number: i64, updated: &str) -> Value {
        json!({
            "id": id,
            "body": format!("comment {id}"),
            "user": { "login": "bob" },
            "created_at": updated,
            "updated_at": updated,
            "issue_url": format!("https://api.github.com/repos/octo/hello/issues/{number}"),
        })
    }

    fn fast_options(max_attempts: u32) -> EngineOptions {
        EngineOptions {
            poll_interval: Duration::from_secs(3600),
            max_pages: 1000,
            bootstrap: BackoffConfig {
                initial_delay: Duration::from_millis(1),
                factor: 1.0,
                max_delay: Duration::from_millis(1),
                max_attempts,
                jitter: false,
            },
        }
    }

    async fn engine_with(remote: &MockRemote) -> (SyncEngine<MockRemote>, Arc<SqliteStorage>) {
        let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let engine = SyncEngine::new(
            scope(),
            Arc::new(remote.clone()),
            store.clone(),
            fast_options(0),
        );
        (engine, store)
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[tokio::test]
    async fn first_cycle_mirrors_issues_and_threads() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![
                issue_json(1, 1, 2, "2024-01-02T00:00:00Z"),
                issue_json(2, 2, 0, "2024-01-03T00:00:00Z"),
            ],
        );
        remote.set_records(
            Endpoint::comments(&scope(), 1),
            vec![
                comment_json(10, 1, "2024-01-02T00:00:00Z"),
                comment_json(11, 1, "2024-01-02T00:00:01Z"),
            ],
        );
        let (engine, store) = engine_with(&remote).await;

        let report = engine.run_cycle().await.unwrap();

        assert_eq!(report.since, None);
        assert_eq!(report.issues_fetched, 2);
        assert_eq!(report.threads_synced, 1);
        assert_eq!(report.threads_skipped, 1);
        assert_eq!(report.comments_written, 2);
        assert!(report.failures.is_empty());

        assert_eq!(
            store.issue_cursor(&scope()).await.unwrap(),
            Some(report.started_at)
        );
        assert_eq!(
            store.comment_cursor(IssueId::new(1), &scope()).await.unwrap(),
            Some(report.started_at)
        );
        // Zero-comment issues never get a cursor.
        assert_eq!(store.comment_cursor(IssueId::new(2), &scope()).await.unwrap(), None);
        assert_eq!(engine.comments(1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_fetch_leaves_issue_cursor_unset() {
        let remote = MockRemote::new();
        let (engine, store) = engine_with(&remote).await;

        let report = engine.run_cycle().await.unwrap();

        assert_eq!(report.issues_fetched, 0);
        assert_eq!(store.issue_cursor(&scope()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn second_cycle_uses_the_cursor() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![issue_json(1, 1, 0, "2024-01-02T00:00:00Z")],
        );
        let (engine, _store) = engine_with(&remote).await;

        let first = engine.run_cycle().await.unwrap();
        let second = engine.run_cycle().await.unwrap();

        assert_eq!(second.since, Some(first.started_at));
        // The remote filtered the old issue out.
        assert_eq!(second.issues_fetched, 0);
    }

    #[tokio::test]
    async fn fresh_thread_is_not_refetched() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![issue_json(1, 1, 3, "2024-01-02T00:00:00Z")],
        );
        let (engine, store) = engine_with(&remote).await;
        // Comments already synced after the issue's last update.
        store
            .set_comment_cursor(IssueId::new(1), &scope(), at("2024-01-05T00:00:00Z"))
            .await
            .unwrap();

        let report = engine.run_cycle().await.unwrap();

        assert_eq!(report.threads_skipped, 1);
        assert!(remote.requests_for(&Endpoint::comments(&scope(), 1)).is_empty());
    }

    #[tokio::test]
    async fn updated_issue_refetches_since_comment_cursor() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![issue_json(1, 1, 2, "2024-01-09T00:00:00Z")],
        );
        remote.set_records(
            Endpoint::comments(&scope(), 1),
            vec![
                comment_json(10, 1, "2024-01-02T00:00:00Z"),
                comment_json(11, 1, "2024-01-09T00:00:00Z"),
            ],
        );
        let (engine, store) = engine_with(&remote).await;
        store
            .set_comment_cursor(IssueId::new(1), &scope(), at("2024-01-05T00:00:00Z"))
            .await
            .unwrap();

        let report = engine.run_cycle().await.unwrap();

        assert_eq!(report.threads_synced, 1);
        // Only the comment newer than the cursor came back, and was merged.
        assert_eq!(report.comments_written, 1);
        let requests = remote.requests_for(&Endpoint::comments(&scope(), 1));
        assert!(requests[0]
            .iter()
            .any(|(k, v)| k == "since" && v == "2024-01-05T00:00:00Z"));
    }

    #[tokio::test]
    async fn failing_thread_is_reported_and_siblings_sync() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![
                issue_json(1, 1, 1, "2024-01-02T00:00:00Z"),
                issue_json(2, 2, 1, "2024-01-03T00:00:00Z"),
            ],
        );
        remote.set_records(
            Endpoint::comments(&scope(), 2),
            vec![comment_json(20, 2, "2024-01-03T00:00:00Z")],
        );
        remote.break_endpoint(Endpoint::comments(&scope(), 1));
        let (engine, store) = engine_with(&remote).await;

        let report = engine.run_cycle().await.unwrap();

        assert_eq!(report.threads_synced, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].number, 1);
        assert_eq!(report.clone().into_outcome().label(), "partial");

        // The failed thread stays stale for the next cycle.
        assert_eq!(store.comment_cursor(IssueId::new(1), &scope()).await.unwrap(), None);
        assert!(store.comment_cursor(IssueId::new(2), &scope()).await.unwrap().is_some());
        // Issues were still persisted.
        assert_eq!(store.status(&scope()).await.unwrap().issue_count, 2);
    }

    #[tokio::test]
    async fn issue_fetch_failure_aborts_without_moving_cursors() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![issue_json(1, 1, 0, "2024-01-02T00:00:00Z")],
        );
        remote.fail_next_fetch(Endpoint::issues(&scope()), 503);
        let (engine, store) = engine_with(&remote).await;

        let err = engine.run_cycle().await.unwrap_err();

        assert!(matches!(err, EngineError::Remote(_)));
        assert_eq!(store.issue_cursor(&scope()).await.unwrap(), None);
        assert_eq!(store.status(&scope()).await.unwrap().issue_count, 0);
    }

    #[tokio::test]
    async fn resync_of_unknown_issue_is_not_found() {
        let remote = MockRemote::new();
        let (engine, _store) = engine_with(&remote).await;

        let outcome = engine.force_resync_comments(404).await.unwrap();
        assert_eq!(outcome, ResyncOutcome::NotFound);
        assert!(remote.requests().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_retries_rejected_probe() {
        let remote = MockRemote::new();
        remote.fail_next_validate(503);
        remote.fail_next_validate(401);
        let (engine, _store) = engine_with(&remote).await;

        engine.bootstrap().await.unwrap();

        assert_eq!(remote.validate_calls(), 3);
        assert_eq!(engine.state(), EngineState::Steady);
    }

    #[tokio::test]
    async fn bootstrap_retries_failed_first_cycle() {
        let remote = MockRemote::new();
        remote.fail_next_fetch(Endpoint::issues(&scope()), 500);
        let (engine, _store) = engine_with(&remote).await;

        engine.bootstrap().await.unwrap();

        // Validation is repeated with the cycle as one unit.
        assert_eq!(remote.validate_calls(), 2);
        assert!(engine.state().is_steady());
    }

    #[tokio::test]
    async fn bounded_bootstrap_gives_up() {
        let remote = MockRemote::new();
        for _ in 0..3 {
            remote.fail_next_validate(401);
        }
        let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let engine = SyncEngine::new(scope(), Arc::new(remote.clone()), store, fast_options(3));

        let err = engine.initialize().await.unwrap_err();

        assert!(matches!(err, EngineError::Remote(_)));
        assert_eq!(remote.validate_calls(), 3);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(engine.outcomes().await.is_none());
    }

    #[tokio::test]
    async fn initialize_twice_is_rejected() {
        let remote = MockRemote::new();
        let (engine, _store) = engine_with(&remote).await;

        engine.initialize().await.unwrap();
        let err = engine.initialize().await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidState { .. }));

        engine.stop().await;
    }

    #[tokio::test]
    async fn initialize_publishes_first_outcome() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![issue_json(1, 1, 0, "2024-01-02T00:00:00Z")],
        );
        let (engine, _store) = engine_with(&remote).await;

        let report = engine.initialize().await.unwrap();
        let outcomes = engine.outcomes().await.unwrap();

        assert_eq!(*outcomes.borrow(), Some(CycleOutcome::Success(report)));
        engine.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_blocks_new_cycles() {
        let remote = MockRemote::new();
        let (engine, _store) = engine_with(&remote).await;

        // Before initialize: nothing happens.
        engine.stop().await;
        assert_eq!(engine.state(), EngineState::Uninitialized);

        engine.initialize().await.unwrap();
        engine.stop().await;
        engine.stop().await;

        assert!(engine.state().is_stopped());
        assert!(engine.outcomes().await.is_none());
        assert!(matches!(
            engine.run_cycle().await,
            Err(EngineError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn failed_resync_leaves_thread_without_cursor() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![issue_json(1, 1, 1, "2024-01-02T00:00:00Z")],
        );
        remote.set_records(
            Endpoint::comments(&scope(), 1),
            vec![comment_json(10, 1, "2024-01-02T00:00:00Z")],
        );
        let (engine, store) = engine_with(&remote).await;
        engine.run_cycle().await.unwrap();
        remote.fail_next_fetch(Endpoint::comments(&scope(), 1), 500);

        let result = engine.force_resync_comments(1).await;

        assert!(matches!(result, Err(EngineError::Remote(_))));
        assert_eq!(store.comment_cursor(IssueId::new(1), &scope()).await.unwrap(), None);
        // Stored comments stay until a fetch succeeds.
        assert_eq!(engine.comments(1).await.unwrap().len(), 1);

        // The issue did not change upstream, so the next cycle leaves the thread alone.
        let report = engine.run_cycle().await.unwrap();
        assert_eq!(report.issues_fetched, 0);
        assert_eq!(store.comment_cursor(IssueId::new(1), &scope()).await.unwrap(), None);

        // Retrying the resync restores the cursor.
        engine.force_resync_comments(1).await.unwrap();
        assert!(store
            .comment_cursor(IssueId::new(1), &scope())
            .await
            .unwrap()
            .is_some());
    }

    /// Remote whose credential probe blocks until released.
    struct GatedRemote {
        inner: MockRemote,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl RemoteSource for GatedRemote {
        async fn validate(&self) -> std::result::Result<(), RemoteError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.validate().await
        }

        async fn fetch_page(
            &self,
            endpoint: &Endpoint,
            params: &[(String, String)],
        ) -> std::result::Result<Vec<Value>, RemoteError> {
            self.inner.fetch_page(endpoint, params).await
        }
    }

    #[tokio::test]
    async fn stop_during_credential_probe_prevents_first_cycle() {
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope()),
            vec![issue_json(1, 1, 0, "2024-01-02T00:00:00Z")],
        );
        let gated = Arc::new(GatedRemote {
            inner: remote.clone(),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        });
        let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
        let engine = SyncEngine::new(scope(), gated.clone(), store.clone(), fast_options(0));

        let bootstrap = tokio::spawn({
            let engine = engine.clone();
            async move { engine.bootstrap().await }
        });
        gated.entered.notified().await;
        engine.stop().await;
        gated.release.notify_one();

        let result = bootstrap.await.unwrap();

        assert!(matches!(result, Err(EngineError::InvalidState { .. })));
        assert!(engine.state().is_stopped());
        assert!(remote.requests().is_empty());
        assert_eq!(store.status(&scope()).await.unwrap().issue_count, 0);
        assert_eq!(store.issue_cursor(&scope()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn queries_use_default_limit() {
        let remote = MockRemote::new();
        let records: Vec<_> = (1..=60)
            .map(|n| issue_json(n, n, 0, &format!("2024-01-01T00:{:02}:00Z", n - 1)))
            .collect();
        remote.set_records(Endpoint::issues(&scope()), records);
        let (engine, _store) = engine_with(&remote).await;
        engine.run_cycle().await.unwrap();

        assert_eq!(engine.search_issues("issue", None).await.unwrap().len(), 50);
        assert_eq!(engine.search_issues("issue", Some(5)).await.unwrap().len(), 5);
        assert!(engine.search_comments("anything", None).await.unwrap().is_empty());
    }
}

//! End-to-end scenarios: engine, mock remote and a real SQLite store.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use issue_sync_engine::{
    BackoffConfig, CycleOutcome, EngineOptions, Endpoint, IssueId, MirrorStorage, MockRemote,
    RepoScope, ResyncOutcome, SqliteStorage, SyncEngine,
};

fn repo(name: &str) -> RepoScope {
    RepoScope::parse(name).unwrap()
}

fn issue(id: i64, number: i64, comments: u32, updated: &str) -> Value {
    json!({
        "id": id,
        "number": number,
        "title": format!("Issue {number}"),
        "body": "steps to reproduce",
        "state": "open",
        "labels": [{ "name": "bug" }],
        "user": { "login": "alice" },
        "assignee": null,
        "comments": comments,
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": updated,
        "closed_at": null,
    })
}

fn comment(id: i64, scope: &RepoScope, number: i64, created: &str) -> Value {
    json!({
        "id": id,
        "body": format!("comment {id}"),
        "user": { "login": "bob" },
        "created_at": created,
        "updated_at": created,
        "issue_url": format!("https://api.github.com/repos/{scope}/issues/{number}"),
    })
}

fn options() -> EngineOptions {
    EngineOptions {
        poll_interval: Duration::from_secs(3600),
        max_pages: 1000,
        bootstrap: BackoffConfig {
            initial_delay: Duration::from_millis(1),
            factor: 2.0,
            max_delay: Duration::from_millis(10),
            max_attempts: 0,
            jitter: true,
        },
    }
}

fn engine(
    scope: &RepoScope,
    remote: &MockRemote,
    store: &Arc<SqliteStorage>,
) -> SyncEngine<MockRemote> {
    SyncEngine::new(scope.clone(), Arc::new(remote.clone()), store.clone(), options())
}

#[tokio::test]
async fn two_issue_repository_first_cycle() {
    let scope = repo("octo/hello");
    let remote = MockRemote::new();
    remote.set_records(
        Endpoint::issues(&scope),
        vec![
            issue(1, 1, 3, "2024-01-02T00:00:00Z"),
            issue(2, 2, 0, "2024-01-03T00:00:00Z"),
        ],
    );
    remote.set_records(
        Endpoint::comments(&scope, 1),
        vec![
            comment(101, &scope, 1, "2024-01-02T00:00:01Z"),
            comment(102, &scope, 1, "2024-01-02T00:00:02Z"),
            comment(103, &scope, 1, "2024-01-02T00:00:03Z"),
        ],
    );
    let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let engine = engine(&scope, &remote, &store);

    let report = engine.run_cycle().await.unwrap();

    let status = engine.status().await.unwrap();
    assert_eq!(status.issue_count, 2);
    assert_eq!(status.comment_count, 3);
    assert_eq!(status.last_issue_sync, Some(report.started_at));
    assert_eq!(status.synced_threads, 1);
    assert!(store.comment_cursor(IssueId::new(1), &scope).await.unwrap().is_some());
    assert!(store.comment_cursor(IssueId::new(2), &scope).await.unwrap().is_none());
    assert!(remote.requests_for(&Endpoint::comments(&scope, 2)).is_empty());

    let thread: Vec<_> = engine
        .comments(1)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.body)
        .collect();
    assert_eq!(thread, vec!["comment 101", "comment 102", "comment 103"]);
}

#[tokio::test]
async fn force_resync_replaces_the_thread() {
    let scope = repo("octo/hello");
    let remote = MockRemote::new();
    remote.set_records(
        Endpoint::issues(&scope),
        vec![issue(4200, 42, 5, "2024-02-01T00:00:00Z")],
    );
    remote.set_records(
        Endpoint::comments(&scope, 42),
        (1..=5)
            .map(|n| comment(n, &scope, 42, &format!("2024-02-01T00:00:0{n}Z")))
            .collect(),
    );
    let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let engine = engine(&scope, &remote, &store);
    engine.run_cycle().await.unwrap();
    assert_eq!(engine.comments(42).await.unwrap().len(), 5);
    let before = store
        .comment_cursor(IssueId::new(4200), &scope)
        .await
        .unwrap()
        .unwrap();

    // Three comments were deleted upstream.
    remote.set_records(
        Endpoint::comments(&scope, 42),
        vec![
            comment(2, &scope, 42, "2024-02-01T00:00:02Z"),
            comment(4, &scope, 42, "2024-02-01T00:00:04Z"),
        ],
    );
    tokio::time::sleep(Duration::from_millis(5)).await;

    let outcome = engine.force_resync_comments(42).await.unwrap();

    assert_eq!(
        outcome,
        ResyncOutcome::Resynced {
            issue_id: IssueId::new(4200),
            comments: 2,
        }
    );
    let ids: Vec<_> = engine
        .comments(42)
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id.value())
        .collect();
    assert_eq!(ids, vec![2, 4]);
    let after = store
        .comment_cursor(IssueId::new(4200), &scope)
        .await
        .unwrap()
        .unwrap();
    assert!(after > before);

    // The resync fetched the whole thread, without a watermark.
    let last = remote
        .requests_for(&Endpoint::comments(&scope, 42))
        .pop()
        .unwrap();
    assert!(!last.iter().any(|(k, _)| k == "since"));
}

#[tokio::test]
async fn cleanup_leaves_other_repositories_alone() {
    let hello = repo("octo/hello");
    let world = repo("octo/world");
    let remote = MockRemote::new();
    for (scope, id) in [(&hello, 1), (&world, 2)] {
        remote.set_records(
            Endpoint::issues(scope),
            vec![issue(id, 7, 1, "2024-03-01T00:00:00Z")],
        );
        remote.set_records(
            Endpoint::comments(scope, 7),
            vec![comment(id * 100, scope, 7, "2024-03-01T00:00:00Z")],
        );
    }
    let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let hello_engine = engine(&hello, &remote, &store);
    let world_engine = engine(&world, &remote, &store);
    hello_engine.run_cycle().await.unwrap();
    world_engine.run_cycle().await.unwrap();

    let summary = hello_engine.cleanup().await.unwrap();
    assert_eq!(summary.issues, 1);
    assert_eq!(summary.comments, 1);
    assert_eq!(summary.comment_cursors, 1);
    assert_eq!(summary.repo_cursors, 1);

    let gone = hello_engine.status().await.unwrap();
    assert_eq!(gone.issue_count, 0);
    assert_eq!(gone.comment_count, 0);
    assert_eq!(gone.last_issue_sync, None);
    assert_eq!(gone.synced_threads, 0);

    let kept = world_engine.status().await.unwrap();
    assert_eq!(kept.issue_count, 1);
    assert_eq!(kept.comment_count, 1);
    assert!(kept.last_issue_sync.is_some());
    assert_eq!(kept.synced_threads, 1);
    assert_eq!(world_engine.comments(7).await.unwrap().len(), 1);
}

#[tokio::test]
async fn search_is_scoped_to_the_engine_repository() {
    let hello = repo("octo/hello");
    let world = repo("octo/world");
    let remote = MockRemote::new();
    remote.set_records(
        Endpoint::issues(&hello),
        vec![issue(1, 1, 0, "2024-03-01T00:00:00Z")],
    );
    remote.set_records(
        Endpoint::issues(&world),
        vec![issue(2, 1, 0, "2024-03-01T00:00:00Z")],
    );
    let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let hello_engine = engine(&hello, &remote, &store);
    engine(&world, &remote, &store).run_cycle().await.unwrap();
    hello_engine.run_cycle().await.unwrap();

    let hits = hello_engine.search_issues("REPRODUCE", None).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].repository, hello);
}

#[tokio::test]
async fn bootstrap_survives_transient_failures_then_polls() {
    let scope = repo("octo/hello");
    let remote = MockRemote::new();
    remote.set_records(
        Endpoint::issues(&scope),
        vec![issue(1, 1, 0, "2024-01-02T00:00:00Z")],
    );
    remote.fail_next_validate(502);
    remote.fail_next_transport(Endpoint::issues(&scope), "connection reset");
    let store = Arc::new(SqliteStorage::in_memory().await.unwrap());
    let engine = engine(&scope, &remote, &store);

    let report = engine.initialize().await.unwrap();

    assert_eq!(report.issues_fetched, 1);
    assert!(engine.state().is_steady());
    let outcomes = engine.outcomes().await.unwrap();
    assert!(matches!(*outcomes.borrow(), Some(CycleOutcome::Success(_))));

    engine.stop().await;
    assert!(engine.state().is_stopped());
}

#[tokio::test]
async fn mirror_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mirror.db");
    let scope = repo("octo/hello");
    let remote = MockRemote::new();
    remote.set_records(
        Endpoint::issues(&scope),
        vec![issue(1, 1, 1, "2024-01-02T00:00:00Z")],
    );
    remote.set_records(
        Endpoint::comments(&scope, 1),
        vec![comment(10, &scope, 1, "2024-01-02T00:00:00Z")],
    );

    let first = {
        let store = Arc::new(SqliteStorage::new(&path).await.unwrap());
        engine(&scope, &remote, &store).run_cycle().await.unwrap()
    };

    let store = Arc::new(SqliteStorage::new(&path).await.unwrap());
    let reopened = engine(&scope, &remote, &store);
    let second = reopened.run_cycle().await.unwrap();

    // The cursor written before the reopen drives the next fetch.
    assert_eq!(second.since, Some(first.started_at));
    assert_eq!(reopened.comments(1).await.unwrap().len(), 1);
}

//! Resync command.

use crate::config::AppContext;
use anyhow::Result;
use std::sync::Arc;
use sync_engine::{RemoteSource, ResyncOutcome};

/// Drop the comment cursor of one issue and fetch its whole thread again.
pub async fn run<R: RemoteSource + 'static>(
    ctx: &AppContext,
    remote: Arc<R>,
    repo: &str,
    number: i64,
) -> Result<()> {
    let scope = ctx.repository(repo)?;
    let engine = ctx.one_shot_engine(scope.clone(), remote);

    match engine.force_resync_comments(number).await? {
        ResyncOutcome::NotFound => {
            anyhow::bail!("Issue #{number} of {scope} is not mirrored; run `issue-sync sync {scope}`")
        }
        ResyncOutcome::Resynced { comments, .. } => {
            println!("{scope}#{number}: thread replaced, {comments} comments stored");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sync_engine::{Endpoint, MirrorStorage, MockRemote};
    use sync_types::RepoScope;
    use tempfile::tempdir;

    #[tokio::test]
    async fn resync_replaces_the_thread() {
        let temp = tempdir().unwrap();
        let ctx = AppContext::load(None, temp.path()).await.unwrap();
        let scope = RepoScope::parse("octo/hello").unwrap();
        let remote = MockRemote::new();
        remote.set_records(
            Endpoint::issues(&scope),
            vec![json!({
                "id": 500,
                "number": 5,
                "title": "Thread",
                "body": "",
                "state": "open",
                "labels": [],
                "user": { "login": "alice" },
                "assignee": null,
                "comments": 1,
                "created_at": "2024-01-01T00:00:00Z",
                "updated_at": "2024-01-02T00:00:00Z",
                "closed_at": null,
            })],
        );
        remote.set_records(
            Endpoint::comments(&scope, 5),
            vec![json!({
                "id": 51,
                "body": "first",
                "user": { "login": "bob" },
                "created_at": "2024-01-02T00:00:00Z",
                "updated_at": "2024-01-02T00:00:00Z",
                "issue_url": "https://api.github.com/repos/octo/hello/issues/5",
            })],
        );
        let remote = Arc::new(remote);
        crate::commands::sync::run(&ctx, Arc::clone(&remote), &["octo/hello".into()])
            .await
            .unwrap();

        remote.set_records(Endpoint::comments(&scope, 5), Vec::new());
        run(&ctx, Arc::clone(&remote), "octo/hello", 5).await.unwrap();

        assert!(ctx.store().comments_for_issue(&scope, 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn resync_of_unknown_issue_fails() {
        let temp = tempdir().unwrap();
        let ctx = AppContext::load(None, temp.path()).await.unwrap();

        let result = run(&ctx, Arc::new(MockRemote::new()), "octo/hello", 99).await;
        assert!(result.is_err());
    }
}

//! Cleanup command.

use crate::config::AppContext;
use anyhow::Result;
use sync_store::MirrorStorage;

/// Delete every mirrored row and cursor of one repository.
pub async fn run(ctx: &AppContext, repo: &str) -> Result<()> {
    let scope = ctx.repository(repo)?;
    let summary = ctx.store().cleanup(&scope).await?;

    println!(
        "{scope}: removed {} issues, {} comments, {} comment cursors, {} repository cursors",
        summary.issues, summary.comments, summary.comment_cursors, summary.repo_cursors
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sync_types::RepoScope;
    use tempfile::tempdir;

    #[tokio::test]
    async fn cleanup_drops_cursor() {
        let temp = tempdir().unwrap();
        let ctx = AppContext::load(None, temp.path()).await.unwrap();
        let scope = RepoScope::parse("octo/hello").unwrap();
        ctx.store().set_issue_cursor(&scope, Utc::now()).await.unwrap();

        run(&ctx, "octo/hello").await.unwrap();

        assert!(ctx.store().issue_cursor(&scope).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn cleanup_of_empty_mirror_succeeds() {
        let temp = tempdir().unwrap();
        let ctx = AppContext::load(None, temp.path()).await.unwrap();

        assert!(run(&ctx, "octo/hello").await.is_ok());
    }
}

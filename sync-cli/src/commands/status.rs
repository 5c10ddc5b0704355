//! Status command.

use super::format_time;
use crate::config::AppContext;
use anyhow::Result;
use sync_store::{MirrorStorage, RepoStatus};

/// Print mirror status for one repository, or for every configured one.
pub async fn run(ctx: &AppContext, repo: Option<&str>) -> Result<()> {
    let scopes = match repo {
        Some(name) => vec![ctx.repository(name)?],
        None => ctx.repositories(&[])?,
    };

    println!("Database: {}", ctx.database_path().display());
    let store = ctx.store();
    for scope in scopes {
        let status = store.status(&scope).await?;
        println!();
        println!("{}", render(&status));
    }
    Ok(())
}

/// Multi-line human rendering of a [`RepoStatus`].
pub fn render(status: &RepoStatus) -> String {
    [
        status.repository.to_string(),
        format!(
            "  Issues:          {} ({} open)",
            status.issue_count, status.open_issue_count
        ),
        format!("  Comments:        {}", status.comment_count),
        format!("  Synced threads:  {}", status.synced_threads),
        format!("  Last issue sync: {}", format_time(status.last_issue_sync)),
        format!("  Newest issue:    {}", format_time(status.latest_issue_update)),
        format!("  Newest comment:  {}", format_time(status.latest_comment_update)),
    ]
    .join("\n")
}

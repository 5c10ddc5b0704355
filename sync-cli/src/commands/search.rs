//! Search command.

use super::{format_time, snippet};
use crate::config::AppContext;
use anyhow::Result;
use sync_store::{MirrorStorage, DEFAULT_SEARCH_LIMIT};
use sync_types::{Comment, Issue};

const SNIPPET_CHARS: usize = 72;

/// Search issues (or comments) of one repository and print the hits.
pub async fn run(
    ctx: &AppContext,
    repo: &str,
    text: &str,
    comments: bool,
    limit: Option<u32>,
) -> Result<()> {
    let scope = ctx.repository(repo)?;
    let limit = limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let store = ctx.store();

    let lines: Vec<String> = if comments {
        store
            .search_comments(&scope, text, limit)
            .await?
            .iter()
            .map(render_comment)
            .collect()
    } else {
        store
            .search_issues(&scope, text, limit)
            .await?
            .iter()
            .map(render_issue)
            .collect()
    };

    if lines.is_empty() {
        println!("No matches for {text:?} in {scope}");
    }
    for line in lines {
        println!("{line}");
    }
    Ok(())
}

/// One line per issue hit.
pub fn render_issue(issue: &Issue) -> String {
    let kind = if issue.is_pull_request { "PR" } else { "issue" };
    format!(
        "#{:<6} {:<6} [{}] {} (by {}, updated {})",
        issue.number,
        kind,
        issue.state,
        snippet(&issue.title, SNIPPET_CHARS),
        issue.author,
        format_time(Some(issue.updated_at)),
    )
}

/// One line per comment hit.
pub fn render_comment(comment: &Comment) -> String {
    format!(
        "comment {} on issue {} by {} ({}): {}",
        comment.id.value(),
        comment.issue_id,
        comment.author,
        format_time(Some(comment.updated_at)),
        snippet(&comment.body, SNIPPET_CHARS),
    )
}

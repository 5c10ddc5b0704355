//! Comments command.

use super::format_time;
use crate::config::AppContext;
use anyhow::Result;
use sync_store::MirrorStorage;
use sync_types::{Comment, Issue};

/// Print an issue header followed by its stored thread, oldest first.
pub async fn run(ctx: &AppContext, repo: &str, number: i64) -> Result<()> {
    let scope = ctx.repository(repo)?;
    let store = ctx.store();

    let Some(issue) = store.find_issue(&scope, number).await? else {
        anyhow::bail!("Issue #{number} of {scope} is not mirrored; run `issue-sync sync {scope}`");
    };
    let thread = store.comments_for_issue(&scope, number).await?;

    println!("{}", render(&issue, &thread));
    Ok(())
}

/// Render an issue with its comments.
pub fn render(issue: &Issue, thread: &[Comment]) -> String {
    let mut out = format!(
        "#{} {} [{}]\nOpened by {} on {}, {} comments",
        issue.number,
        issue.title,
        issue.state,
        issue.author,
        format_time(Some(issue.created_at)),
        thread.len(),
    );
    if !issue.labels.is_empty() {
        out.push_str(&format!("\nLabels: {}", issue.labels.join(", ")));
    }
    for comment in thread {
        out.push_str(&format!(
            "\n\n--- {} at {}\n{}",
            comment.author,
            format_time(Some(comment.created_at)),
            comment.body.trim_end()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sync_types::{CommentId, IssueId, RepoScope};
    use tempfile::tempdir;

    fn issue() -> Issue {
        Issue {
            id: IssueId::new(7),
            number: 3,
            title: "Flaky test".into(),
            body: String::new(),
            state: "closed".into(),
            labels: vec!["ci".into(), "flaky".into()],
            assignee: Some("carol".into()),
            author: "alice".into(),
            comment_count: 1,
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap(),
            closed_at: Some(Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap()),
            repository: RepoScope::parse("octo/hello").unwrap(),
            is_pull_request: false,
        }
    }

    fn comment() -> Comment {
        Comment {
            id: CommentId::new(70),
            issue_id: IssueId::new(7),
            body: "Fixed by retrying\n".into(),
            author: "bob".into(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 2, 11, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2024, 5, 2, 11, 0, 0).unwrap(),
            repository: RepoScope::parse("octo/hello").unwrap(),
        }
    }

    #[tokio::test]
    async fn unknown_issue_is_an_error() {
        let temp = tempdir().unwrap();
        let ctx = AppContext::load(None, temp.path()).await.unwrap();

        assert!(run(&ctx, "octo/hello", 3).await.is_err());
    }

    #[tokio::test]
    async fn stored_thread_prints() {
        let temp = tempdir().unwrap();
        let ctx = AppContext::load(None, temp.path()).await.unwrap();
        let store = ctx.store();
        store.save_issues(&[issue()]).await.unwrap();
        store
            .save_comments(IssueId::new(7), &issue().repository, &[comment()])
            .await
            .unwrap();

        assert!(run(&ctx, "octo/hello", 3).await.is_ok());
    }

    #[test]
    fn render_includes_labels_and_comments() {
        let text = render(&issue(), &[comment()]);

        assert!(text.starts_with("#3 Flaky test [closed]"));
        assert!(text.contains("Labels: ci, flaky"));
        assert!(text.ends_with("--- bob at 2024-05-02 11:00:00 UTC\nFixed by retrying"));
    }
}

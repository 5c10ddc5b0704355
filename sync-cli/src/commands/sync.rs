//! One-shot sync command.

use crate::config::AppContext;
use anyhow::Result;
use std::sync::Arc;
use sync_engine::{CycleOutcome, CycleReport, RemoteSource};
use sync_types::RepoScope;

/// Bootstrap every repository once and print what each cycle did.
///
/// Every repository is attempted; the command fails if any of them did.
pub async fn run<R: RemoteSource + 'static>(
    ctx: &AppContext,
    remote: Arc<R>,
    repos: &[String],
) -> Result<()> {
    let scopes = ctx.repositories(repos)?;
    let total = scopes.len();
    let mut failed = 0;

    for scope in scopes {
        let engine = ctx.one_shot_engine(scope.clone(), Arc::clone(&remote));
        match engine.bootstrap().await {
            Ok(report) => println!("{}", render_report(&scope, &report)),
            Err(e) => {
                failed += 1;
                eprintln!("{scope}: sync failed: {e}");
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {total} repositories failed to sync");
    }
    Ok(())
}

/// One line summarizing a cycle, followed by one line per failed thread.
pub fn render_report(scope: &RepoScope, report: &CycleReport) -> String {
    render(scope, report, "")
}

/// Render a scheduled outcome.
pub fn render_outcome(scope: &RepoScope, outcome: &CycleOutcome) -> String {
    match outcome {
        CycleOutcome::Success(report) => render(scope, report, ""),
        CycleOutcome::Partial(report) => render(scope, report, " (partial)"),
        CycleOutcome::Failed { started_at, reason } => format!(
            "{scope}: cycle started {} failed: {reason}",
            super::format_time(Some(*started_at))
        ),
    }
}

fn render(scope: &RepoScope, report: &CycleReport, tag: &str) -> String {
    let mode = match report.since {
        Some(since) => format!("since {}", super::format_time(Some(since))),
        None => "full".to_string(),
    };
    let mut out = format!(
        "{scope}: {} issues ({mode}), {} threads synced, {} skipped, {} comments written{tag}",
        report.issues_fetched, report.threads_synced, report.threads_skipped, report.comments_written,
    );
    for failure in &report.failures {
        out.push_str(&format!("\n  #{} failed: {}", failure.number, failure.error));
    }
    out
}

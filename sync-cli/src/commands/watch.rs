//! Long-running watch command.

use super::sync::{render_outcome, render_report};
use crate::config::AppContext;
use anyhow::{Context, Result};
use std::sync::Arc;
use sync_engine::{RemoteSource, SyncEngine};
use tokio::task::JoinSet;

/// Start one engine per repository and print every cycle until Ctrl-C.
pub async fn run<R: RemoteSource + 'static>(
    ctx: &AppContext,
    remote: Arc<R>,
    repos: &[String],
) -> Result<()> {
    let engines: Vec<_> = ctx
        .repositories(repos)?
        .into_iter()
        .map(|scope| ctx.engine(scope, Arc::clone(&remote)))
        .collect();

    println!(
        "Watching {} repositories every {}s (Ctrl-C to stop)",
        engines.len(),
        ctx.config().sync.poll_interval_secs
    );

    let mut followers = JoinSet::new();
    for engine in &engines {
        followers.spawn(follow(engine.clone()));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    println!("Stopping...");

    stop_all(&engines).await;
    followers.shutdown().await;
    Ok(())
}

/// Stop every engine, letting in-flight cycles finish.
pub async fn stop_all<R: RemoteSource + 'static>(engines: &[SyncEngine<R>]) {
    for engine in engines {
        engine.stop().await;
    }
}

/// Bootstrap `engine`, then print each scheduled outcome until it stops.
pub async fn follow<R: RemoteSource + 'static>(engine: SyncEngine<R>) {
    let scope = engine.repository().clone();
    match engine.initialize().await {
        Ok(report) => println!("{}", render_report(&scope, &report)),
        Err(e) => {
            eprintln!("{scope}: bootstrap failed: {e}");
            return;
        }
    }

    let Some(mut outcomes) = engine.outcomes().await else {
        return;
    };
    // The seeded value is the bootstrap report printed above.
    outcomes.borrow_and_update();

    // Ends when the schedule task exits and drops the sender.
    while outcomes.changed().await.is_ok() {
        let line = outcomes
            .borrow_and_update()
            .as_ref()
            .map(|outcome| render_outcome(&scope, outcome));
        if let Some(line) = line {
            println!("{line}");
        }
    }
}

//! Background polling task.
//!
//! Sleeps for the poll interval after each cycle settles, so cycles never
//! overlap. A stop request wakes the sleep early; a cycle already running is
//! always allowed to finish.

use std::future::Future;
use std::time::Duration;
use sync_core::CycleOutcome;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle to a running schedule.
#[derive(Debug)]
pub struct ScheduleHandle {
    stop_tx: watch::Sender<bool>,
    outcomes: watch::Receiver<Option<CycleOutcome>>,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    /// Latest cycle outcome, updated after every scheduled cycle.
    pub fn outcomes(&self) -> watch::Receiver<Option<CycleOutcome>> {
        self.outcomes.clone()
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn shutdown(self) {
        // The task may already be gone; a closed channel is fine.
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Schedule task failed: {}", e);
        }
    }
}

/// Spawn a task that runs `cycle` every `interval` until stopped.
///
/// `initial` seeds the outcome channel (the result of the bootstrap cycle).
pub fn spawn_schedule<F, Fut>(
    label: String,
    interval: Duration,
    initial: Option<CycleOutcome>,
    mut cycle: F,
) -> ScheduleHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = CycleOutcome> + Send + 'static,
{
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let (outcome_tx, outcomes) = watch::channel(initial);

    let task = tokio::spawn(async move {
        tracing::info!(
            repository = %label,
            "Schedule started (interval: {}s)",
            interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            if *stop_rx.borrow() {
                break;
            }

            let outcome = cycle().await;
            match &outcome {
                CycleOutcome::Failed { reason, .. } => {
                    tracing::warn!(repository = %label, "Scheduled cycle failed: {}", reason);
                }
                other => {
                    tracing::debug!(repository = %label, outcome = other.label(), "Scheduled cycle done");
                }
            }
            outcome_tx.send_replace(Some(outcome));
        }

        tracing::info!(repository = %label, "Schedule stopped");
    });

    ScheduleHandle {
        stop_tx,
        outcomes,
        task,
    }
}

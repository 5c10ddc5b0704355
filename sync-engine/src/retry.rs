//! Retry executor.
//!
//! Runs an async operation under a [`Backoff`], sleeping between attempts.
//! The backoff is only advanced here, never reset: the caller resets it once
//! the whole unit of work has succeeded.

use std::fmt::Display;
use std::future::Future;
use sync_core::{Backoff, RetryDecision};

/// Run `op` until it succeeds or the backoff gives up.
///
/// Every failure is logged with the computed delay. When a bounded budget is
/// exhausted the last error is returned.
pub async fn execute<T, E, F, Fut>(backoff: &mut Backoff, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    loop {
        let error = match op().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match backoff.on_failure() {
            RetryDecision::Retry { attempt, delay } => {
                tracing::warn!(
                    operation = label,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp { attempts } => {
                tracing::error!(
                    operation = label,
                    attempts,
                    error = %error,
                    "Giving up"
                );
                return Err(error);
            }
        }
    }
}

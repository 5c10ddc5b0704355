//! Retry delay policy.
//!
//! [`Backoff`] is a pure calculator: it counts failed attempts, computes how
//! long to wait before the next one and decides when to give up. Sleeping and
//! re-running the operation is done by the caller (see `sync-engine::retry`).
//!
//! Formula: `min(initial_delay * factor^attempt, max_delay)`, plus, when
//! jitter is enabled, a uniform extra in `[0, delay / 4)`.
//!
//! One `Backoff` belongs to one long-lived operation. Sharing an instance
//! between unrelated operations mixes their attempt counts.

use std::time::Duration;

/// Parameters of a [`Backoff`].
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied per failed attempt.
    pub factor: f64,
    /// Upper bound on the computed delay (before jitter).
    pub max_delay: Duration,
    /// Total attempts allowed. `0` means retry forever.
    pub max_attempts: u32,
    /// Add up to 25% random extra delay.
    pub jitter: bool,
}

impl BackoffConfig {
    /// Whether the policy ever gives up.
    pub fn is_unlimited(&self) -> bool {
        self.max_attempts == 0
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
            max_attempts: 0,
            jitter: true,
        }
    }
}

/// What the caller should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait `delay`, then run attempt number `attempt + 1`.
    Retry {
        /// Failed attempts so far.
        attempt: u32,
        /// How long to wait before the next attempt.
        delay: Duration,
    },
    /// The attempt budget is exhausted; surface the failure.
    GiveUp {
        /// Total attempts made.
        attempts: u32,
    },
}

/// Attempt counter plus delay calculator.
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    attempt: u32,
}

impl Backoff {
    /// Create a backoff with no failures recorded.
    pub fn new(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// The policy parameters.
    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }

    /// Failed attempts recorded since creation or the last [`reset`](Self::reset).
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Forget all recorded failures.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay for a given attempt index, without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial = self.config.initial_delay.as_nanos() as f64;
        let cap = (self.config.max_delay.as_nanos() as f64).min(u64::MAX as f64);
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let raw = initial * self.config.factor.powi(exponent);

        let bounded = if raw.is_finite() {
            raw.clamp(0.0, cap)
        } else {
            cap
        };
        Duration::from_nanos(bounded as u64)
    }

    /// Add the configured jitter to a bounded delay.
    ///
    /// The result is in `[delay, delay * 1.25)`; a zero delay stays zero.
    pub fn delay_with_jitter(&self, delay: Duration) -> Duration {
        if !self.config.jitter {
            return delay;
        }
        let quarter = delay.as_nanos() / 4;
        if quarter == 0 {
            return delay;
        }
        let extra = ((quarter as f64) * unit_random()) as u128;
        let extra = extra.min(quarter - 1);
        delay + Duration::from_nanos(extra.min(u64::MAX as u128) as u64)
    }

    /// Record a failed attempt and decide what happens next.
    ///
    /// The delay of the retry is computed from the attempt index *before*
    /// this failure, so the first retry waits `initial_delay`.
    pub fn on_failure(&mut self) -> RetryDecision {
        let index = self.attempt;
        self.attempt = self.attempt.saturating_add(1);

        if !self.config.is_unlimited() && self.attempt >= self.config.max_attempts {
            return RetryDecision::GiveUp {
                attempts: self.attempt,
            };
        }

        RetryDecision::Retry {
            attempt: self.attempt,
            delay: self.delay_with_jitter(self.delay_for(index)),
        }
    }
}

/// Uniform random number in `[0, 1)`.
///
/// Falls back to `0.0` (no jitter) if the OS RNG is unavailable.
fn unit_random() -> f64 {
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return 0.0;
    }
    // 53 random bits map exactly onto the f64 mantissa.
    let bits = u64::from_le_bytes(bytes) >> 11;
    bits as f64 / (1u64 << 53) as f64
}

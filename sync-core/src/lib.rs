//! # sync-core
//!
//! Pure logic for issue-sync (no I/O, instant tests).
//!
//! This crate implements the policies and state machines of the mirror
//! without any network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects:
//! - [`backoff`] computes retry delays and give-up decisions, it never sleeps
//! - [`pagination`] plans page requests, it never fetches
//! - [`freshness`] decides whether a comment thread must be re-fetched
//! - [`state`] tracks the engine lifecycle
//! - [`outcome`] describes what a sync cycle did
//!
//! The actual I/O (HTTP, SQLite, timers) is performed by `sync-engine` and
//! `sync-store`, which interpret the decisions produced here.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod freshness;
pub mod outcome;
pub mod pagination;
pub mod state;

pub use backoff::{Backoff, BackoffConfig, RetryDecision};
pub use freshness::{comments_are_stale, plan_thread, SkipReason, ThreadPlan};
pub use outcome::{CycleOutcome, CycleReport, ThreadFailure};
pub use pagination::{PagePlan, PageRequest, PageStep, DEFAULT_MAX_PAGES, PAGE_SIZE};
pub use state::{EngineEvent, EngineState};

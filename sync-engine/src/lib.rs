//! # sync-engine
//!
//! Incremental sync engine for issue-sync.
//!
//! This crate drives the mirror of one repository:
//! - Remote: the tracker API behind the [`RemoteSource`] trait (HTTP or mock)
//! - Fetcher: drains every page updated since a watermark
//! - Retry: runs an operation under a [`sync_core::Backoff`]
//! - Engine: bootstraps, runs cycles, force-resyncs threads, answers queries
//! - Scheduler: polls on a fixed interval until stopped
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use sync_engine::{EngineOptions, HttpRemote, SyncEngine};
//! use sync_store::SqliteStorage;
//!
//! let store = Arc::new(SqliteStorage::new(&db_path).await?);
//! let remote = Arc::new(HttpRemote::new(&config.remote, token)?);
//! let engine = SyncEngine::new(scope, remote, store, EngineOptions::from_config(&config));
//!
//! engine.initialize().await?;
//! // ... later
//! engine.stop().await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod fetcher;
pub mod remote;
pub mod retry;
pub mod scheduler;

pub use config::{Config, ConfigError};
pub use engine::{EngineOptions, ResyncOutcome, SyncEngine};
pub use error::{EngineError, Result};
pub use fetcher::Fetcher;
pub use remote::{Endpoint, HttpRemote, MockRemote, RemoteError, RemoteSource};
pub use scheduler::ScheduleHandle;

// Re-export the pieces callers need to read reports and query results.
pub use sync_core::{BackoffConfig, CycleOutcome, CycleReport, EngineState, ThreadFailure};
pub use sync_store::{CleanupSummary, MirrorStorage, RepoStatus, SqliteStorage};
pub use sync_types::{Comment, Issue, IssueId, RepoScope};

//! # sync-store
//!
//! Transactional mirror store for issue-sync.
//!
//! This crate owns the four mirror tables and every statement that touches
//! them:
//! - Sync state: the per-repository issue cursor and per-issue comment cursors
//! - Upserts: idempotent issue and comment batches, each in one transaction
//! - Queries: comment threads, substring search, status, full teardown
//!
//! ## Layout
//!
//! ```text
//!        ┌──────────────────────────────────────────────┐
//!        │                 SQLite (WAL)                 │
//!        │  issues ◄── comments                         │
//!        │  repo_sync_state      comment_sync_state     │
//!        └──────────────────────────────────────────────┘
//! ```
//!
//! Every row carries its repository, and every statement filters on it, so
//! several repositories can share one database file.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod storage;

pub use error::{StorageResult, StoreError};
pub use storage::{
    CleanupSummary, CommentWrite, MirrorStorage, RepoStatus, SqliteStorage, WriteMode,
    DEFAULT_SEARCH_LIMIT,
};

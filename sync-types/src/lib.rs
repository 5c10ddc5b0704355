//! # sync-types
//!
//! Record schemas for the issue-sync mirror.
//!
//! This crate provides the foundational types used across all issue-sync crates:
//! - [`RepoScope`], [`IssueId`], [`CommentId`] - Identity and scoping types
//! - [`Issue`], [`Comment`] - Records as they are persisted locally
//! - [`RemoteIssue`], [`RemoteComment`] - Records as the remote tracker sends them
//! - [`RecordError`] - Validation errors at the fetch boundary

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod records;

pub use error::RecordError;
pub use ids::{CommentId, IssueId, RepoScope};
pub use records::{Comment, Issue, RemoteComment, RemoteIssue, RemoteLabel, RemoteUser, GHOST_LOGIN};

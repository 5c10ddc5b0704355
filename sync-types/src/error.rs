//! Error types for issue-sync records.

use thiserror::Error;

/// Errors raised while turning remote payloads into records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// The payload could not be decoded into the expected schema
    #[error("malformed {kind} record: {source}")]
    Malformed {
        /// Which record kind was being decoded ("issue" or "comment")
        kind: &'static str,
        /// Underlying decode error
        #[source]
        source: serde_json::Error,
    },

    /// A field decoded but holds a value the mirror cannot store
    #[error("invalid {kind} record {id}: {reason}")]
    InvalidField {
        /// Which record kind was being validated
        kind: &'static str,
        /// Remote id of the record (0 when unknown)
        id: i64,
        /// Why the record was rejected
        reason: String,
    },

    /// Repository scope string is not `owner/name`
    #[error("invalid repository '{0}': expected owner/name")]
    InvalidScope(String),
}

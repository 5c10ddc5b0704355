//! Error types for sync-engine.

use crate::config::ConfigError;
use crate::remote::RemoteError;
use sync_store::StoreError;

/// Engine errors.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The remote failed or returned unusable data.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// The mirror store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration is unusable.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The operation is not valid in the engine's current lifecycle state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// Lifecycle state at the time.
        state: &'static str,
    },
}

impl EngineError {
    /// Whether retrying the same operation could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote(e) => e.is_retryable(),
            // Locked or busy databases clear up on their own.
            Self::Store(StoreError::Database(_)) => true,
            _ => false,
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

//! Engine lifecycle state machine.
//!
//! A pure, side-effect-free state machine for one repository's sync engine.
//! It takes events as input and produces the next state; the engine in
//! `sync-engine` performs the actual probing, syncing and scheduling.
//!
//! ```text
//! Uninitialized ─Start─► Validating ─CredentialAccepted─► InitialSync ─InitialSyncCompleted─► Steady
//!                            ▲                                 │
//!                            └──────────BootstrapFailed────────┘
//! any started state ─StopRequested─► Stopped
//! ```

/// Lifecycle state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineState {
    /// Created, `initialize` not called yet.
    Uninitialized,
    /// Probing the remote credential.
    Validating {
        /// Failed bootstrap attempts so far.
        attempt: u32,
    },
    /// Credential accepted, running the first full cycle.
    InitialSync {
        /// Failed bootstrap attempts so far.
        attempt: u32,
    },
    /// Bootstrapped; cycles run on the polling schedule.
    Steady,
    /// Polling cancelled; no further cycles start.
    Stopped,
}

/// Events that drive the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// `initialize` was called.
    Start,
    /// The credential probe succeeded.
    CredentialAccepted,
    /// The probe or the first cycle failed and will be retried.
    BootstrapFailed,
    /// The bootstrap attempt budget ran out.
    BootstrapAbandoned,
    /// The first cycle completed.
    InitialSyncCompleted,
    /// `stop` was called.
    StopRequested,
}

impl EngineState {
    /// A fresh engine.
    pub fn new() -> Self {
        Self::Uninitialized
    }

    /// Process an event and return the new state.
    ///
    /// Invalid transitions leave the state unchanged.
    pub fn on_event(self, event: EngineEvent) -> Self {
        match (self, event) {
            (Self::Uninitialized, EngineEvent::Start) => Self::Validating { attempt: 0 },

            (Self::Validating { attempt }, EngineEvent::CredentialAccepted) => {
                Self::InitialSync { attempt }
            }
            (
                Self::Validating { attempt } | Self::InitialSync { attempt },
                EngineEvent::BootstrapFailed,
            ) => Self::Validating {
                attempt: attempt.saturating_add(1),
            },
            (Self::Validating { .. } | Self::InitialSync { .. }, EngineEvent::BootstrapAbandoned) => {
                Self::Uninitialized
            }
            (Self::InitialSync { .. }, EngineEvent::InitialSyncCompleted) => Self::Steady,

            // Stopping an engine that never started is a no-op.
            (Self::Uninitialized, EngineEvent::StopRequested) => Self::Uninitialized,
            (_, EngineEvent::StopRequested) => Self::Stopped,

            (state, _) => state,
        }
    }

    /// Polling on the schedule.
    pub fn is_steady(&self) -> bool {
        matches!(self, Self::Steady)
    }

    /// Stopped for good.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// Short lowercase name for logs and status output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Validating { .. } => "validating",
            Self::InitialSync { .. } => "initial-sync",
            Self::Steady => "steady",
            Self::Stopped => "stopped",
        }
    }
}

impl Default for EngineState {
    fn default() -> Self {
        Self::new()
    }
}

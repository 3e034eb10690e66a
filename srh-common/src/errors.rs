//! Error types for the restart harness.
//!
//! Failures split into two families: environment/harness problems (corrupt
//! state files, restart-loop guard trips, readiness timeouts) that abort a
//! scenario outright, and phase-logic failures raised by scenario callbacks.
//! [`HarnessError::is_environment`] tells them apart so callers can report
//! "the harness broke" differently from "the scenario's assertions failed".

use std::path::PathBuf;
use std::time::Duration;

/// Error type for harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A state file exists but its content does not match the record format.
    /// Unlike an absent file, this signals corruption and is never recovered
    /// silently.
    #[error("malformed record in {}: {reason}", path.display())]
    MalformedState { path: PathBuf, reason: String },

    /// The restart-loop guard reached its configured bound.
    #[error(
        "restart guard tripped: {count} phase resets reached the configured bound of {max}; \
         possible never-ending restart loop (raise max_restarts if the scenario \
         legitimately needs more restarts)"
    )]
    GuardExceeded { count: u32, max: u32 },

    /// The restarted service never reported ready within the wait budget.
    #[error("service did not become ready within {0:?}")]
    ReadinessTimeout(Duration),

    /// The readiness wait was cancelled externally.
    #[error("readiness wait cancelled")]
    Cancelled,

    #[error("restart trigger failed: {0}")]
    RestartFailed(String),

    #[error("setup failed: {0}")]
    SetupFailed(String),

    /// A scenario phase callback reported failure. This is scenario logic,
    /// not a harness problem.
    #[error("phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: String, reason: String },
}

impl HarnessError {
    /// Returns `true` when the error indicates a harness or environment
    /// problem rather than a failed scenario assertion.
    pub fn is_environment(&self) -> bool {
        !matches!(self, Self::PhaseFailed { .. })
    }

    /// Build a phase failure for the named phase.
    pub fn phase_failure(phase: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PhaseFailed {
            phase: phase.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

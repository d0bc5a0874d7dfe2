//! Error taxonomy.
//!
//! Two families with different propagation rules:
//! - [`SchedulerError`] is returned to callers of the queue/handler API.
//! - [`JobFault`] is recorded on a job when it enters `Faulted`. The queue and
//!   the registry never propagate it; they only observe the job's status.

use serde::Serialize;
use thiserror::Error;

/// Result type used by scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Errors surfaced by scheduler operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Programmer error, e.g. enqueueing a job that already reached a terminal
    /// status. Fatal to the operation, not to the process.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// No valid target for a generation request. Request handlers treat this
    /// as expected and skip the request.
    #[error("no target resolved: {0}")]
    ResolutionFailure(String),
}

impl SchedulerError {
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::ResolutionFailure(msg.into())
    }
}

/// Why a job ended in `Faulted`.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum JobFault {
    /// The job observed its cancellation token at a checkpoint.
    ///
    /// World mutations committed by earlier steps are not rolled back.
    #[error("cancelled during {phase}")]
    Cancelled { phase: String },

    /// An internal generation invariant was violated (missing prototype,
    /// vanished target data, collaborator refusal).
    #[error("generation fault during {phase}: {reason}")]
    Generation { phase: String, reason: String },
}

impl JobFault {
    pub fn cancelled(phase: impl Into<String>) -> Self {
        Self::Cancelled {
            phase: phase.into(),
        }
    }

    pub fn generation(phase: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Generation {
            phase: phase.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobFault::Cancelled { .. })
    }
}

//! Errors the command executor reports back for a single command.
//!
//! These never abort the process: a peek/process/commit failure becomes a
//! wire-level error response to the caller, not a process-fatal error. See
//! [`peridot_server::error::ServerError`] for the ambient error type used
//! for everything else.

use thiserror::Error;

/// Result type for a single peek/process/commit call.
pub type EngineResult<T> = Result<T, EngineError>;

/// A failure surfaced by one phase of command execution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The command name has no registered handler.
    #[error("no handler for command {0:?}")]
    UnrecognizedCommand(String),

    /// A required field was missing or failed validation.
    #[error("{0}")]
    InvalidRequest(String),

    /// The command conflicts with another in-flight commit and should be retried.
    #[error("commit conflict")]
    CommitConflict,

    /// The underlying storage engine reported a failure.
    #[error("engine error: {0}")]
    Storage(String),
}

impl EngineError {
    /// The wire status code this error maps to when it becomes a response.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::UnrecognizedCommand(_) => 404,
            Self::InvalidRequest(_) => 400,
            Self::CommitConflict => 409,
            Self::Storage(_) => 500,
        }
    }
}

//! Ambient, process-level errors.
//!
//! Per-command peek/process/commit failures are never represented here:
//! they become a wire-level error response on the command itself (see
//! [`crate::command::Command::complete_with`]). This type is reserved for
//! failures that abort startup, or that a careful reviewer would classify
//! as a programmer error.

use thiserror::Error;

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// Binding a listening port failed.
    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation on a connection failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The wire codec rejected a request or response.
    #[error("wire error: {0}")]
    Wire(#[from] peridot_wire::WireError),

    /// `config` reported an I/O or parse failure while registering a
    /// signal handler.
    #[error("signal handler registration failed: {0}")]
    SignalSetup(std::io::Error),
}

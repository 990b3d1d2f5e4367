//! # peridot-engine: the three-phase command executor contract
//!
//! The embedded database itself is an external collaborator; this crate
//! only defines the interface the dispatch pipeline drives it through and
//! ships an in-memory mock satisfying it for tests.
//!
//! A command passes through up to three phases:
//!
//! - **peek** — read-only. May fully satisfy the command (no write needed)
//!   or signal that [`CommandExecutor::process`] must run.
//! - **process** — stages a write against transaction-local state. Never
//!   itself durable; may be retried or rolled back.
//! - **commit** — durably applies a processed write. Only ever invoked
//!   while the caller holds whatever external serialization the engine
//!   requires (see the Sync Coordinator in `peridot-server`).
//!
//! `process`/`commit` can fail with [`EngineError::CommitConflict`], which
//! callers should treat as retryable up to a bounded number of attempts
//! before escalating.

pub mod error;
pub mod mock;

pub use error::{EngineError, EngineResult};

use peridot_wire::{Request, Response};

/// What peek decided about a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeekOutcome {
    /// The command was fully answered without needing a write.
    Complete(Response),
    /// The command must proceed to [`CommandExecutor::process`].
    NeedsProcess,
}

/// What process staged for a command that needed a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Whether the staged write still needs [`CommandExecutor::commit`].
    ///
    /// Rare commands may be fully resolved by `process` alone (e.g. a
    /// write rejected by validation before touching storage).
    pub needs_commit: bool,
    /// The response to return to the caller once the write is durable.
    pub response: Response,
}

/// Drives a command through peek, process, and commit against the embedded
/// database.
///
/// Implementations must be safe to call `peek` and `process` concurrently
/// from multiple worker threads; `commit` is only ever called while the
/// caller holds whatever serialization the implementation requires (the
/// default assumption, per the dispatch pipeline's design, is that `commit`
/// is not safe under concurrent readers and is therefore only invoked from
/// a single thread at a time).
pub trait CommandExecutor: Send + Sync {
    /// Attempts to answer `command` using only a read-only snapshot.
    fn peek(&self, command: &Request) -> EngineResult<PeekOutcome>;

    /// Stages a write for `command` against transaction-local state.
    ///
    /// Only called after `peek` returned [`PeekOutcome::NeedsProcess`].
    fn process(&self, command: &Request) -> EngineResult<ProcessOutcome>;

    /// Durably applies the write staged by the most recent `process` call.
    ///
    /// Only called after `process` returned `needs_commit: true`.
    fn commit(&self, command: &Request) -> EngineResult<Response>;

    /// Discards the write staged by the most recent `process` call.
    ///
    /// Called when a commit conflict forces a retry from `process`, or when
    /// the command is abandoned (shutdown, escalation to a peer that will
    /// redo the work itself).
    fn rollback(&self, command: &Request);
}

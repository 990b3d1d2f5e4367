//! # peridot-replication: the replication node contract
//!
//! The consensus/replication state machine itself (leader election, log
//! repair, view changes) is an external collaborator; this crate only
//! defines the narrow interface the Sync Coordinator drives it through,
//! plus a deterministic mock satisfying it for tests.
//!
//! [`ReplicationControl`] is the Sync Coordinator's view of the node: poll
//! it every tick (`update`, `pre_select`, `post_select`), drive commits
//! through it (`start_commit`, `commit_in_progress`, `commit_succeeded`),
//! and use it to route command responses and escalations across the
//! cluster (`send_response`, `escalate_command`). [`AcceptSink`] is the
//! narrower interface the replication node uses to hand a peer-originated
//! command back into the local dispatch pipeline.

pub mod mock;

use peridot_types::{CommandId, ReplicaRole, WriteConsistency};
use peridot_wire::{Request, Response};

/// The Sync Coordinator's view of the replication node.
///
/// Every method is expected to be non-blocking: the Sync Coordinator calls
/// these once per poll iteration and must not stall waiting on the network.
pub trait ReplicationControl: Send + Sync {
    /// The node's current role.
    fn role(&self) -> ReplicaRole;

    /// The current leader's advertised version string, used by the
    /// Lifecycle Controller to decide version-skew command-port
    /// suppression. Empty before a leader has been observed.
    fn leader_version(&self) -> String;

    /// Advances the replication state machine by one tick: processes
    /// incoming peer messages, drives timeouts, may change `role()`.
    fn update(&self);

    /// Called before the event loop blocks on I/O, to register any file
    /// descriptors the replication node wants polled.
    fn pre_select(&self);

    /// Called after the event loop wakes, to let the replication node
    /// drain whatever its registered descriptors were ready for.
    fn post_select(&self);

    /// Begins committing the command most recently staged by a worker's
    /// `process` call, at the given consistency level.
    ///
    /// Returns `false` if the node cannot begin a commit right now (for
    /// example because `role()` is not [`ReplicaRole::Mastering`]).
    fn start_commit(&self, consistency: WriteConsistency) -> bool;

    /// True while a commit started by `start_commit` is still in flight.
    fn commit_in_progress(&self) -> bool;

    /// True if the most recently finished commit succeeded.
    ///
    /// Only meaningful once `commit_in_progress()` has returned to `false`.
    fn commit_succeeded(&self) -> bool;

    /// Delivers a response for a peer-originated command, keyed by the id
    /// the replication node assigned when it first handed the command to
    /// this node. The implementation is responsible for knowing which
    /// peer is waiting on that id.
    fn send_response(&self, command_id: CommandId, response: Response);

    /// Hands a command this node cannot safely process itself (wrong role,
    /// or a write it cannot locally commit) to the current leader.
    ///
    /// The leader's eventual response is delivered back to this node via
    /// [`AcceptSink::accept_command`], addressed by `command_id`.
    fn escalate_command(&self, command_id: CommandId, request: Request);

    /// Requests a graceful shutdown: the node should finish any in-flight
    /// commit, relinquish leadership if held, and descend to
    /// [`ReplicaRole::Searching`].
    fn shutdown(&self);

    /// True once the node has nothing left to finish before the process
    /// can exit: no commit in progress and role descended to at most
    /// [`ReplicaRole::Waiting`].
    fn shutdown_complete(&self) -> bool;
}

/// The interface the replication node uses to hand a leader's response to
/// an escalated command back to the node that escalated it.
pub trait AcceptSink: Send + Sync {
    /// Delivers the leader's `response` for the command previously handed
    /// to [`ReplicationControl::escalate_command`] as `command_id`. The
    /// implementation re-injects it as a completed command so a worker can
    /// deliver it to the original local client.
    fn accept_command(&self, command_id: CommandId, response: Response);
}

//! Deterministic [`ReplicationControl`] and [`AcceptSink`] doubles for tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use peridot_types::{CommandId, ReplicaRole, WriteConsistency};
use peridot_wire::{Request, Response};

use crate::{AcceptSink, ReplicationControl};

/// A single-process replication node double.
///
/// Commits complete synchronously inside `start_commit` (so
/// `commit_in_progress` is always `false` immediately after), which is
/// enough to exercise the Sync Coordinator and Worker Pool's control flow
/// without a real consensus round trip.
#[derive(Debug)]
pub struct MockReplicationNode {
    role: Mutex<ReplicaRole>,
    leader_version: Mutex<String>,
    last_commit_succeeded: AtomicBool,
    fail_next_commits: Mutex<usize>,
    shutdown_requested: AtomicBool,
    escalated: Mutex<Vec<(CommandId, Request)>>,
    responses: Mutex<Vec<(CommandId, Response)>>,
}

impl Default for MockReplicationNode {
    fn default() -> Self {
        Self {
            role: Mutex::new(ReplicaRole::Mastering),
            leader_version: Mutex::new(String::new()),
            last_commit_succeeded: AtomicBool::new(true),
            fail_next_commits: Mutex::new(0),
            shutdown_requested: AtomicBool::new(false),
            escalated: Mutex::new(Vec::new()),
            responses: Mutex::new(Vec::new()),
        }
    }
}

impl MockReplicationNode {
    pub fn new(role: ReplicaRole) -> Self {
        Self {
            role: Mutex::new(role),
            ..Self::default()
        }
    }

    pub fn set_role(&self, role: ReplicaRole) {
        *self.role.lock().expect("role lock poisoned") = role;
    }

    pub fn set_leader_version(&self, version: impl Into<String>) {
        *self.leader_version.lock().expect("leader version lock poisoned") = version.into();
    }

    /// Makes the next `n` `start_commit` calls report failure.
    pub fn fail_next_commits(&self, n: usize) {
        *self.fail_next_commits.lock().expect("fail lock poisoned") = n;
    }

    pub fn escalated_commands(&self) -> Vec<(CommandId, Request)> {
        self.escalated.lock().expect("escalated lock poisoned").clone()
    }

    pub fn sent_responses(&self) -> Vec<(CommandId, Response)> {
        self.responses.lock().expect("responses lock poisoned").clone()
    }
}

impl ReplicationControl for MockReplicationNode {
    fn role(&self) -> ReplicaRole {
        *self.role.lock().expect("role lock poisoned")
    }

    fn leader_version(&self) -> String {
        self.leader_version.lock().expect("leader version lock poisoned").clone()
    }

    fn update(&self) {}

    fn pre_select(&self) {}

    fn post_select(&self) {}

    fn start_commit(&self, _consistency: WriteConsistency) -> bool {
        if self.role() != ReplicaRole::Mastering {
            return false;
        }
        let mut remaining = self.fail_next_commits.lock().expect("fail lock poisoned");
        let succeeded = match remaining.checked_sub(1) {
            Some(left) => {
                *remaining = left;
                false
            }
            None => true,
        };
        self.last_commit_succeeded.store(succeeded, Ordering::SeqCst);
        true
    }

    fn commit_in_progress(&self) -> bool {
        false
    }

    fn commit_succeeded(&self) -> bool {
        self.last_commit_succeeded.load(Ordering::SeqCst)
    }

    fn send_response(&self, command_id: CommandId, response: Response) {
        self.responses
            .lock()
            .expect("responses lock poisoned")
            .push((command_id, response));
    }

    fn escalate_command(&self, command_id: CommandId, request: Request) {
        self.escalated
            .lock()
            .expect("escalated lock poisoned")
            .push((command_id, request));
    }

    fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        self.set_role(ReplicaRole::Searching);
    }

    fn shutdown_complete(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst) && self.role() <= ReplicaRole::Waiting
    }
}

/// An [`AcceptSink`] double that records what was handed to it, for
/// asserting that escalated commands' responses were re-injected.
#[derive(Debug, Default)]
pub struct RecordingAcceptSink {
    accepted: Mutex<Vec<(CommandId, Response)>>,
}

impl RecordingAcceptSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accepted(&self) -> Vec<(CommandId, Response)> {
        self.accepted.lock().expect("accepted lock poisoned").clone()
    }
}

impl AcceptSink for RecordingAcceptSink {
    fn accept_command(&self, command_id: CommandId, response: Response) {
        self.accepted
            .lock()
            .expect("accepted lock poisoned")
            .push((command_id, response));
    }
}

//! The Sync Coordinator: single-threaded owner of the writer database
//! handle and of all interaction with the replication node.
//!
//! [`SyncCoordinator::tick`] implements one pass of the dispatch logic
//! (steps 4-9 of the design): drive the replication node, finalize an
//! in-flight commit, drain complete peer-originated commands, and dispatch
//! the next command by role. Socket I/O and the Router run alongside it on
//! the same thread (see `server.rs`); this module only contains the parts
//! that are meaningfully unit-testable without real sockets.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;

use peridot_engine::{CommandExecutor, PeekOutcome};
use peridot_replication::{AcceptSink, ReplicationControl};
use peridot_types::{CommandId, ReplicaRole};
use peridot_wire::{Request, Response};

use crate::command::Command;
use crate::metrics::Metrics;
use crate::queue::{CommandQueue, QueueError};
use crate::reply::ReplySender;

/// Outcome of a single `tick()`, mainly useful for tests and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Role isn't mastering or slaving yet; nothing to dispatch.
    NotReady,
    /// A commit was in flight and still is.
    CommitPending,
    /// A commit finished this tick (successfully or not).
    CommitFinalized,
    /// The sync queue was empty; nothing to dispatch.
    QueueEmpty,
    /// A command was dispatched (processed, committed, replied, or
    /// escalated) this tick.
    Dispatched,
}

/// Result of checking whether an in-flight commit is due for finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FinalizeStatus {
    /// No commit was in flight.
    NotPending,
    /// A commit is in flight and the replication node hasn't resolved it yet.
    StillPending,
    /// A commit resolved (successfully or not) this call.
    JustFinalized,
}

pub struct SyncCoordinator<'a> {
    pub queue: &'a CommandQueue,
    pub sync_queue: &'a CommandQueue,
    pub executor: &'a dyn CommandExecutor,
    pub replication: &'a dyn ReplicationControl,
    pub reply: ReplySender,
    pub metrics: &'a Metrics,
    committing: Mutex<Option<Command>>,
    escalated: Mutex<HashMap<CommandId, Command>>,
}

impl<'a> SyncCoordinator<'a> {
    pub fn new(
        queue: &'a CommandQueue,
        sync_queue: &'a CommandQueue,
        executor: &'a dyn CommandExecutor,
        replication: &'a dyn ReplicationControl,
        reply: ReplySender,
        metrics: &'a Metrics,
    ) -> Self {
        Self {
            queue,
            sync_queue,
            executor,
            replication,
            reply,
            metrics,
            committing: Mutex::new(None),
            escalated: Mutex::new(HashMap::new()),
        }
    }

    /// Injects a command escalated to us by a follower, because we are
    /// (or were, when the peer sent it) the leader. Called by the
    /// replication wiring, not by workers.
    pub fn receive_peer_command(&self, id: CommandId, request: Request, peer: peridot_types::PeerId) {
        self.sync_queue.push(Command::from_peer(id, request, peer));
    }

    pub fn tick(&self) -> TickOutcome {
        let started = Instant::now();
        self.metrics.worker_queue_depth.set(self.queue.len() as i64);
        self.metrics.sync_queue_depth.set(self.sync_queue.len() as i64);

        let outcome = self.tick_inner();

        self.metrics.sync_tick_seconds.observe(started.elapsed().as_secs_f64());
        outcome
    }

    fn tick_inner(&self) -> TickOutcome {
        self.replication.update();

        let role = self.replication.role();
        if !matches!(role, ReplicaRole::Mastering | ReplicaRole::Slaving) {
            return TickOutcome::NotReady;
        }

        match self.finalize_commit_if_due(role) {
            FinalizeStatus::StillPending => {
                self.drain_complete_peer_commands();
                return TickOutcome::CommitPending;
            }
            FinalizeStatus::JustFinalized => {
                self.drain_complete_peer_commands();
                return TickOutcome::CommitFinalized;
            }
            FinalizeStatus::NotPending => {}
        }

        self.drain_complete_peer_commands();
        self.dispatch_next(role)
    }

    fn finalize_commit_if_due(&self, role: ReplicaRole) -> FinalizeStatus {
        let mut committing = self.committing.lock().expect("committing lock poisoned");
        if committing.is_none() {
            return FinalizeStatus::NotPending;
        }
        if self.replication.commit_in_progress() {
            return FinalizeStatus::StillPending;
        }

        assert_eq!(
            role,
            ReplicaRole::Mastering,
            "commit finalize observed with role {role} instead of Mastering"
        );

        let mut cmd = committing.take().expect("checked above");
        if self.replication.commit_succeeded() {
            cmd.complete_with(Response::new("200 OK"));
            self.route_finished(cmd);
        } else {
            self.executor.rollback(&cmd.request);
            self.sync_queue.push(cmd);
        }
        FinalizeStatus::JustFinalized
    }

    fn drain_complete_peer_commands(&self) {
        loop {
            match self.sync_queue.front() {
                Ok(cmd) if cmd.complete => {
                    let popped = self.sync_queue.try_pop();
                    if let Some(cmd) = popped {
                        self.replication.send_response(cmd.id, cmd.response);
                    }
                }
                _ => break,
            }
        }
    }

    fn dispatch_next(&self, role: ReplicaRole) -> TickOutcome {
        let Some(cmd) = self.sync_queue.try_pop() else {
            return TickOutcome::QueueEmpty;
        };

        match role {
            ReplicaRole::Mastering => self.dispatch_mastering(cmd),
            ReplicaRole::Slaving => self.dispatch_slaving(cmd),
            _ => unreachable!("checked by tick()"),
        }
        TickOutcome::Dispatched
    }

    fn dispatch_mastering(&self, mut cmd: Command) {
        match self.executor.process(&cmd.request) {
            Ok(staged) if staged.needs_commit => {
                let started = self.replication.start_commit(cmd.write_consistency);
                if started {
                    *self.committing.lock().expect("committing lock poisoned") = Some(cmd);
                } else {
                    self.sync_queue.push(cmd);
                }
            }
            Ok(staged) => {
                cmd.complete_with(staged.response);
                self.route_finished(cmd);
            }
            Err(e) => {
                cmd.complete_with(Response::new(format!("{} {e}", e.status_code())));
                self.route_finished(cmd);
            }
        }
    }

    fn dispatch_slaving(&self, mut cmd: Command) {
        match self.executor.peek(&cmd.request) {
            Ok(PeekOutcome::Complete(response)) => {
                cmd.complete_with(response);
                self.route_finished(cmd);
            }
            Ok(PeekOutcome::NeedsProcess) => {
                let id = cmd.id.clone();
                self.replication.escalate_command(id.clone(), cmd.request.clone());
                self.escalated.lock().expect("escalated lock poisoned").insert(id, cmd);
            }
            Err(e) => {
                cmd.complete_with(Response::new(format!("{} {e}", e.status_code())));
                self.route_finished(cmd);
            }
        }
    }

    /// Routes a just-finished command's response: peer-originated goes out
    /// over the replication channel, local client-originated goes to the
    /// reply channel — unless the command's socket was never registered
    /// (forget, or deferred), in which case the response is discarded.
    fn route_finished(&self, cmd: Command) {
        if cmd.initiating_peer_id.is_none() {
            if cmd.reply_owed {
                self.reply.send(cmd.initiating_client_id, cmd.response);
            }
        } else {
            self.replication.send_response(cmd.id, cmd.response);
        }
    }
}

impl AcceptSink for SyncCoordinator<'_> {
    fn accept_command(&self, command_id: CommandId, response: Response) {
        let mut escalated = self.escalated.lock().expect("escalated lock poisoned");
        match escalated.remove(&command_id) {
            Some(mut cmd) => {
                cmd.complete_with(response);
                self.queue.push(cmd);
            }
            None => tracing::warn!(%command_id, "accept_command for unknown escalation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use peridot_engine::mock::InMemoryExecutor;
    use peridot_replication::mock::MockReplicationNode;
    use peridot_types::{ClientId, PeerId};
    use peridot_wire::Request;

    use super::*;
    use crate::reply;

    fn write_cmd(id: &str, key: &str, value: &str, client: ClientId) -> Command {
        let mut req = Request::new(format!("write {id}"));
        req.headers.push("key", key);
        req.headers.push("value", value);
        Command::from_client(CommandId::new(id), req, client)
    }

    #[test]
    fn not_ready_when_role_is_searching() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Searching);
        let metrics = Metrics::new();
        let (tx, _rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        assert_eq!(coordinator.tick(), TickOutcome::NotReady);
    }

    #[test]
    fn mastering_commits_and_replies_locally() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Mastering);
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        sync_queue.push(write_cmd("c1", "a", "1", ClientId::from(1)));
        assert_eq!(coordinator.tick(), TickOutcome::Dispatched);
        assert_eq!(coordinator.tick(), TickOutcome::CommitFinalized);

        assert_eq!(rx.drain().len(), 1);
    }

    #[test]
    fn forgotten_write_commits_without_a_reply() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Mastering);
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        let mut cmd = write_cmd("c1", "a", "1", ClientId::from(1));
        cmd.reply_owed = false;
        sync_queue.push(cmd);
        assert_eq!(coordinator.tick(), TickOutcome::Dispatched);
        assert_eq!(coordinator.tick(), TickOutcome::CommitFinalized);

        assert!(rx.drain().is_empty());
    }

    #[test]
    fn mastering_requeues_on_commit_failure() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Mastering);
        replication.fail_next_commits(1);
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        sync_queue.push(write_cmd("c1", "a", "1", ClientId::from(1)));
        assert_eq!(coordinator.tick(), TickOutcome::Dispatched);
        assert_eq!(coordinator.tick(), TickOutcome::CommitFinalized);

        assert!(rx.drain().is_empty());
        assert_eq!(sync_queue.len(), 1);
    }

    #[test]
    fn slaving_escalates_writes_and_accept_command_reinjects() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Slaving);
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        sync_queue.push(write_cmd("c1", "a", "1", ClientId::from(7)));
        assert_eq!(coordinator.tick(), TickOutcome::Dispatched);
        assert_eq!(replication.escalated_commands().len(), 1);

        coordinator.accept_command(CommandId::new("c1"), Response::new("756"));
        assert_eq!(queue.len(), 1);
        let requeued = queue.try_pop().unwrap();
        assert!(requeued.complete);
        assert_eq!(requeued.response.method_line, "756");

        assert!(rx.drain().is_empty());
    }

    #[test]
    fn peer_originated_finish_routes_through_replication_channel() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Mastering);
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        let mut req = Request::new("write r_1_r");
        req.headers.push("key", "a");
        req.headers.push("value", "1");
        sync_queue.push(Command::from_peer(CommandId::new("p1"), req, PeerId::from(3)));

        assert_eq!(coordinator.tick(), TickOutcome::Dispatched);
        assert_eq!(coordinator.tick(), TickOutcome::CommitFinalized);

        assert!(rx.drain().is_empty());
        assert_eq!(replication.sent_responses().len(), 1);
    }

    #[test]
    fn drains_already_complete_front_of_sync_queue() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Mastering);
        let metrics = Metrics::new();
        let (tx, _rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        let mut cmd = write_cmd("c1", "a", "1", ClientId::NONE);
        cmd.initiating_peer_id = PeerId::from(2);
        cmd.complete_with(Response::new("756"));
        sync_queue.push(cmd);

        assert_eq!(coordinator.tick(), TickOutcome::QueueEmpty);
        assert_eq!(replication.sent_responses().len(), 1);
    }

    #[test]
    fn empty_sync_queue_reports_queue_empty() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Mastering);
        let metrics = Metrics::new();
        let (tx, _rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        assert_eq!(coordinator.tick(), TickOutcome::QueueEmpty);
    }

    #[test]
    fn tick_reports_queue_depths_and_observes_latency() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let replication = MockReplicationNode::new(ReplicaRole::Mastering);
        let metrics = Metrics::new();
        let (tx, _rx) = reply::channel();
        let coordinator = SyncCoordinator::new(&queue, &sync_queue, &executor, &replication, tx, &metrics);

        sync_queue.push(write_cmd("c1", "a", "1", ClientId::from(1)));
        queue.push(write_cmd("c2", "a", "1", ClientId::from(2)));

        coordinator.tick();

        assert_eq!(metrics.sync_queue_depth.get(), 1);
        assert_eq!(metrics.worker_queue_depth.get(), 1);
        assert_eq!(metrics.sync_tick_seconds.get_sample_count(), 1);
    }
}

//! A Worker: drains the Command Queue, drives peek/process/commit against
//! its own reader handle, retries on conflict, and bounces what it can't
//! finish locally to the Sync Coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use peridot_engine::{CommandExecutor, EngineError, PeekOutcome};
use peridot_wire::Response;

use crate::command::Command;
use crate::metrics::Metrics;
use crate::queue::{CommandQueue, QueueError};
use crate::reply::ReplySender;

const MAX_RETRIES: u32 = 3;
const POP_TIMEOUT: Duration = Duration::from_secs(1);

/// One worker thread's view of the pipeline. `index` is this worker's
/// reader-handle id, out of `N` total workers.
pub struct Worker<'a> {
    pub index: usize,
    pub queue: &'a CommandQueue,
    pub sync_queue: &'a CommandQueue,
    pub executor: &'a dyn CommandExecutor,
    pub reply: ReplySender,
    pub metrics: &'a Metrics,
}

impl Worker<'_> {
    /// Runs until `shutdown` is set and the Command Queue has drained.
    pub fn run(&self, shutdown: &AtomicBool) {
        loop {
            match self.queue.pop(POP_TIMEOUT) {
                Ok(cmd) => self.handle(cmd),
                Err(QueueError::Timeout) => {
                    if shutdown.load(Ordering::SeqCst) && self.queue.is_empty() {
                        tracing::info!(worker = self.index, "drained, exiting");
                        return;
                    }
                }
            }
        }
    }

    fn handle(&self, cmd: Command) {
        if cmd.complete {
            // Already answered elsewhere (a peer response re-injected via
            // `accept_command`); just deliver it.
            self.finish(cmd);
            return;
        }
        self.process_with_retries(cmd);
    }

    fn process_with_retries(&self, mut cmd: Command) {
        let mut retries_left = MAX_RETRIES;
        loop {
            match self.executor.peek(&cmd.request) {
                Ok(PeekOutcome::Complete(response)) => {
                    cmd.complete_with(response);
                    self.finish(cmd);
                    return;
                }
                Ok(PeekOutcome::NeedsProcess) => {}
                Err(e) => {
                    cmd.complete_with(error_response(&e));
                    self.finish(cmd);
                    return;
                }
            }

            if cmd.requires_sync_coordinator() {
                self.metrics.escalations_total.inc();
                self.sync_queue.push(cmd);
                return;
            }

            match self.executor.process(&cmd.request) {
                Ok(staged) if !staged.needs_commit => {
                    cmd.complete_with(staged.response);
                    self.finish(cmd);
                    return;
                }
                Ok(_staged) => match self.executor.commit(&cmd.request) {
                    Ok(response) => {
                        cmd.complete_with(response);
                        self.finish(cmd);
                        return;
                    }
                    Err(EngineError::CommitConflict) => {
                        self.metrics.commit_conflicts_total.inc();
                        self.executor.rollback(&cmd.request);
                        retries_left -= 1;
                        if retries_left == 0 {
                            tracing::debug!(command = %cmd.id, "retries exhausted, escalating to sync coordinator");
                            self.metrics.escalations_total.inc();
                            self.sync_queue.push(cmd);
                            return;
                        }
                    }
                    Err(e) => {
                        self.executor.rollback(&cmd.request);
                        cmd.complete_with(error_response(&e));
                        self.finish(cmd);
                        return;
                    }
                },
                Err(e) => {
                    cmd.complete_with(error_response(&e));
                    self.finish(cmd);
                    return;
                }
            }
        }
    }

    /// Delivers a finished command's response: to the Sync Coordinator's
    /// queue if it must go out over the replication channel (only the
    /// Sync Coordinator talks to peers), otherwise straight to the local
    /// reply channel — unless the command's socket was never registered
    /// (forget, or deferred), in which case the response is discarded.
    fn finish(&self, cmd: Command) {
        if cmd.initiating_peer_id.is_none() {
            if cmd.reply_owed {
                self.reply.send(cmd.initiating_client_id, cmd.response);
            }
        } else {
            self.sync_queue.push(cmd);
        }
    }
}

fn error_response(err: &EngineError) -> Response {
    Response::new(format!("{} {err}", err.status_code()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use peridot_engine::mock::InMemoryExecutor;
    use peridot_types::{ClientId, CommandId, PeerId};
    use peridot_wire::Request;

    use super::*;
    use crate::reply;

    fn write_cmd(id: &str, key: &str, value: &str) -> Command {
        let mut req = Request::new(format!("write {id}"));
        req.headers.push("key", key);
        req.headers.push("value", value);
        Command::from_client(CommandId::new(id), req, ClientId::from(1))
    }

    #[test]
    fn successful_write_replies_locally() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let worker = Worker {
            index: 0,
            queue: &queue,
            sync_queue: &sync_queue,
            executor: &executor,
            reply: tx,
            metrics: &metrics,
        };

        worker.handle(write_cmd("c1", "a", "1"));

        let replies = rx.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].client, ClientId::from(1));
        assert!(sync_queue.is_empty());
    }

    #[test]
    fn retries_absorb_transient_conflicts_then_succeed() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        executor.force_conflicts(2);
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let worker = Worker {
            index: 0,
            queue: &queue,
            sync_queue: &sync_queue,
            executor: &executor,
            reply: tx,
            metrics: &metrics,
        };

        worker.handle(write_cmd("c1", "a", "1"));

        assert_eq!(rx.drain().len(), 1);
        assert!(sync_queue.is_empty());
    }

    #[test]
    fn retries_exhausted_escalates_to_sync_coordinator() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        executor.force_conflicts(3);
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let worker = Worker {
            index: 0,
            queue: &queue,
            sync_queue: &sync_queue,
            executor: &executor,
            reply: tx,
            metrics: &metrics,
        };

        worker.handle(write_cmd("c1", "a", "1"));

        assert!(rx.drain().is_empty());
        assert_eq!(sync_queue.len(), 1);
        assert_eq!(metrics.commit_conflicts_total.get(), 3);
        assert_eq!(metrics.escalations_total.get(), 1);
    }

    #[test]
    fn peer_originated_completion_routes_through_sync_queue_not_reply() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let worker = Worker {
            index: 0,
            queue: &queue,
            sync_queue: &sync_queue,
            executor: &executor,
            reply: tx,
            metrics: &metrics,
        };

        let mut req = Request::new("write r_1_r");
        req.headers.push("key", "a");
        req.headers.push("value", "1");
        let cmd = Command::from_peer(CommandId::new("p1"), req, PeerId::from(9));

        worker.handle(cmd);

        assert!(rx.drain().is_empty());
        assert_eq!(sync_queue.len(), 1);
    }

    #[test]
    fn already_complete_command_is_delivered_without_reprocessing() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let worker = Worker {
            index: 0,
            queue: &queue,
            sync_queue: &sync_queue,
            executor: &executor,
            reply: tx,
            metrics: &metrics,
        };

        let mut cmd = write_cmd("c1", "a", "1");
        cmd.complete_with(Response::new("756"));
        worker.handle(cmd);

        let replies = rx.drain();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].response.method_line, "756");
    }

    #[test]
    fn forgotten_command_completes_without_a_reply() {
        let queue = CommandQueue::new();
        let sync_queue = CommandQueue::new();
        let executor = InMemoryExecutor::new();
        let metrics = Metrics::new();
        let (tx, rx) = reply::channel();
        let worker = Worker {
            index: 0,
            queue: &queue,
            sync_queue: &sync_queue,
            executor: &executor,
            reply: tx,
            metrics: &metrics,
        };

        let mut cmd = write_cmd("c1", "a", "1");
        cmd.reply_owed = false;
        worker.handle(cmd);

        assert!(rx.drain().is_empty());
        assert!(sync_queue.is_empty());
    }

    #[test]
    fn run_exits_after_shutdown_once_queue_drains() {
        let queue = Arc::new(CommandQueue::new());
        let sync_queue = Arc::new(CommandQueue::new());
        let executor = Arc::new(InMemoryExecutor::new());
        let metrics = Arc::new(Metrics::new());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, _rx) = reply::channel();

        let q2 = Arc::clone(&queue);
        let sq2 = Arc::clone(&sync_queue);
        let ex2 = Arc::clone(&executor);
        let mx2 = Arc::clone(&metrics);
        let sd2 = Arc::clone(&shutdown);
        let handle = thread::spawn(move || {
            let worker = Worker {
                index: 0,
                queue: &q2,
                sync_queue: &sq2,
                executor: ex2.as_ref(),
                reply: tx,
                metrics: mx2.as_ref(),
            };
            worker.run(&sd2);
        });

        thread::sleep(Duration::from_millis(50));
        shutdown.store(true, Ordering::SeqCst);
        handle.join().unwrap();
    }
}

//! The Command Queue: a thread-safe FIFO with O(1) front/pop and
//! id-addressed removal, shared by many producers (the Router, workers
//! bouncing a command) and many consumers (workers, or the Sync
//! Coordinator for its own queue instance).

use std::collections::{HashMap, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use peridot_types::CommandId;

use crate::command::Command;

/// Why a `pop` or `front` call came back empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// The queue held nothing when `front` was called.
    Empty,
    /// `pop` waited its full timeout without a command arriving.
    Timeout,
}

#[derive(Default)]
struct Inner {
    order: VecDeque<CommandId>,
    index: HashMap<CommandId, Command>,
}

/// A FIFO queue of commands, addressable by id.
///
/// Two independent instances exist per node: the main Command Queue (fed
/// by the Router, drained by workers) and the Sync Coordinator's own queue
/// (fed by workers bouncing writes, by retries, and by peer-originated
/// commands).
pub struct CommandQueue {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            not_empty: Condvar::new(),
        }
    }

    /// Appends `cmd`, waking at most one blocked consumer.
    pub fn push(&self, cmd: Command) {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        inner.order.push_back(cmd.id.clone());
        inner.index.insert(cmd.id.clone(), cmd);
        self.not_empty.notify_one();
    }

    /// Blocks up to `timeout` for a command, then returns the oldest one.
    pub fn pop(&self, timeout: Duration) -> Result<Command, QueueError> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        loop {
            if let Some(cmd) = Self::pop_front(&mut inner) {
                return Ok(cmd);
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(QueueError::Timeout);
            }
            let (guard, timeout_result) = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .expect("queue lock poisoned");
            inner = guard;
            if timeout_result.timed_out() && inner.order.is_empty() {
                return Err(QueueError::Timeout);
            }
        }
    }

    /// Returns a clone of the oldest command without removing it.
    ///
    /// The queue hands out clones rather than references so callers never
    /// hold the internal lock across other work.
    pub fn front(&self) -> Result<Command, QueueError> {
        let inner = self.inner.lock().expect("queue lock poisoned");
        inner
            .order
            .front()
            .and_then(|id| inner.index.get(id))
            .cloned()
            .ok_or(QueueError::Empty)
    }

    /// Removes and returns the oldest command, if any, without blocking.
    pub fn try_pop(&self) -> Option<Command> {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        Self::pop_front(&mut inner)
    }

    fn pop_front(inner: &mut Inner) -> Option<Command> {
        let id = inner.order.pop_front()?;
        inner.index.remove(&id)
    }

    /// Removes the command with the given id from anywhere in the queue,
    /// not just the front. Used by `cancel_command`.
    pub fn remove_by_id(&self, id: &CommandId) -> bool {
        let mut inner = self.inner.lock().expect("queue lock poisoned");
        if inner.index.remove(id).is_some() {
            inner.order.retain(|queued| queued != id);
            true
        } else {
            false
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().expect("queue lock poisoned").order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").order.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use peridot_wire::Request;

    use super::*;
    use crate::command::Command;
    use peridot_types::ClientId;

    fn cmd(id: &str) -> Command {
        Command::from_client(CommandId::new(id), Request::new("cmd r_1_r"), ClientId::from(1))
    }

    #[test]
    fn fifo_order_is_preserved() {
        let q = CommandQueue::new();
        q.push(cmd("a"));
        q.push(cmd("b"));
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap().id.as_str(), "a");
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap().id.as_str(), "b");
    }

    #[test]
    fn pop_times_out_when_empty() {
        let q = CommandQueue::new();
        assert_eq!(q.pop(Duration::from_millis(20)), Err(QueueError::Timeout));
    }

    #[test]
    fn front_does_not_remove() {
        let q = CommandQueue::new();
        q.push(cmd("a"));
        assert_eq!(q.front().unwrap().id.as_str(), "a");
        assert_eq!(q.front().unwrap().id.as_str(), "a");
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn front_on_empty_queue_is_empty_error() {
        let q = CommandQueue::new();
        assert_eq!(q.front(), Err(QueueError::Empty));
    }

    #[test]
    fn remove_by_id_removes_from_middle() {
        let q = CommandQueue::new();
        q.push(cmd("a"));
        q.push(cmd("b"));
        q.push(cmd("c"));
        assert!(q.remove_by_id(&CommandId::new("b")));
        assert!(!q.remove_by_id(&CommandId::new("b")));
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap().id.as_str(), "a");
        assert_eq!(q.pop(Duration::from_millis(10)).unwrap().id.as_str(), "c");
    }

    #[test]
    fn blocked_pop_wakes_on_push() {
        let q = Arc::new(CommandQueue::new());
        let q2 = Arc::clone(&q);
        let handle = thread::spawn(move || q2.pop(Duration::from_secs(5)).unwrap());

        thread::sleep(Duration::from_millis(20));
        q.push(cmd("a"));

        let popped = handle.join().unwrap();
        assert_eq!(popped.id.as_str(), "a");
    }
}

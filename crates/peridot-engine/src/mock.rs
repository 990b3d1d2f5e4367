//! An in-memory [`CommandExecutor`] used by tests in this crate and by
//! `peridot-server`'s dispatch pipeline tests.
//!
//! Understands two commands:
//! - `read` (header `key`) — peek-only, answers from the store or 404s.
//! - `write` (headers `key`, `value`) — needs process + commit.
//!
//! Conflict injection: [`InMemoryExecutor::force_conflicts`] makes the next
//! `n` `commit` calls return [`EngineError::CommitConflict`], for exercising
//! a worker's retry-then-escalate path without real contention.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

use peridot_wire::{Request, Response};

use crate::{CommandExecutor, EngineError, EngineResult, PeekOutcome, ProcessOutcome};

#[derive(Debug, Default)]
pub struct InMemoryExecutor {
    store: RwLock<HashMap<String, String>>,
    pending: Mutex<HashMap<String, PendingWrite>>,
    conflicts_remaining: AtomicUsize,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    key: String,
    value: String,
}

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a key directly, bypassing process/commit (test setup helper).
    pub fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
        self.store.write().expect("store lock poisoned").insert(key.into(), value.into());
    }

    /// Makes the next `n` `commit` calls fail with `CommitConflict`.
    pub fn force_conflicts(&self, n: usize) {
        self.conflicts_remaining.store(n, Ordering::SeqCst);
    }

    fn command_id(command: &Request) -> String {
        command.method_line.clone()
    }

    fn header(command: &Request, name: &str) -> EngineResult<String> {
        command
            .headers
            .get(name)
            .map(str::to_string)
            .ok_or_else(|| EngineError::InvalidRequest(format!("missing header {name:?}")))
    }
}

impl CommandExecutor for InMemoryExecutor {
    fn peek(&self, command: &Request) -> EngineResult<PeekOutcome> {
        match command.command_name() {
            "read" => {
                let key = Self::header(command, "key")?;
                let store = self.store.read().expect("store lock poisoned");
                match store.get(&key) {
                    Some(value) => Ok(PeekOutcome::Complete(
                        Response::new("200 OK").with_body(value.clone().into_bytes()),
                    )),
                    None => Err(EngineError::UnrecognizedCommand(format!("no such key {key:?}"))),
                }
            }
            "write" => Ok(PeekOutcome::NeedsProcess),
            other => Err(EngineError::UnrecognizedCommand(other.to_string())),
        }
    }

    fn process(&self, command: &Request) -> EngineResult<ProcessOutcome> {
        let key = Self::header(command, "key")?;
        let value = Self::header(command, "value")?;
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .insert(Self::command_id(command), PendingWrite { key, value });
        Ok(ProcessOutcome {
            needs_commit: true,
            response: Response::new("200 OK"),
        })
    }

    fn commit(&self, command: &Request) -> EngineResult<Response> {
        if self
            .conflicts_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(EngineError::CommitConflict);
        }

        let id = Self::command_id(command);
        let pending = self
            .pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&id)
            .ok_or_else(|| EngineError::InvalidRequest("commit with no staged write".to_string()))?;

        self.store
            .write()
            .expect("store lock poisoned")
            .insert(pending.key, pending.value);
        Ok(Response::new("200 OK"))
    }

    fn rollback(&self, command: &Request) {
        self.pending
            .lock()
            .expect("pending lock poisoned")
            .remove(&Self::command_id(command));
    }
}


#[cfg(test)]
trait RequestTestExt {
    fn with_header_for_test(self, name: &str, value: &str) -> Self;
}

#[cfg(test)]
impl RequestTestExt for Request {
    fn with_header_for_test(mut self, name: &str, value: &str) -> Self {
        self.headers.push(name, value);
        self
    }
}

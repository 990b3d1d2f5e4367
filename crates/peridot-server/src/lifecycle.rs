//! The Lifecycle Controller: decides when the command port (and each
//! enabled plugin's auxiliary port) should be open, reacts to operator
//! signals, and determines when graceful shutdown has finished.
//!
//! Binding and closing the actual listening sockets is the event loop's
//! job (`server.rs`); this module only owns the decision of *whether*
//! they should be open on a given tick, so that decision can be tested
//! without a real socket.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use peridot_replication::ReplicationControl;
use peridot_types::ReplicaRole;

/// Whether the command port should be open right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortState {
    Open,
    Closed,
}

/// The effect an operator signal had, for logging at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEffect {
    ManuallySuppressed,
    ManuallyUnsuppressed,
    QueryLogStarted,
    QueryLogStartRequestedButNotConfigured,
    QueryLogStopped,
    ShutdownRequested,
}

pub struct LifecycleController {
    /// `None` until an operator has manually toggled suppression; once set,
    /// only another manual toggle clears or changes it. Automatic
    /// version-skew logic never touches this field.
    manual_suppress: Mutex<Option<bool>>,
    shutdown_requested: AtomicBool,
    query_log_path: Option<PathBuf>,
    query_log_active: AtomicBool,
}

impl LifecycleController {
    pub fn new(query_log_path: Option<PathBuf>) -> Self {
        Self {
            manual_suppress: Mutex::new(None),
            shutdown_requested: AtomicBool::new(false),
            query_log_path,
            query_log_active: AtomicBool::new(false),
        }
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn query_log_active(&self) -> bool {
        self.query_log_active.load(Ordering::SeqCst)
    }

    /// Manually forces command-port suppression on or off. Sticky: once
    /// called, automatic version-skew logic in [`Self::port_state`] is
    /// ignored until this is called again.
    pub fn set_manual_suppression(&self, suppress: bool) {
        *self.manual_suppress.lock().expect("manual suppress lock poisoned") = Some(suppress);
    }

    fn is_suppressed(&self, role: ReplicaRole, our_version: &str, leader_version: &str) -> bool {
        if let Some(manual) = *self.manual_suppress.lock().expect("manual suppress lock poisoned") {
            return manual;
        }
        role == ReplicaRole::Slaving && leader_version != our_version
    }

    /// The port state the event loop should converge to on this tick.
    pub fn port_state(&self, role: ReplicaRole, our_version: &str, leader_version: &str) -> PortState {
        if self.is_shutdown_requested() {
            return PortState::Closed;
        }
        if !matches!(role, ReplicaRole::Mastering | ReplicaRole::Slaving) {
            return PortState::Closed;
        }
        if self.is_suppressed(role, our_version, leader_version) {
            return PortState::Closed;
        }
        PortState::Open
    }

    /// True once the node has nothing left to finish: shutdown was
    /// requested, the cached replication role has descended to at most
    /// `Waiting`, and the Command Queue has drained.
    pub fn graceful_shutdown_complete(&self, cached_role: ReplicaRole, queue_empty: bool) -> bool {
        self.is_shutdown_requested() && cached_role <= ReplicaRole::Waiting && queue_empty
    }

    /// Error category 8: if the replication node reports it has finished
    /// shutting down but the Sync Coordinator's cached role hasn't caught
    /// up past `Waiting`, force it down to unblock exit.
    pub fn reconcile_stuck_role(
        &self,
        replication: &dyn ReplicationControl,
        cached_role: ReplicaRole,
    ) -> Option<ReplicaRole> {
        if replication.shutdown_complete() && cached_role > ReplicaRole::Waiting {
            tracing::warn!(role = %cached_role, "shutdown_complete but role stuck above Waiting, forcing Searching");
            return Some(ReplicaRole::Searching);
        }
        None
    }

    fn begin_query_log(&self) -> SignalEffect {
        if self.query_log_path.is_none() {
            return SignalEffect::QueryLogStartRequestedButNotConfigured;
        }
        self.query_log_active.store(true, Ordering::SeqCst);
        SignalEffect::QueryLogStarted
    }

    fn stop_query_log(&self) -> SignalEffect {
        self.query_log_active.store(false, Ordering::SeqCst);
        SignalEffect::QueryLogStopped
    }

    pub fn query_log_path(&self) -> Option<&Path> {
        self.query_log_path.as_deref()
    }
}

#[cfg(unix)]
impl LifecycleController {
    /// Dispatches one received OS signal. `SIGTTIN`/`SIGTTOU` toggle manual
    /// command-port suppression, `SIGUSR2`/`SIGQUIT` toggle query logging,
    /// and anything else begins graceful shutdown.
    pub fn handle_signal(&self, signal: i32) -> SignalEffect {
        use signal_hook::consts::signal::{SIGQUIT, SIGTTIN, SIGTTOU, SIGUSR2};

        match signal {
            SIGTTIN => {
                self.set_manual_suppression(true);
                SignalEffect::ManuallySuppressed
            }
            SIGTTOU => {
                self.set_manual_suppression(false);
                SignalEffect::ManuallyUnsuppressed
            }
            SIGUSR2 => self.begin_query_log(),
            SIGQUIT => self.stop_query_log(),
            _ => {
                self.request_shutdown();
                SignalEffect::ShutdownRequested
            }
        }
    }
}

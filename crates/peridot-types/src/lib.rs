//! # peridot-types: Core types for Peridot
//!
//! Shared types used across the dispatch pipeline:
//! - Connection/peer identity ([`ClientId`], [`PeerId`])
//! - Command identity ([`CommandId`])
//! - Temporal types ([`Timestamp`])
//! - Replication contract types ([`ReplicaRole`], [`WriteConsistency`])

use std::fmt::{self, Display};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Identifies the local socket a client command arrived on.
///
/// Zero means "no local client" (e.g. a peer-originated command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct ClientId(u64);

impl ClientId {
    pub const NONE: Self = Self(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ClientId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ClientId> for u64 {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

/// Identifies the remote peer a replication-escalated command arrived from.
///
/// Zero means "no peer" (e.g. a locally originated command).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct PeerId(u64);

impl PeerId {
    pub const NONE: Self = Self(0);

    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for PeerId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<PeerId> for u64 {
    fn from(id: PeerId) -> Self {
        id.0
    }
}

/// Stable identifier for a command, unique within a node's lifetime.
///
/// Generated client-side or synthesized by the router; carried through
/// every queue the command passes through so it can be removed by id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommandId(String);

impl CommandId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic generator for ids handed to commands with no client-supplied id.
///
/// Process-lifetime unique; not persisted or compared across restarts.
#[derive(Debug, Default)]
pub struct CommandIdGenerator {
    next: AtomicU64,
}

impl CommandIdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn generate(&self) -> CommandId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        CommandId::new(format!("auto-{n}"))
    }
}

/// Microseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub fn as_micros(self) -> u64 {
        self.0
    }

    /// Reads the current wall-clock time.
    ///
    /// # Panics
    ///
    /// Panics if the system clock is set before the Unix epoch.
    pub fn now() -> Self {
        let d = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before unix epoch");
        Self(d.as_micros() as u64)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How many peers must acknowledge a commit before it is considered successful.
///
/// A hint passed to the replication node's `start_commit`; the replication
/// node itself enforces the consistency level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WriteConsistency {
    /// No peer acknowledgement required before reporting success locally.
    #[default]
    Async,
    /// At least one peer must acknowledge.
    One,
    /// A quorum of peers must acknowledge.
    Quorum,
}

impl WriteConsistency {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ASYNC" => Some(Self::Async),
            "ONE" => Some(Self::One),
            "QUORUM" => Some(Self::Quorum),
            _ => None,
        }
    }
}

impl Display for WriteConsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Async => "ASYNC",
            Self::One => "ONE",
            Self::Quorum => "QUORUM",
        };
        write!(f, "{s}")
    }
}

/// Role of the replication state machine, as observed by the dispatch pipeline.
///
/// Ordered so that `role <= Waiting` identifies the "not yet part of a
/// cluster" states used by the shutdown check in the lifecycle controller.
/// Only `Mastering` may originate commits; only `Mastering` and `Slaving`
/// may accept client commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ReplicaRole {
    /// Bootstrapping: looking for other nodes in the cluster.
    Searching,
    /// Elected a leader candidate but not yet ready to serve.
    Waiting,
    /// Becoming the leader; mid-handoff.
    StandingUp,
    /// The write leader. May commit.
    Mastering,
    /// Relinquishing leadership; mid-handoff.
    StandingDown,
    /// A follower. May serve reads, escalates writes.
    Slaving,
}

impl ReplicaRole {
    /// True for the two roles in which client commands are accepted.
    pub fn accepts_commands(self) -> bool {
        matches!(self, Self::Mastering | Self::Slaving)
    }

    /// Name used in status responses and logs, matching the wire contract.
    pub fn name(self) -> &'static str {
        match self {
            Self::Searching => "SEARCHING",
            Self::Waiting => "WAITING",
            Self::StandingUp => "STANDINGUP",
            Self::Mastering => "MASTERING",
            Self::StandingDown => "STANDINGDOWN",
            Self::Slaving => "SLAVING",
        }
    }
}

impl Display for ReplicaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

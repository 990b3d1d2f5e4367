//! The unit of work flowing through the dispatch pipeline.

use peridot_types::{ClientId, CommandId, PeerId, Timestamp, WriteConsistency};
use peridot_wire::{Request, Response};

/// A command in flight somewhere in the pipeline: a socket, the Command
/// Queue, a worker, or the Sync Coordinator's queue.
///
/// Exactly one of `initiating_client_id` / `initiating_peer_id` is non-zero
/// for any command that needs a reply path; both are zero only for
/// internally generated work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub id: CommandId,
    pub request: Request,
    pub response: Response,
    pub initiating_client_id: ClientId,
    pub initiating_peer_id: PeerId,
    pub write_consistency: WriteConsistency,
    pub complete: bool,
    /// False for a command whose socket was never registered (forget,
    /// or deferred past `commandExecuteTime`): the immediate `202` ack
    /// already satisfied the client, so the eventual real response must
    /// be discarded rather than delivered a second time.
    pub reply_owed: bool,
    /// Set while an outbound HTTPS call is outstanding on this command's
    /// behalf. The HTTPS manager itself is out of scope; only the presence
    /// of a pending call matters to routing.
    pub has_https_request: bool,
    /// Absolute microseconds after which this command may execute. `None`
    /// means "immediately".
    pub scheduled_execute_time: Option<Timestamp>,
}

impl Command {
    /// Builds a new, incomplete, locally-originated command.
    pub fn from_client(id: CommandId, request: Request, client: ClientId) -> Self {
        let write_consistency = request
            .headers
            .get("writeConsistency")
            .and_then(WriteConsistency::parse)
            .unwrap_or_default();
        let scheduled_execute_time = request
            .headers
            .get("commandExecuteTime")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Timestamp::from_micros);

        Self {
            id,
            request,
            response: Response::default(),
            initiating_client_id: client,
            initiating_peer_id: PeerId::NONE,
            write_consistency,
            complete: false,
            reply_owed: true,
            has_https_request: false,
            scheduled_execute_time,
        }
    }

    /// Builds a command escalated from a peer, to be re-injected once this
    /// node (as leader) has a response for it.
    pub fn from_peer(id: CommandId, request: Request, peer: PeerId) -> Self {
        let mut cmd = Self::from_client(id, request, ClientId::NONE);
        cmd.initiating_peer_id = peer;
        cmd
    }

    /// True if this command is deferred past the current time.
    pub fn is_deferred(&self, now: Timestamp) -> bool {
        self.scheduled_execute_time.is_some_and(|t| t > now)
    }

    /// True if the request asked the connection to be forgotten: no local
    /// socket registration, no response delivery.
    pub fn wants_forget(&self) -> bool {
        self.request
            .headers
            .get("Connection")
            .is_some_and(|v| v.eq_ignore_ascii_case("forget"))
    }

    /// A write that isn't `ASYNC`, or one with an outstanding HTTPS call,
    /// must never be committed by a worker — only by the Sync Coordinator.
    pub fn requires_sync_coordinator(&self) -> bool {
        self.has_https_request || self.write_consistency != WriteConsistency::Async
    }

    /// Marks the command complete with the given response.
    pub fn complete_with(&mut self, response: Response) {
        self.response = response;
        self.complete = true;
    }
}

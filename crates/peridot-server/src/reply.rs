//! The single-consumer reply channel.
//!
//! Workers must not touch the Socket Registry directly — only the Sync
//! Coordinator thread may. Rather than serialize worker access to the
//! registry with a lock, every local reply (from a worker or from the
//! Sync Coordinator itself) is funneled through this channel and applied
//! to the registry exclusively by the Sync Coordinator's tick loop.

use std::sync::mpsc::{self, Receiver, Sender};

use peridot_types::ClientId;
use peridot_wire::Response;

/// One reply destined for a locally-connected client.
#[derive(Debug)]
pub struct LocalReply {
    pub client: ClientId,
    pub response: Response,
}

/// The producer half, cloned into every worker thread.
#[derive(Clone)]
pub struct ReplySender(Sender<LocalReply>);

impl ReplySender {
    pub fn send(&self, client: ClientId, response: Response) {
        // The receiver only disappears at shutdown, after which a reply
        // has nowhere useful to go; dropping it is the correct behavior.
        let _ = self.0.send(LocalReply { client, response });
    }
}

/// The consumer half, owned exclusively by the Sync Coordinator.
pub struct ReplyReceiver(Receiver<LocalReply>);

impl ReplyReceiver {
    /// Drains every reply currently buffered, without blocking.
    pub fn drain(&self) -> Vec<LocalReply> {
        self.0.try_iter().collect()
    }
}

/// Builds a fresh reply channel.
pub fn channel() -> (ReplySender, ReplyReceiver) {
    let (tx, rx) = mpsc::channel();
    (ReplySender(tx), ReplyReceiver(rx))
}

//! The Socket Registry: client-id → live connection, touched only from
//! the Sync Coordinator thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use peridot_types::ClientId;

use crate::connection::Connection;

/// Maps client connection ids to their live [`Connection`].
///
/// Entries are created the moment a TCP connection is accepted and removed
/// only when the peer closes the socket (see `server.rs::accept_connections`
/// / `service_connection`); registration is not conditioned on whether a
/// reply will ever be owed for what the client sends. `Command::reply_owed`
/// is what actually decides whether a forgotten or deferred command's
/// eventual response gets delivered once it completes.
#[derive(Default)]
pub struct SocketRegistry {
    connections: HashMap<ClientId, Connection>,
    next_id: AtomicU64,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocates a fresh client id. Zero is reserved for "no local client".
    pub fn next_id(&self) -> ClientId {
        ClientId::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn insert(&mut self, connection: Connection) {
        self.connections.insert(connection.id, connection);
    }

    pub fn get_mut(&mut self, id: ClientId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.connections.contains_key(&id)
    }

    pub fn remove(&mut self, id: ClientId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&ClientId, &mut Connection)> {
        self.connections.iter_mut()
    }
}

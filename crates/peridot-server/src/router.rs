//! The Command Router: admission layer at the connection level.
//!
//! Runs on the Sync Coordinator's event-loop thread. Parses at most one
//! request per connection per tick, and either answers it synchronously
//! (fire-and-forget ack, or an inline status command) or pushes it onto
//! the Command Queue for a worker to pick up.

use peridot_types::{CommandIdGenerator, ReplicaRole, Timestamp};
use peridot_wire::{Response, WireError};

use crate::command::Command;
use crate::connection::Connection;
use crate::plugin::PluginRegistry;
use crate::queue::CommandQueue;
use crate::status;

#[derive(Default)]
pub struct Router {
    id_generator: CommandIdGenerator,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes whatever request bytes are currently buffered on `conn`.
    ///
    /// A `Connection: forget` request or one deferred into the future gets
    /// an immediate `202 Successfully queued` ack and is still pushed onto
    /// the Command Queue for execution; because the connection was never
    /// marked in-flight, any later reply attempt finds no registered
    /// socket and is silently discarded, per the socket-level-loss error
    /// category. A status command never reaches the queue at all.
    pub fn poll_connection(
        &self,
        conn: &mut Connection,
        queue: &CommandQueue,
        now: Timestamp,
        role: ReplicaRole,
        our_version: &str,
        leader_version: &str,
        plugins: &PluginRegistry,
    ) -> Result<(), WireError> {
        if !conn.has_buffered_request_bytes() {
            return Ok(());
        }
        if conn.dequeue_in_flight() {
            tracing::debug!(client = %conn.id, "refusing second in-flight dequeue to preserve response order");
            return Ok(());
        }

        let Some(request) = conn.try_decode_request()? else {
            return Ok(());
        };

        let id = self.id_generator.generate();
        let mut cmd = Command::from_client(id, request, conn.id);

        if cmd.wants_forget() || cmd.is_deferred(now) {
            conn.queue_response(&Response::queued());
            // The socket is never registered as in-flight for this command
            // (see `server.rs::service_connection`), so the eventual real
            // response has no connection to land on; suppress delivery
            // instead of letting it surface as an unsolicited second reply.
            cmd.reply_owed = false;
            queue.push(cmd);
            return Ok(());
        }

        if status::is_status_command(&cmd.request) {
            let resp = status::handle(&cmd.request, role, our_version, leader_version, plugins);
            conn.queue_response(&resp);
            return Ok(());
        }

        conn.mark_dequeued();
        queue.push(cmd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::net::TcpListener as StdTcpListener;
    use std::time::Duration;

    use mio::net::TcpStream;
    use peridot_types::ClientId;

    use super::*;

    fn connected(id: ClientId) -> (Connection, std::net::TcpStream) {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (Connection::new(id, TcpStream::from_std(server)), client)
    }

    fn send(client: &mut std::net::TcpStream, conn: &mut Connection, bytes: &[u8]) {
        client.write_all(bytes).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        conn.read().unwrap();
    }

    #[test]
    fn plain_command_is_queued_and_marks_in_flight() {
        let (mut conn, mut client) = connected(ClientId::from(1));
        send(&mut client, &mut conn, b"write r_1_r\r\n\r\n");

        let queue = CommandQueue::new();
        let router = Router::new();
        router
            .poll_connection(
                &mut conn,
                &queue,
                Timestamp::from_micros(0),
                ReplicaRole::Mastering,
                "A",
                "A",
                &PluginRegistry::new(),
            )
            .unwrap();

        assert_eq!(queue.len(), 1);
        assert!(conn.dequeue_in_flight());
    }

    #[test]
    fn second_request_on_in_flight_connection_is_deferred() {
        let (mut conn, mut client) = connected(ClientId::from(1));
        send(&mut client, &mut conn, b"write r_1_r\r\n\r\n");

        let queue = CommandQueue::new();
        let router = Router::new();
        let poll = |conn: &mut Connection| {
            router.poll_connection(
                conn,
                &queue,
                Timestamp::from_micros(0),
                ReplicaRole::Mastering,
                "A",
                "A",
                &PluginRegistry::new(),
            )
        };
        poll(&mut conn).unwrap();
        send(&mut client, &mut conn, b"write r_2_r\r\n\r\n");
        poll(&mut conn).unwrap();

        assert_eq!(queue.len(), 1, "second request must wait for the first to reply");
    }

    #[test]
    fn forget_command_acks_immediately_and_still_queues() {
        let (mut conn, mut client) = connected(ClientId::from(1));
        send(&mut client, &mut conn, b"write r_1_r\r\nConnection: forget\r\n\r\n");

        let queue = CommandQueue::new();
        let router = Router::new();
        router
            .poll_connection(
                &mut conn,
                &queue,
                Timestamp::from_micros(0),
                ReplicaRole::Mastering,
                "A",
                "A",
                &PluginRegistry::new(),
            )
            .unwrap();

        assert_eq!(queue.len(), 1);
        assert!(!conn.dequeue_in_flight());
        assert!(conn.has_pending_writes());

        let queued = queue.try_pop().unwrap();
        assert!(!queued.reply_owed, "forgotten command must not owe a reply");
    }

    #[test]
    fn status_command_never_reaches_the_queue() {
        let (mut conn, mut client) = connected(ClientId::from(1));
        send(&mut client, &mut conn, b"status r_1_r\r\nStatus: ping\r\n\r\n");

        let queue = CommandQueue::new();
        let router = Router::new();
        router
            .poll_connection(
                &mut conn,
                &queue,
                Timestamp::from_micros(0),
                ReplicaRole::Mastering,
                "A",
                "A",
                &PluginRegistry::new(),
            )
            .unwrap();

        assert!(queue.is_empty());
        assert!(conn.has_pending_writes());
    }
}

//! A single client connection's non-blocking read/write buffers and
//! decode/encode state.

use std::io::{self, Read, Write};

use bytes::BytesMut;
use mio::net::TcpStream;
use mio::Interest;
use peridot_types::ClientId;
use peridot_wire::{codec, Request, Response};

const READ_CHUNK: usize = 8 * 1024;

/// One client's socket plus its pending read/write bytes.
///
/// At most one request may be dequeued-and-in-flight per connection at a
/// time (enforced by the Router via [`Connection::dequeue_in_flight`]) so
/// that responses are returned in submission order.
pub struct Connection {
    pub id: ClientId,
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
    dequeue_in_flight: bool,
}

impl Connection {
    pub fn new(id: ClientId, stream: TcpStream) -> Self {
        Self {
            id,
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            write_buf: BytesMut::new(),
            dequeue_in_flight: false,
        }
    }

    pub fn dequeue_in_flight(&self) -> bool {
        self.dequeue_in_flight
    }

    pub fn mark_dequeued(&mut self) {
        self.dequeue_in_flight = true;
    }

    pub fn mark_replied(&mut self) {
        self.dequeue_in_flight = false;
    }

    /// Reads whatever is available without blocking. Returns `Ok(true)` if
    /// the peer closed the connection.
    pub fn read(&mut self) -> io::Result<bool> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => return Ok(true),
                Ok(n) => self.read_buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(false),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Attempts to decode exactly one request out of the buffered bytes.
    pub fn try_decode_request(&mut self) -> Result<Option<Request>, peridot_wire::WireError> {
        codec::decode_request(&mut self.read_buf)
    }

    pub fn has_buffered_request_bytes(&self) -> bool {
        !self.read_buf.is_empty()
    }

    /// Queues a response for writing; actual bytes go out on the next
    /// `flush_writes` call once the socket is writable.
    pub fn queue_response(&mut self, response: &Response) {
        codec::encode_response(response, &mut self.write_buf);
    }

    /// Writes as much of the pending buffer as the socket accepts.
    pub fn flush_writes(&mut self) -> io::Result<()> {
        while !self.write_buf.is_empty() {
            match self.stream.write(&self.write_buf) {
                Ok(0) => break,
                Ok(n) => {
                    let _ = self.write_buf.split_to(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn has_pending_writes(&self) -> bool {
        !self.write_buf.is_empty()
    }

    pub fn interest(&self) -> Interest {
        if self.has_pending_writes() {
            Interest::READABLE.add(Interest::WRITABLE)
        } else {
            Interest::READABLE
        }
    }

    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;
    use std::net::TcpListener as StdTcpListener;
    use std::time::Duration;

    use super::*;

    fn connected_pair() -> (Connection, std::net::TcpStream) {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = std::net::TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (
            Connection::new(ClientId::from(1), TcpStream::from_std(server)),
            client,
        )
    }

    #[test]
    fn reads_and_decodes_one_request() {
        let (mut conn, mut client) = connected_pair();
        client.write_all(b"testcommand r_1_r\r\n\r\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        assert!(!conn.read().unwrap());
        let req = conn.try_decode_request().unwrap().unwrap();
        assert_eq!(req.method_line, "testcommand r_1_r");
        assert!(conn.try_decode_request().unwrap().is_none());
    }

    #[test]
    fn queued_response_flushes_to_the_peer() {
        use std::io::Read as _;
        let (mut conn, mut client) = connected_pair();
        conn.queue_response(&Response::new("200 OK"));
        conn.flush_writes().unwrap();

        client.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"200 OK\r\n\r\n");
    }

    #[test]
    fn peer_close_is_observed_as_true() {
        let (mut conn, client) = connected_pair();
        drop(client);
        std::thread::sleep(Duration::from_millis(20));
        assert!(conn.read().unwrap());
    }

    #[test]
    fn dequeue_flight_flag_toggles() {
        let (mut conn, _client) = connected_pair();
        assert!(!conn.dequeue_in_flight());
        conn.mark_dequeued();
        assert!(conn.dequeue_in_flight());
        conn.mark_replied();
        assert!(!conn.dequeue_in_flight());
    }
}

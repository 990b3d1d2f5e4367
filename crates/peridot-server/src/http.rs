//! Lightweight HTTP sidecar serving `/metrics`, `/health`, and `/ready` on
//! a separate port from the main command protocol.
//!
//! Minimal HTTP/1.1 parsing: one GET request per connection, no keep-alive.

use std::io::{Read, Write};
use std::net::SocketAddr;

use mio::net::TcpListener;
use mio::{Interest, Poll, Token};

use crate::metrics::Metrics;

/// Token for the HTTP listener in the main event loop's `mio::Poll`.
/// Chosen well above the range used for client/peer connection tokens.
pub const HTTP_LISTENER_TOKEN: Token = Token(usize::MAX - 1);

pub struct HttpSidecar {
    listener: TcpListener,
}

impl HttpSidecar {
    pub fn bind(addr: SocketAddr, poll: &Poll) -> std::io::Result<Self> {
        let mut listener = TcpListener::bind(addr)?;
        poll.registry()
            .register(&mut listener, HTTP_LISTENER_TOKEN, Interest::READABLE)?;
        tracing::info!(%addr, "HTTP sidecar listening");
        Ok(Self { listener })
    }

    /// Drains every pending connection on the sidecar listener, answering
    /// each with exactly one response. `is_ready` reflects whether the
    /// node currently accepts client commands (role is mastering or
    /// slaving and shutdown hasn't been requested).
    pub fn handle_accept(&self, metrics: &Metrics, is_ready: impl Fn() -> bool) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let mut buf = [0_u8; 1024];
                    let n = match stream.read(&mut buf) {
                        Ok(0) => continue,
                        Ok(n) => n,
                        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
                        Err(e) => {
                            tracing::debug!(%addr, error = %e, "HTTP sidecar read error");
                            continue;
                        }
                    };

                    let request = String::from_utf8_lossy(&buf[..n]);
                    let response = match parse_request_path(&request) {
                        Some(path) => dispatch(path, metrics, &is_ready),
                        None => http_response(400, "text/plain", "Bad Request"),
                    };

                    if let Err(e) = stream.write_all(response.as_bytes()) {
                        tracing::debug!(%addr, error = %e, "HTTP sidecar write error");
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    tracing::error!(error = %e, "HTTP sidecar accept error");
                    break;
                }
            }
        }
    }
}

fn parse_request_path(request: &str) -> Option<&str> {
    let first_line = request.lines().next()?;
    let mut parts = first_line.split_whitespace();
    let method = parts.next()?;
    let path = parts.next()?;
    (method == "GET").then_some(path)
}

fn dispatch(path: &str, metrics: &Metrics, is_ready: &impl Fn() -> bool) -> String {
    match path {
        "/metrics" => http_response(200, "text/plain; version=0.0.4; charset=utf-8", &metrics.render()),
        "/health" => http_response(200, "application/json", r#"{"status":"alive"}"#),
        "/ready" => {
            if is_ready() {
                http_response(200, "application/json", r#"{"status":"ready"}"#)
            } else {
                http_response(503, "application/json", r#"{"status":"not ready"}"#)
            }
        }
        _ => http_response(404, "text/plain", "Not Found"),
    }
}

fn http_response(status: u16, content_type: &str, body: &str) -> String {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        503 => "Service Unavailable",
        _ => "Unknown",
    };
    format!(
        "HTTP/1.1 {status} {reason}\r\n\
         Content-Type: {content_type}\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_request_path_accepts_get() {
        assert_eq!(parse_request_path("GET /metrics HTTP/1.1\r\nHost: x\r\n"), Some("/metrics"));
    }

    #[test]
    fn parse_request_path_rejects_non_get() {
        assert_eq!(parse_request_path("POST /metrics HTTP/1.1\r\n"), None);
    }

    #[test]
    fn dispatch_metrics_returns_prometheus_text() {
        let metrics = Metrics::new();
        let resp = dispatch("/metrics", &metrics, &|| true);
        assert!(resp.starts_with("HTTP/1.1 200 OK"));
        assert!(resp.contains("peridot_requests_total"));
    }

    #[test]
    fn dispatch_ready_reflects_probe() {
        let metrics = Metrics::new();
        assert!(dispatch("/ready", &metrics, &|| true).starts_with("HTTP/1.1 200"));
        assert!(dispatch("/ready", &metrics, &|| false).starts_with("HTTP/1.1 503"));
    }

    #[test]
    fn dispatch_unknown_path_is_404() {
        let metrics = Metrics::new();
        assert!(dispatch("/nope", &metrics, &|| true).starts_with("HTTP/1.1 404"));
    }

    #[test]
    fn http_response_formats_headers_and_body() {
        let resp = http_response(200, "text/plain", "OK");
        assert!(resp.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(resp.contains("Content-Length: 2\r\n"));
        assert!(resp.ends_with("OK"));
    }
}

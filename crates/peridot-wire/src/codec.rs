//! Incremental decode/encode of the line-oriented wire format.
//!
//! ```text
//! <method line>\r\n
//! <Header-Name>: <value>\r\n
//! ...
//! \r\n
//! <body, Content-Length bytes>
//! ```
//!
//! Decoding is incremental: if the buffer doesn't yet contain a full
//! message, `decode` returns `Ok(None)` and leaves the buffer untouched so
//! the caller can read more bytes and retry.

use bytes::{Buf, BytesMut};

use crate::error::{WireError, WireResult};
use crate::message::{Headers, Request, Response};

const MAX_HEADER_BYTES: usize = 1 << 20;

/// Attempts to decode one request from `buf`, consuming its bytes on success.
pub fn decode_request(buf: &mut BytesMut) -> WireResult<Option<Request>> {
    let Some((method_line, headers, body)) = decode_raw(buf)? else {
        return Ok(None);
    };
    Ok(Some(Request {
        method_line,
        headers,
        body,
    }))
}

/// Attempts to decode one response from `buf`, consuming its bytes on success.
pub fn decode_response(buf: &mut BytesMut) -> WireResult<Option<Response>> {
    let Some((method_line, headers, body)) = decode_raw(buf)? else {
        return Ok(None);
    };
    Ok(Some(Response {
        method_line,
        headers,
        body,
    }))
}

/// Encodes a request onto the end of `out`.
pub fn encode_request(req: &Request, out: &mut BytesMut) {
    encode_raw(&req.method_line, &req.headers, &req.body, out);
}

/// Encodes a response onto the end of `out`.
pub fn encode_response(resp: &Response, out: &mut BytesMut) {
    encode_raw(&resp.method_line, &resp.headers, &resp.body, out);
}

fn decode_raw(buf: &mut BytesMut) -> WireResult<Option<(String, Headers, Vec<u8>)>> {
    // Find the blank line that terminates the header block.
    let Some(header_end) = find_subslice(&buf[..], b"\r\n\r\n") else {
        if buf.len() > MAX_HEADER_BYTES {
            return Err(WireError::MissingMethodLine);
        }
        return Ok(None);
    };

    let header_block = std::str::from_utf8(&buf[..header_end])?;
    let mut lines = header_block.split("\r\n");

    let method_line = lines
        .next()
        .filter(|l| !l.is_empty())
        .ok_or(WireError::MissingMethodLine)?
        .to_string();

    let mut headers = Headers::new();
    let mut content_length = 0usize;
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| WireError::MalformedHeader(line.to_string()))?;
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value
                .parse()
                .map_err(|_| WireError::InvalidContentLength(value.to_string()))?;
        }
        headers.push(name, value);
    }

    let body_start = header_end + 4;
    let total_len = body_start + content_length;
    if buf.len() < total_len {
        // Body not fully received yet.
        return Ok(None);
    }

    let mut framed = buf.split_to(total_len);
    framed.advance(body_start);
    let body = framed.to_vec();

    Ok(Some((method_line, headers, body)))
}

fn encode_raw(method_line: &str, headers: &Headers, body: &[u8], out: &mut BytesMut) {
    out.extend_from_slice(method_line.as_bytes());
    out.extend_from_slice(b"\r\n");
    for (name, value) in headers.iter() {
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    if !body.is_empty() {
        out.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_simple_request_no_body() {
        let mut buf = BytesMut::from(&b"testcommand r_1_r\r\npeekSleep: 10\r\n\r\n"[..]);
        let req = decode_request(&mut buf).unwrap().unwrap();
        assert_eq!(req.method_line, "testcommand r_1_r");
        assert_eq!(req.headers.get("peekSleep"), Some("10"));
        assert!(req.body.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_waits_for_full_headers() {
        let mut buf = BytesMut::from(&b"testcommand r_1_r\r\npeekSleep: 10\r\n"[..]);
        assert!(decode_request(&mut buf).unwrap().is_none());
        // Original bytes untouched.
        assert_eq!(buf.len(), 35);
    }

    #[test]
    fn decode_waits_for_full_body() {
        let mut buf = BytesMut::from(&b"cmd\r\nContent-Length: 5\r\n\r\nhi"[..]);
        assert!(decode_request(&mut buf).unwrap().is_none());
    }

    #[test]
    fn decode_with_body() {
        let mut buf = BytesMut::from(&b"cmd\r\nContent-Length: 5\r\n\r\nhello"[..]);
        let req = decode_request(&mut buf).unwrap().unwrap();
        assert_eq!(req.body, b"hello");
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_leaves_trailing_bytes_for_next_request() {
        let mut buf = BytesMut::from(&b"cmd1\r\n\r\ncmd2\r\n\r\n"[..]);
        let req = decode_request(&mut buf).unwrap().unwrap();
        assert_eq!(req.method_line, "cmd1");
        assert_eq!(buf.as_ref(), b"cmd2\r\n\r\n");
    }

    #[test]
    fn encode_roundtrips_through_decode() {
        let mut req = Request::new("idcollision r_2_r");
        req.headers.push("writeConsistency", "ASYNC");
        req.body = b"payload".to_vec();

        let mut buf = BytesMut::new();
        encode_request(&req, &mut buf);

        let decoded = decode_request(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn malformed_header_line_is_rejected() {
        let mut buf = BytesMut::from(&b"cmd\r\nnocolonhere\r\n\r\n"[..]);
        assert!(matches!(
            decode_request(&mut buf),
            Err(WireError::MalformedHeader(_))
        ));
    }
}

//! # peridot-wire: the line-oriented request/response protocol
//!
//! A request is a method line, a block of `Name: value` headers, and an
//! optional body whose length is given by a `Content-Length` header. A
//! response uses the same shape with the method line replaced by a status
//! line (`200 OK`, `202 Successfully queued`, ...).
//!
//! Decoding is incremental and non-blocking: [`codec::decode_request`] and
//! [`codec::decode_response`] consume exactly one message's bytes from the
//! front of a buffer and return `Ok(None)` if the buffer doesn't yet hold a
//! complete message, so callers can keep appending bytes read off a socket
//! and retry.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{decode_request, decode_response, encode_request, encode_response};
pub use error::{WireError, WireResult};
pub use message::{Headers, Request, Response};

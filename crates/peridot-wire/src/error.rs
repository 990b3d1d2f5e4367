//! Wire protocol errors.

use thiserror::Error;

/// Result type for wire decode/encode operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur while decoding or encoding a request/response.
#[derive(Debug, Error)]
pub enum WireError {
    /// The method line was missing or empty.
    #[error("missing method line")]
    MissingMethodLine,

    /// A header line could not be split into a name/value pair.
    #[error("malformed header line: {0:?}")]
    MalformedHeader(String),

    /// The `Content-Length` header was present but not a valid integer.
    #[error("invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    /// The buffer contained non-UTF-8 bytes where text was expected.
    #[error("invalid utf-8 in request")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

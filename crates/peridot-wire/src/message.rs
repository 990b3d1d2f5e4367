//! Request/response message shapes.
//!
//! Both directions share the same textual shape: a method line, ordered
//! name/value headers, and an optional body. Requests use the method line
//! for the command name (`testcommand r_1_r`); responses use it for a
//! status code plus message (`200 OK`, `202 Successfully queued`).

/// An ordered list of name/value headers.
///
/// Order is preserved (not a map) because some handlers care about header
/// order for logging/debugging, and duplicates are legal on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    /// Returns the value of the first header matching `name`, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A decoded request: the unit the Router hands to the dispatch pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub method_line: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method_line: impl Into<String>) -> Self {
        Self {
            method_line: method_line.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// The command name, i.e. the method line with any trailing id stripped.
    ///
    /// Method lines look like `testcommand r_1_r`; the first whitespace-
    /// delimited token is the command name used for plugin/status dispatch.
    pub fn command_name(&self) -> &str {
        self.method_line
            .split_whitespace()
            .next()
            .unwrap_or(&self.method_line)
    }
}

/// A decoded or synthesized response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub method_line: String,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(method_line: impl Into<String>) -> Self {
        Self {
            method_line: method_line.into(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Builds the standard `202 Successfully queued` fire-and-forget response.
    pub fn queued() -> Self {
        Self::new("202 Successfully queued")
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name, value);
        self
    }

    /// True if the response was never populated (no method line set).
    pub fn is_empty(&self) -> bool {
        self.method_line.is_empty()
    }
}

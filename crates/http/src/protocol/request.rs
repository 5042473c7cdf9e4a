//! HTTP request model.
//!
//! A [`RequestHead`] is what the request decoder yields once the request line
//! and header block are complete; the connection glue then attaches the
//! collected body and trailers to form a [`Request`]. The same types are used
//! for outbound requests built by [`HttpClient`](crate::client::HttpClient).

use std::fmt;

use bytes::Bytes;
use http::{Method, Version};

use crate::protocol::{HeaderId, Headers};

/// The first line of a request: `METHOD SP URI SP HTTP/M.N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: Method,
    pub uri: String,
    pub version: Version,
}

impl RequestLine {
    pub fn new(method: Method, uri: impl Into<String>, version: Version) -> Self {
        Self { method, uri: uri.into(), version }
    }

    /// Major version digit, always `1` for parsed lines.
    pub fn major(&self) -> u8 {
        1
    }

    /// Minor version digit, `0` or `1`.
    pub fn minor(&self) -> u8 {
        if self.version == Version::HTTP_10 { 0 } else { 1 }
    }
}

impl fmt::Display for RequestLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} HTTP/{}.{}", self.method, self.uri, self.major(), self.minor())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub line: RequestLine,
    pub headers: Headers,
}

impl RequestHead {
    /// Creates an HTTP/1.1 request head without headers.
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self { line: RequestLine::new(method, uri, Version::HTTP_11), headers: Headers::new() }
    }

    pub fn method(&self) -> &Method {
        &self.line.method
    }

    pub fn uri(&self) -> &str {
        &self.line.uri
    }

    /// The request target without its query string.
    pub fn path(&self) -> &str {
        self.line.uri.split_once('?').map_or(self.line.uri.as_str(), |(path, _)| path)
    }

    pub fn query(&self) -> Option<&str> {
        self.line.uri.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> Version {
        self.line.version
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn header(mut self, id: HeaderId, value: impl Into<String>) -> Self {
        self.headers.insert_id(id, value);
        self
    }

    /// Whether the connection stays open after this exchange.
    ///
    /// HTTP/1.1 is persistent unless `Connection: close`; HTTP/1.0 only with
    /// an explicit `Connection: keep-alive`.
    pub fn keep_alive(&self) -> bool {
        match self.version() {
            Version::HTTP_10 => self.headers.keep_alive() && !self.headers.close_connection(),
            _ => !self.headers.close_connection(),
        }
    }

    /// Attaches a body, converting the head into a full [`Request`].
    pub fn body<B>(self, body: B) -> Request<B> {
        Request { head: self, body, trailers: Headers::new() }
    }
}

/// A complete request: head, body and, for chunked bodies, the trailer fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request<B = Bytes> {
    head: RequestHead,
    body: B,
    trailers: Headers,
}

impl<B> Request<B> {
    pub fn from_parts(head: RequestHead, body: B, trailers: Headers) -> Self {
        Self { head, body, trailers }
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }

    pub fn method(&self) -> &Method {
        self.head.method()
    }

    pub fn uri(&self) -> &str {
        self.head.uri()
    }

    pub fn path(&self) -> &str {
        self.head.path()
    }

    pub fn version(&self) -> Version {
        self.head.version()
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.head.headers
    }

    pub fn body(&self) -> &B {
        &self.body
    }

    pub fn trailers(&self) -> &Headers {
        &self.trailers
    }

    pub fn into_parts(self) -> (RequestHead, B, Headers) {
        (self.head, self.body, self.trailers)
    }
}

//! HTTP response model.
//!
//! [`Response`] is both what handlers return (with an `http_body::Body`) and
//! what the client decoder assembles from the wire (with `Bytes`).

use std::fmt;

use bytes::Bytes;
use http::{StatusCode, Version};
use http_body_util::Full;

use crate::protocol::{HeaderId, Headers};

/// The first line of a response: `HTTP/M.N SP CODE SP REASON`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub version: Version,
    pub status: StatusCode,
    pub reason: String,
}

impl StatusLine {
    /// An HTTP/1.1 status line with the canonical reason phrase, empty for unknown codes.
    pub fn new(status: StatusCode) -> Self {
        Self { version: Version::HTTP_11, status, reason: status.canonical_reason().unwrap_or("").to_string() }
    }

    pub fn major(&self) -> u8 {
        1
    }

    pub fn minor(&self) -> u8 {
        if self.version == Version::HTTP_10 { 0 } else { 1 }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP/{}.{} {} {}", self.major(), self.minor(), self.status.as_str(), self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    pub line: StatusLine,
    pub headers: Headers,
}

impl ResponseHead {
    pub fn new(status: StatusCode) -> Self {
        Self { line: StatusLine::new(status), headers: Headers::new() }
    }

    pub fn status(&self) -> StatusCode {
        self.line.status
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

    /// 1xx, 204 and 304 responses never carry a body or framing header.
    pub fn forbids_body(&self) -> bool {
        let status = self.line.status;
        status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response<B = Full<Bytes>> {
    head: ResponseHead,
    body: B,
    trailers: Headers,
}

impl<B> Response<B> {
    pub fn new(status: StatusCode, body: B) -> Self {
        Self { head: ResponseHead::new(status), body, trailers: Headers::new() }
    }

    pub fn from_parts(head: ResponseHead, body: B, trailers: Headers) -> Self {
        Self { head, body, trailers }
    }

    /// Sets a header, replacing any previous value.
    pub fn header(mut self, id: HeaderId, value: impl Into<String>) -> Self {
        self.head.headers.insert_id(id, value);
        self
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    pub fn head_mut(&mut self) -> &mut ResponseHead {
        &mut self.head
    }

    pub fn status(&self) -> StatusCode {
        self.head.status()
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

    /// Trailer fields, written after the last chunk when the body is chunked.
    pub fn trailers(&self) -> &Headers {
        &self.trailers
    }

    pub fn trailers_mut(&mut self) -> &mut Headers {
        &mut self.trailers
    }

    pub fn map_body<T>(self, f: impl FnOnce(B) -> T) -> Response<T> {
        Response { head: self.head, body: f(self.body), trailers: self.trailers }
    }

    pub fn into_parts(self) -> (ResponseHead, B, Headers) {
        (self.head, self.body, self.trailers)
    }
}

impl Response<Full<Bytes>> {
    /// An empty response with the given status.
    pub fn with_status(status: StatusCode) -> Self {
        Self::new(status, Full::new(Bytes::new()))
    }

    /// A `text/plain; charset=utf-8` response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status, Full::new(Bytes::from(body.into())))
            .header(HeaderId::ContentType, mime::TEXT_PLAIN_UTF_8.as_ref())
    }

    /// A `401 Unauthorized` carrying `challenge` as its `WWW-Authenticate` value.
    pub fn unauthorized(challenge: impl Into<String>) -> Self {
        Self::with_status(StatusCode::UNAUTHORIZED).header(HeaderId::WwwAuthenticate, challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_reason() {
        assert_eq!(StatusLine::new(StatusCode::OK).to_string(), "HTTP/1.1 200 OK");
        let unknown = StatusLine::new(StatusCode::from_u16(599).unwrap());
        assert_eq!(unknown.reason, "");
    }

    #[test]
    fn bodyless_statuses() {
        assert!(ResponseHead::new(StatusCode::CONTINUE).forbids_body());
        assert!(ResponseHead::new(StatusCode::NO_CONTENT).forbids_body());
        assert!(ResponseHead::new(StatusCode::NOT_MODIFIED).forbids_body());
        assert!(!ResponseHead::new(StatusCode::OK).forbids_body());
    }

    #[test]
    fn convenience_constructors() {
        let response = Response::text(StatusCode::OK, "hi");
        assert_eq!(response.headers().find_id(HeaderId::ContentType), "text/plain; charset=utf-8");

        let response = Response::unauthorized("Basic realm=\"api\"");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().find("www-authenticate"), "Basic realm=\"api\"");
    }
}

use std::io;

use http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request error: {source}")]
    RequestError {
        #[from]
        source: ParseError,
    },

    #[error("response error: {source}")]
    ResponseError {
        #[from]
        source: SendError,
    },

    #[error("transport error: {source}")]
    TransportError {
        #[from]
        source: TransportError,
    },
}

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line too long, exceed the limit {max_length}")]
    LineTooLong { max_length: usize },

    #[error("too much whitespace, exceed the limit {max_whitespace}")]
    TooMuchWhitespace { max_whitespace: usize },

    #[error("bare LF without preceding CR")]
    BareLf,

    #[error("invalid character {byte:#04x} in {context}")]
    InvalidCharacter { byte: u8, context: &'static str },

    #[error("header size too large, current: {current_size} exceed the limit {max_size}")]
    HeadersTooLarge { current_size: usize, max_size: usize },

    #[error("request uri too long, exceed the limit {max_length}")]
    UriTooLong { max_length: usize },

    #[error("invalid http method")]
    InvalidMethod,

    #[error("unsupported http method: {method}")]
    UnsupportedMethod { method: String },

    #[error("invalid http version")]
    InvalidVersion,

    #[error("invalid status code")]
    InvalidStatusCode,

    #[error("invalid chunk size: {reason}")]
    InvalidChunkSize { reason: String },

    #[error("invalid content-length header: {reason}")]
    InvalidContentLength { reason: String },

    #[error("invalid cookie: {reason}")]
    InvalidCookie { reason: String },

    #[error("invalid body: {source}")]
    Body {
        #[from]
        source: BodyError,
    },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl ParseError {
    pub fn line_too_long(max_length: usize) -> Self {
        Self::LineTooLong { max_length }
    }

    pub fn too_much_whitespace(max_whitespace: usize) -> Self {
        Self::TooMuchWhitespace { max_whitespace }
    }

    pub fn invalid_character(byte: u8, context: &'static str) -> Self {
        Self::InvalidCharacter { byte, context }
    }

    pub fn headers_too_large(current_size: usize, max_size: usize) -> Self {
        Self::HeadersTooLarge { current_size, max_size }
    }

    pub fn invalid_chunk_size<S: ToString>(str: S) -> Self {
        Self::InvalidChunkSize { reason: str.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(str: S) -> Self {
        Self::InvalidContentLength { reason: str.to_string() }
    }

    pub fn invalid_cookie<S: ToString>(str: S) -> Self {
        Self::InvalidCookie { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The status a server answers with when a request fails to parse.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Body { source: BodyError::Oversize { .. } } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UriTooLong { .. } => StatusCode::URI_TOO_LONG,
            Self::UnsupportedMethod { .. } => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

#[derive(Error, Debug)]
pub enum BodyError {
    #[error("body size {size} exceed the limit {max_size}")]
    Oversize { size: u64, max_size: u64 },

    #[error("bad chunk: {reason}")]
    BadChunk { reason: String },
}

impl BodyError {
    pub fn oversize(size: u64, max_size: u64) -> Self {
        Self::Oversize { size, max_size }
    }

    pub fn bad_chunk<S: ToString>(str: S) -> Self {
        Self::BadChunk { reason: str.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum SendError {
    #[error("send queue full, limit {limit}")]
    QueueFull { limit: usize },

    #[error("connection closed")]
    Closed,

    #[error("encode error: {source}")]
    Encode {
        #[from]
        source: EncodeError,
    },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }
}

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("bad header name: {name:?}")]
    BadHeaderName { name: String },

    #[error("bad value for header {name:?}")]
    BadHeaderValue { name: String },

    #[error("bad cookie attribute: {reason}")]
    BadCookieAttr { reason: String },
}

impl EncodeError {
    pub fn bad_cookie_attr<S: ToString>(str: S) -> Self {
        Self::BadCookieAttr { reason: str.to_string() }
    }
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection reset by peer")]
    ConnectionReset,

    #[error("operation timed out")]
    Timeout,

    #[error("tls handshake failed: {reason}")]
    TlsHandshake { reason: String },

    #[error("transport not connected")]
    NotConnected,

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

impl TransportError {
    pub fn tls_handshake<S: ToString>(str: S) -> Self {
        Self::TlsHandshake { reason: str.to_string() }
    }

    /// True when the error means the peer went away rather than a failure.
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionReset => true,
            Self::Io { source } => is_disconnect_kind(source.kind()),
            _ => false,
        }
    }
}

pub(crate) fn is_disconnect_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing authorization header")]
    Missing,

    #[error("malformed authorization header")]
    Malformed,

    #[error("unknown user")]
    UnknownUser,

    #[error("wrong password")]
    WrongPassword,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_map_to_status_codes() {
        assert_eq!(ParseError::too_much_whitespace(8).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ParseError::BareLf.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ParseError::from(BodyError::oversize(10, 5)).status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(ParseError::from(BodyError::bad_chunk("too big")).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ParseError::UnsupportedMethod { method: "BREW".into() }.status_code(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn transport_disconnects() {
        assert!(TransportError::ConnectionReset.is_disconnect());
        assert!(TransportError::from(io::Error::from(io::ErrorKind::BrokenPipe)).is_disconnect());
        assert!(!TransportError::Timeout.is_disconnect());
        assert!(!TransportError::from(io::Error::other("boom")).is_disconnect());
    }
}

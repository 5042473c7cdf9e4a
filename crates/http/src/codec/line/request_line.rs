use bytes::{Buf, BytesMut};
use http::{Method, Version};
use tokio_util::codec::Decoder;
use tracing::trace;

use super::VersionMatcher;
use crate::config::ParserConfig;
use crate::ensure;
use crate::protocol::chars::{is_space_or_tab, is_token_char, is_uri_char};
use crate::protocol::{ParseError, RequestLine};

const MAX_METHOD_LENGTH: usize = 8;

const STANDARD_METHODS: [Method; 8] = [
    Method::OPTIONS,
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::TRACE,
    Method::CONNECT,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Skipping empty lines before the request line
    Start,
    Method,
    UriLs,
    Uri,
    Version,
    Cr,
    Lf,
}

/// Decoder of a request line.
///
/// Empty lines ahead of the request line are skipped; a bare `LF` ending is
/// accepted unless `strict_crlf` is set.
#[derive(Debug, Clone)]
pub struct RequestLineDecoder {
    config: ParserConfig,
    state: State,
    /// A `CR` was skipped ahead of the request line.
    leading_cr: bool,
    method: Vec<u8>,
    parsed_method: Method,
    uri: String,
    ws_seen: usize,
    version_matcher: VersionMatcher,
    version: Version,
}

impl RequestLineDecoder {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            state: State::Start,
            leading_cr: false,
            method: Vec::with_capacity(MAX_METHOD_LENGTH),
            parsed_method: Method::GET,
            uri: String::new(),
            ws_seen: 0,
            version_matcher: VersionMatcher::default(),
            version: Version::HTTP_11,
        }
    }

    /// True while no byte of a request line has been consumed.
    pub fn is_idle(&self) -> bool {
        self.state == State::Start
    }

    fn finish_method(&mut self) -> Result<(), ParseError> {
        let method = Method::from_bytes(&self.method).map_err(|_| ParseError::InvalidMethod)?;
        if self.config.strict_methods && !STANDARD_METHODS.contains(&method) {
            return Err(ParseError::UnsupportedMethod { method: method.to_string() });
        }
        self.parsed_method = method;
        Ok(())
    }

    fn complete(&mut self) -> RequestLine {
        self.state = State::Start;
        self.method.clear();
        self.ws_seen = 0;
        let line = RequestLine::new(
            std::mem::replace(&mut self.parsed_method, Method::GET),
            std::mem::take(&mut self.uri),
            self.version,
        );
        trace!(request_line = %line, "parsed request line");
        line
    }
}

impl Decoder for RequestLineDecoder {
    type Item = RequestLine;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(&c) = src.first() {
            src.advance(1);

            match self.state {
                State::Start => match c {
                    b'\r' => self.leading_cr = true,
                    b'\n' => {
                        ensure!(self.leading_cr || !self.config.strict_crlf, ParseError::BareLf);
                        self.leading_cr = false;
                    }
                    c if is_token_char(c) => {
                        self.leading_cr = false;
                        self.method.push(c);
                        self.state = State::Method;
                    }
                    _ => return Err(ParseError::InvalidMethod),
                },

                State::Method => match c {
                    b' ' => {
                        self.finish_method()?;
                        self.state = State::UriLs;
                    }
                    c if is_token_char(c) => {
                        self.method.push(c);
                        ensure!(self.method.len() <= MAX_METHOD_LENGTH, ParseError::InvalidMethod);
                    }
                    _ => return Err(ParseError::InvalidMethod),
                },

                State::UriLs => match c {
                    c if is_space_or_tab(c) => {
                        self.ws_seen += 1;
                        ensure!(self.ws_seen <= self.config.max_whitespace, ParseError::too_much_whitespace(self.config.max_whitespace));
                    }
                    c if is_uri_char(c) => {
                        self.uri.push(c as char);
                        self.state = State::Uri;
                    }
                    _ => return Err(ParseError::invalid_character(c, "request target")),
                },

                State::Uri => match c {
                    b' ' => self.state = State::Version,
                    c if is_uri_char(c) => {
                        self.uri.push(c as char);
                        ensure!(
                            self.uri.len() <= self.config.max_uri_length,
                            ParseError::UriTooLong { max_length: self.config.max_uri_length }
                        );
                    }
                    _ => return Err(ParseError::invalid_character(c, "request target")),
                },

                State::Version => {
                    if let Some(version) = self.version_matcher.feed(c)? {
                        self.version = version;
                        self.state = State::Cr;
                    }
                }

                State::Cr => match c {
                    b'\r' => self.state = State::Lf,
                    b'\n' => {
                        ensure!(!self.config.strict_crlf, ParseError::BareLf);
                        return Ok(Some(self.complete()));
                    }
                    _ => return Err(ParseError::invalid_character(c, "request line end")),
                },

                State::Lf => {
                    ensure!(c == b'\n', ParseError::invalid_character(c, "request line end"));
                    return Ok(Some(self.complete()));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(config: ParserConfig, input: &[u8]) -> Result<Option<RequestLine>, ParseError> {
        RequestLineDecoder::new(config).decode(&mut BytesMut::from(input))
    }

    #[test]
    fn parses_request_line() {
        let mut buf = BytesMut::from(&b"GET /hello?x=1 HTTP/1.1\r\nHost: x\r\n"[..]);
        let line = RequestLineDecoder::new(ParserConfig::DEFAULT).decode(&mut buf).unwrap().unwrap();
        assert_eq!(line.method, Method::GET);
        assert_eq!(line.uri, "/hello?x=1");
        assert_eq!(line.version, Version::HTTP_11);
        assert_eq!(&buf[..], b"Host: x\r\n");
    }

    #[test]
    fn byte_at_a_time() {
        let input = b"\r\nPOST /u HTTP/1.0\r\n";
        let mut decoder = RequestLineDecoder::new(ParserConfig::DEFAULT);
        let mut buf = BytesMut::new();
        let mut result = None;
        for c in input {
            assert!(result.is_none());
            buf.extend_from_slice(&[*c]);
            result = decoder.decode(&mut buf).unwrap();
        }
        let line = result.unwrap();
        assert_eq!(line, RequestLine::new(Method::POST, "/u", Version::HTTP_10));
        assert!(decoder.is_idle());
    }

    #[test]
    fn extension_methods() {
        let line = decode(ParserConfig::DEFAULT, b"PURGE /cache HTTP/1.1\r\n").unwrap().unwrap();
        assert_eq!(line.method.as_str(), "PURGE");

        let strict = ParserConfig { strict_methods: true, ..ParserConfig::DEFAULT };
        let result = decode(strict, b"PURGE /cache HTTP/1.1\r\n");
        assert!(matches!(result, Err(ParseError::UnsupportedMethod { .. })));
    }

    #[test]
    fn rejects_bad_lines() {
        assert!(matches!(decode(ParserConfig::DEFAULT, b"TOOLONGMETHOD / HTTP/1.1\r\n"), Err(ParseError::InvalidMethod)));
        assert!(matches!(decode(ParserConfig::DEFAULT, b"GET / HTTP/2.0\r\n"), Err(ParseError::InvalidVersion)));
        assert!(matches!(decode(ParserConfig::DEFAULT, b"GET /a b HTTP/1.1\r\n"), Err(ParseError::InvalidVersion)));
        assert!(matches!(decode(ParserConfig::DEFAULT, b"GET /\x01 HTTP/1.1\r\n"), Err(ParseError::InvalidCharacter { .. })));
        assert!(matches!(decode(ParserConfig::DEFAULT, b"GET / HTTP/1.1\rX"), Err(ParseError::InvalidCharacter { .. })));
    }

    #[test]
    fn enforces_uri_length() {
        let config = ParserConfig { max_uri_length: 8, ..ParserConfig::DEFAULT };
        assert!(decode(config, b"GET /1234567 HTTP/1.1\r\n").unwrap().is_some());
        let result = decode(config, b"GET /12345678 HTTP/1.1\r\n");
        assert!(matches!(result, Err(ParseError::UriTooLong { max_length: 8 })));
        assert_eq!(result.unwrap_err().status_code(), http::StatusCode::URI_TOO_LONG);
    }

    #[test]
    fn bare_lf() {
        assert!(decode(ParserConfig::DEFAULT, b"GET / HTTP/1.1\n").unwrap().is_some());
        let strict = ParserConfig { strict_crlf: true, ..ParserConfig::DEFAULT };
        assert!(matches!(decode(strict, b"GET / HTTP/1.1\n"), Err(ParseError::BareLf)));
    }

    #[test]
    fn bare_lf_before_request_line() {
        let strict = ParserConfig { strict_crlf: true, ..ParserConfig::DEFAULT };
        assert!(decode(ParserConfig::DEFAULT, b"\nGET / HTTP/1.1\r\n").unwrap().is_some());
        assert!(decode(strict, b"\r\n\r\nGET / HTTP/1.1\r\n").unwrap().is_some());
        assert!(matches!(decode(strict, b"\nGET / HTTP/1.1\r\n"), Err(ParseError::BareLf)));
        assert!(matches!(decode(strict, b"\r\n\nGET / HTTP/1.1\r\n"), Err(ParseError::BareLf)));
    }

    #[test]
    fn incomplete_line() {
        assert!(decode(ParserConfig::DEFAULT, b"GET /hel").unwrap().is_none());
    }
}

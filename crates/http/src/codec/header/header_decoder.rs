//! Decoder for a header block: field lines up to the terminating empty line.
//!
//! The decoder consumes bytes from the source buffer as it goes and keeps its
//! position between calls, so it can be driven with arbitrarily small reads.
//! It is used both for message heads and for the trailer block of a chunked
//! body.
//!
//! # Limits
//!
//! - each line is bounded by `max_line_length` and `max_whitespace`
//! - the whole block, empty line included, is bounded by `max_headers_size`

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{trace, warn};

use crate::codec::field_line::FieldLine;
use crate::config::ParserConfig;
use crate::ensure;
use crate::protocol::chars::is_space_or_tab;
use crate::protocol::{Headers, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// At the start of a line: either a field or the empty line
    LineStart,
    /// Inside a field line
    Field,
    /// A field line completed, waiting for one byte to rule out obs-fold
    AfterField,
    /// Read the `CR` of the empty line
    EndLf,
}

/// Decoder of a header block implementing the [`Decoder`] trait.
///
/// Yields the collected [`Headers`] once the empty line is read, then resets
/// for the next block.
#[derive(Debug, Clone)]
pub struct HeaderDecoder {
    config: ParserConfig,
    field: FieldLine,
    headers: Headers,
    state: State,
    size: usize,
}

impl HeaderDecoder {
    pub fn new(config: ParserConfig) -> Self {
        Self { config, field: FieldLine::new(config), headers: Headers::new(), state: State::LineStart, size: 0 }
    }

    /// Bytes of the current block consumed so far.
    pub fn consumed(&self) -> usize {
        self.size
    }

    fn reset(&mut self) -> Headers {
        self.field.clear();
        self.state = State::LineStart;
        self.size = 0;
        std::mem::take(&mut self.headers)
    }

    fn advance(&mut self, src: &mut BytesMut) -> Result<u8, ParseError> {
        self.size += 1;
        ensure!(
            self.size <= self.config.max_headers_size,
            ParseError::headers_too_large(self.size, self.config.max_headers_size)
        );
        Ok(src.get_u8())
    }
}

impl Decoder for HeaderDecoder {
    type Item = Headers;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(&c) = src.first() {
            match self.state {
                State::LineStart => match c {
                    b'\r' => {
                        self.advance(src)?;
                        self.state = State::EndLf;
                    }
                    b'\n' => {
                        ensure!(!self.config.strict_crlf, ParseError::BareLf);
                        self.advance(src)?;
                        return Ok(Some(self.reset()));
                    }
                    _ => self.state = State::Field,
                },

                State::Field => {
                    let c = self.advance(src)?;
                    if self.field.parse_char(c)? {
                        self.state = State::AfterField;
                    }
                }

                State::AfterField => {
                    if is_space_or_tab(c) {
                        warn!(header = self.field.name(), "obsolete line folding in header field");
                        self.field.fold();
                        self.state = State::Field;
                    } else {
                        let (name, value) = self.field.take();
                        trace!(name = %name, value = %value, "parsed header field");
                        self.headers.add(&name, &value);
                        self.state = State::LineStart;
                    }
                }

                State::EndLf => {
                    self.advance(src)?;
                    ensure!(c == b'\n', ParseError::invalid_character(c, "header block end"));
                    return Ok(Some(self.reset()));
                }
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;
    use crate::protocol::HeaderId;

    fn crlf(s: &str) -> BytesMut {
        BytesMut::from(s.replace('\n', "\r\n").as_str())
    }

    #[test]
    fn from_curl() {
        let mut buf = crlf(indoc! {r##"
        Host: 127.0.0.1:8080
        User-Agent: curl/7.79.1
        Accept: */*

        "##});

        let headers = HeaderDecoder::new(ParserConfig::DEFAULT).decode(&mut buf).unwrap().unwrap();
        assert!(buf.is_empty());
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.find_id(HeaderId::Host), "127.0.0.1:8080");
        assert_eq!(headers.find("User-Agent"), "curl/7.79.1");
        assert_eq!(headers.find("ACCEPT"), "*/*");
    }

    #[test]
    fn from_edge() {
        let mut buf = crlf(indoc! {r##"
        Host: 127.0.0.1:8080
        Connection: keep-alive
        sec-ch-ua: "#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109"
        sec-ch-ua-platform: "macOS"
        Accept-Language: zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7
        Cookie: a=1
        Cookie: b=2

        GET"##});

        let headers = HeaderDecoder::new(ParserConfig::DEFAULT).decode(&mut buf).unwrap().unwrap();
        assert_eq!(&buf[..], b"GET");
        assert_eq!(headers.len(), 6);
        assert_eq!(headers.find("sec-ch-ua"), r##""#Not_A Brand";v="99", "Microsoft Edge";v="109", "Chromium";v="109""##);
        assert_eq!(headers.find_id(HeaderId::Cookie), "a=1; b=2");
        assert!(headers.keep_alive());
    }

    #[test]
    fn byte_at_a_time_matches_whole_input() {
        let input = crlf("Host: x\nX-Folded: a\n  b\nContent-Length: 5\n\n");

        let whole = HeaderDecoder::new(ParserConfig::DEFAULT).decode(&mut input.clone()).unwrap().unwrap();

        let mut decoder = HeaderDecoder::new(ParserConfig::DEFAULT);
        let mut buf = BytesMut::new();
        let mut result = None;
        for c in input.iter() {
            assert!(result.is_none());
            buf.extend_from_slice(&[*c]);
            result = decoder.decode(&mut buf).unwrap();
        }

        assert_eq!(result.unwrap(), whole);
        assert_eq!(whole.find("x-folded"), "a b");
    }

    #[test]
    fn rejects_whitespace_flood() {
        let mut buf = crlf(&format!("Host:{}x\n\n", " ".repeat(20)));
        let result = HeaderDecoder::new(ParserConfig::DEFAULT).decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooMuchWhitespace { .. })));
    }

    #[test]
    fn rejects_oversized_block() {
        let config = ParserConfig { max_headers_size: 32, ..ParserConfig::DEFAULT };
        let mut buf = crlf("X-One: 0123456789\nX-Two: 0123456789\n\n");
        let result = HeaderDecoder::new(config).decode(&mut buf);
        assert!(matches!(result, Err(ParseError::HeadersTooLarge { max_size: 32, .. })));
    }

    #[test]
    fn empty_block() {
        let mut buf = BytesMut::from(&b"\r\n"[..]);
        let headers = HeaderDecoder::new(ParserConfig::DEFAULT).decode(&mut buf).unwrap().unwrap();
        assert!(headers.is_empty());

        let strict = ParserConfig { strict_crlf: true, ..ParserConfig::DEFAULT };
        let mut buf = BytesMut::from(&b"\n"[..]);
        assert!(matches!(HeaderDecoder::new(strict).decode(&mut buf), Err(ParseError::BareLf)));
    }
}

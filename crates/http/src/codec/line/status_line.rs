use bytes::{Buf, BytesMut};
use http::{StatusCode, Version};
use tokio_util::codec::Decoder;
use tracing::trace;

use super::VersionMatcher;
use crate::config::ParserConfig;
use crate::ensure;
use crate::protocol::chars::is_field_value_char;
use crate::protocol::{ParseError, StatusLine};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Version,
    CodeSp,
    Code,
    Reason,
    Lf,
}

/// Decoder of a response status line.
///
/// The code must be exactly three digits in `100..=599`; the reason phrase
/// may be empty, with or without the space before it.
#[derive(Debug, Clone)]
pub struct StatusLineDecoder {
    config: ParserConfig,
    state: State,
    version_matcher: VersionMatcher,
    version: Version,
    code: u16,
    digits: usize,
    reason: Vec<u8>,
}

impl StatusLineDecoder {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            state: State::Start,
            version_matcher: VersionMatcher::default(),
            version: Version::HTTP_11,
            code: 0,
            digits: 0,
            reason: Vec::new(),
        }
    }

    fn end_of_code(&self) -> Result<StatusCode, ParseError> {
        ensure!(self.digits == 3 && (100..=599).contains(&self.code), ParseError::InvalidStatusCode);
        StatusCode::from_u16(self.code).map_err(|_| ParseError::InvalidStatusCode)
    }

    fn complete(&mut self) -> Result<StatusLine, ParseError> {
        let status = self.end_of_code()?;
        let reason = String::from_utf8_lossy(&self.reason).trim_end().to_string();
        let line = StatusLine { version: self.version, status, reason };

        self.state = State::Start;
        self.code = 0;
        self.digits = 0;
        self.reason.clear();

        trace!(status_line = %line, "parsed status line");
        Ok(line)
    }

    fn bare_lf(&mut self) -> Result<Option<StatusLine>, ParseError> {
        ensure!(!self.config.strict_crlf, ParseError::BareLf);
        self.complete().map(Some)
    }
}

impl Decoder for StatusLineDecoder {
    type Item = StatusLine;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(&c) = src.first() {
            src.advance(1);

            match self.state {
                State::Start | State::Version => {
                    self.state = State::Version;
                    if let Some(version) = self.version_matcher.feed(c)? {
                        self.version = version;
                        self.state = State::CodeSp;
                    }
                }

                State::CodeSp => {
                    ensure!(c == b' ', ParseError::invalid_character(c, "status line"));
                    self.state = State::Code;
                }

                State::Code => match c {
                    b'0'..=b'9' => {
                        self.digits += 1;
                        ensure!(self.digits <= 3, ParseError::InvalidStatusCode);
                        self.code = self.code * 10 + u16::from(c - b'0');
                    }
                    b' ' => {
                        self.end_of_code()?;
                        self.state = State::Reason;
                    }
                    b'\r' => self.state = State::Lf,
                    b'\n' => return self.bare_lf(),
                    _ => return Err(ParseError::InvalidStatusCode),
                },

                State::Reason => match c {
                    b'\r' => self.state = State::Lf,
                    b'\n' => return self.bare_lf(),
                    c if is_field_value_char(c) => {
                        self.reason.push(c);
                        ensure!(self.reason.len() <= self.config.max_line_length, ParseError::line_too_long(self.config.max_line_length));
                    }
                    _ => return Err(ParseError::invalid_character(c, "reason phrase")),
                },

                State::Lf => {
                    ensure!(c == b'\n', ParseError::invalid_character(c, "status line end"));
                    return self.complete().map(Some);
                }
            }
        }

        Ok(None)
    }
}

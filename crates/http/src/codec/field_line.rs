//! Resumable parser for a single `name: value` header line.
//!
//! Bytes are fed one at a time through [`FieldLine::parse_char`]; the parser
//! never looks ahead, so a line split across any number of reads parses the
//! same as a line received at once.

use crate::config::ParserConfig;
use crate::protocol::ParseError;
use crate::protocol::chars::{is_field_value_char, is_space_or_tab};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLineState {
    /// Reading the field name up to `:`
    Name,
    /// Skipping whitespace before the value
    ValueLs,
    /// Reading the value up to the end of line
    Value,
    /// Expecting the `LF` after `CR`
    Lf,
    /// A complete line was read
    Valid,
    ErrorLength,
    ErrorWs,
    ErrorCrlf,
    ErrorChar,
}

#[derive(Debug, Clone)]
pub struct FieldLine {
    name: String,
    value: Vec<u8>,
    state: FieldLineState,
    length_seen: usize,
    ws_seen: usize,
    last_byte: u8,
    config: ParserConfig,
}

impl FieldLine {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            name: String::new(),
            value: Vec::new(),
            state: FieldLineState::Name,
            length_seen: 0,
            ws_seen: 0,
            last_byte: 0,
            config,
        }
    }

    pub fn state(&self) -> FieldLineState {
        self.state
    }

    /// The lowercase field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value read so far, invalid UTF-8 replaced.
    pub fn value(&self) -> String {
        String::from_utf8_lossy(&self.value).into_owned()
    }

    pub fn is_valid(&self) -> bool {
        self.state == FieldLineState::Valid
    }

    /// Feeds one byte.
    ///
    /// Returns `Ok(true)` once the line is complete, `Ok(false)` while more
    /// bytes are needed, and an error when the line is rejected. Once an error
    /// was returned the parser stays in its error state until [`FieldLine::clear`].
    pub fn parse_char(&mut self, c: u8) -> Result<bool, ParseError> {
        use FieldLineState::*;

        if self.state == Valid {
            return Ok(true);
        }
        if self.is_error() {
            return Err(self.error());
        }

        self.length_seen += 1;
        self.last_byte = c;
        if self.length_seen > self.config.max_line_length {
            return self.fail(ErrorLength);
        }

        match self.state {
            Name => match c {
                b':' if !self.name.is_empty() => self.state = ValueLs,
                c if c.is_ascii_alphanumeric() || c == b'-' => self.name.push(c.to_ascii_lowercase() as char),
                _ => return self.fail(ErrorChar),
            },

            ValueLs => {
                if is_space_or_tab(c) {
                    self.ws_seen += 1;
                    if self.ws_seen > self.config.max_whitespace {
                        return self.fail(ErrorWs);
                    }
                } else {
                    self.state = Value;
                    return self.parse_value(c);
                }
            }

            Value => return self.parse_value(c),

            Lf => match c {
                b'\n' => self.complete(),
                _ => return self.fail(ErrorCrlf),
            },

            Valid | ErrorLength | ErrorWs | ErrorCrlf | ErrorChar => unreachable!("checked above"),
        }

        Ok(self.state == Valid)
    }

    fn parse_value(&mut self, c: u8) -> Result<bool, ParseError> {
        match c {
            b'\r' => self.state = FieldLineState::Lf,
            b'\n' if self.config.strict_crlf => return self.fail(FieldLineState::ErrorCrlf),
            b'\n' => self.complete(),
            c if is_field_value_char(c) => self.value.push(c),
            _ => return self.fail(FieldLineState::ErrorChar),
        }
        Ok(self.state == FieldLineState::Valid)
    }

    fn complete(&mut self) {
        while self.value.last().is_some_and(|c| is_space_or_tab(*c)) {
            self.value.pop();
        }
        self.state = FieldLineState::Valid;
    }

    /// Re-opens a completed line for an obs-fold continuation: the value gets
    /// a single space and the continuation's leading whitespace is skipped.
    pub fn fold(&mut self) {
        if self.state != FieldLineState::Valid {
            return;
        }
        if !self.value.is_empty() {
            self.value.push(b' ');
        }
        self.ws_seen = 0;
        self.state = FieldLineState::ValueLs;
    }

    /// Resets the parser for the next line.
    pub fn clear(&mut self) {
        self.name.clear();
        self.value.clear();
        self.state = FieldLineState::Name;
        self.length_seen = 0;
        self.ws_seen = 0;
    }

    /// Takes the parsed `(name, value)`, leaving the parser cleared.
    pub fn take(&mut self) -> (String, String) {
        let name = std::mem::take(&mut self.name);
        let value = self.value();
        self.clear();
        (name, value)
    }

    fn is_error(&self) -> bool {
        use FieldLineState::*;
        matches!(self.state, ErrorLength | ErrorWs | ErrorCrlf | ErrorChar)
    }

    fn fail(&mut self, state: FieldLineState) -> Result<bool, ParseError> {
        self.state = state;
        Err(self.error())
    }

    fn error(&self) -> ParseError {
        match self.state {
            FieldLineState::ErrorLength => ParseError::line_too_long(self.config.max_line_length),
            FieldLineState::ErrorWs => ParseError::too_much_whitespace(self.config.max_whitespace),
            FieldLineState::ErrorCrlf if self.last_byte == b'\n' => ParseError::BareLf,
            _ => ParseError::invalid_character(self.last_byte, "header field"),
        }
    }
}

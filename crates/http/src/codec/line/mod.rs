//! Start-line decoders
//!
//! - [`RequestLineDecoder`]: `METHOD SP URI SP HTTP/M.N CRLF`
//! - [`StatusLineDecoder`]: `HTTP/M.N SP CODE SP REASON CRLF`
//!
//! Both consume input byte by byte and keep their state between calls.

mod request_line;
mod status_line;

pub use request_line::RequestLineDecoder;
pub use status_line::StatusLineDecoder;

use http::Version;

use crate::ensure;
use crate::protocol::ParseError;

const VERSION_PREFIX: &[u8] = b"HTTP/1.";

/// Incremental matcher for the `HTTP/1.0` and `HTTP/1.1` version tokens.
#[derive(Debug, Clone, Default)]
struct VersionMatcher {
    pos: usize,
}

impl VersionMatcher {
    /// Feeds one byte, yielding the version once the minor digit was read.
    fn feed(&mut self, c: u8) -> Result<Option<Version>, ParseError> {
        if let Some(expected) = VERSION_PREFIX.get(self.pos) {
            ensure!(c == *expected, ParseError::InvalidVersion);
            self.pos += 1;
            return Ok(None);
        }

        self.pos = 0;
        match c {
            b'0' => Ok(Some(Version::HTTP_10)),
            b'1' => Ok(Some(Version::HTTP_11)),
            _ => Err(ParseError::InvalidVersion),
        }
    }
}

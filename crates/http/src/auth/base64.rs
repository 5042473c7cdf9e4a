//! Base64 with the standard alphabet (RFC 4648 §4).
//!
//! Encoding always pads. Decoding ignores ASCII whitespace and accepts input
//! with or without padding.

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;

/// Encoded line length when line breaks are requested.
pub const LINE_LENGTH: usize = 76;

const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_encode_padding(true).with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes `input`, inserting `CRLF` after every [`LINE_LENGTH`] characters
/// when `line_breaks` is set.
pub fn encode(input: &[u8], line_breaks: bool) -> String {
    let encoded = ENGINE.encode(input);
    if !line_breaks || encoded.len() <= LINE_LENGTH {
        return encoded;
    }

    let mut wrapped = String::with_capacity(encoded.len() + encoded.len() / LINE_LENGTH * 2);
    for (i, line) in encoded.as_bytes().chunks(LINE_LENGTH).enumerate() {
        if i > 0 {
            wrapped.push_str("\r\n");
        }
        // the alphabet is ASCII
        wrapped.push_str(std::str::from_utf8(line).unwrap_or_default());
    }
    wrapped
}

/// Decodes `input`, returning `None` when it contains a character outside
/// the alphabet or has an impossible length.
pub fn try_decode(input: &str) -> Option<Vec<u8>> {
    let compact: Vec<u8> = input.bytes().filter(|c| !c.is_ascii_whitespace()).collect();
    ENGINE.decode(compact).ok()
}

/// Decodes `input`, returning an empty vector for invalid input.
pub fn decode(input: &str) -> Vec<u8> {
    try_decode(input).unwrap_or_default()
}

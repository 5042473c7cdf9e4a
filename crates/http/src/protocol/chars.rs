//! Byte classification and numeric string helpers used by the parsers.
//!
//! The classifiers follow the character classes of
//! [RFC 7230](https://tools.ietf.org/html/rfc7230) and
//! [RFC 3986](https://tools.ietf.org/html/rfc3986).

/// Returns true for `CR` or `LF`.
#[inline]
pub fn is_end_of_line(c: u8) -> bool {
    c == b'\r' || c == b'\n'
}

/// Returns true for `SP` or `HT`.
#[inline]
pub fn is_space_or_tab(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

/// Returns true for the RFC 7230 `tspecials` separators, including `SP` and `HT`.
#[inline]
pub fn is_separator(c: u8) -> bool {
    matches!(
        c,
        b'(' | b')' | b'<' | b'>' | b'@' | b',' | b';' | b':' | b'\\' | b'"' | b'/' | b'[' | b']' | b'?' | b'='
            | b'{' | b'}' | b' ' | b'\t'
    )
}

/// Returns true for a `tchar`: a visible ASCII character that is not a separator.
#[inline]
pub fn is_token_char(c: u8) -> bool {
    c.is_ascii_graphic() && !is_separator(c)
}

/// Returns true for an RFC 3986 unreserved character.
#[inline]
pub fn is_unreserved(c: u8) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, b'-' | b'.' | b'_' | b'~')
}

/// Returns true for an RFC 3986 `gen-delims` character.
#[inline]
pub fn is_gen_delim(c: u8) -> bool {
    matches!(c, b':' | b'/' | b'?' | b'#' | b'[' | b']' | b'@')
}

/// Returns true for an RFC 3986 `sub-delims` character.
#[inline]
pub fn is_sub_delim(c: u8) -> bool {
    matches!(c, b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'=')
}

/// Returns true if the window starts with a percent-encoded octet: `%` followed by two hex digits.
#[inline]
pub fn is_pct_encoded(window: &[u8]) -> bool {
    matches!(window, [b'%', h, l, ..] if h.is_ascii_hexdigit() && l.is_ascii_hexdigit())
}

/// Returns true for a byte allowed inside a request-target.
///
/// Accepts the URI characters of RFC 3986 plus `%`; anything else (controls,
/// whitespace, non-ASCII) ends or invalidates the target.
#[inline]
pub fn is_uri_char(c: u8) -> bool {
    is_unreserved(c) || is_gen_delim(c) || is_sub_delim(c) || c == b'%'
}

/// Returns true for a byte allowed in a field value or reason phrase: visible ASCII,
/// `SP`, `HT` or obs-text.
#[inline]
pub fn is_field_value_char(c: u8) -> bool {
    c.is_ascii_graphic() || is_space_or_tab(c) || c >= 0x80
}

/// Parses a non-empty string of hex digits.
///
/// Returns `None` when the string is empty, contains a non-hex digit or
/// overflows `usize`.
pub fn from_hex_string(s: &str) -> Option<usize> {
    from_radix_string(s, 16)
}

/// Parses a non-empty string of decimal digits.
///
/// Returns `None` when the string is empty, contains a non-digit or
/// overflows `usize`.
pub fn from_dec_string(s: &str) -> Option<usize> {
    from_radix_string(s, 10)
}

fn from_radix_string(s: &str, radix: u32) -> Option<usize> {
    if s.is_empty() {
        return None;
    }

    s.chars().try_fold(0usize, |acc, c| {
        let digit = c.to_digit(radix)?;
        acc.checked_mul(radix as usize)?.checked_add(digit as usize)
    })
}

/// Formats `n` as lowercase hex without padding or `0x` prefix.
pub fn to_hex_string(n: usize) -> String {
    format!("{n:x}")
}

/// Case-insensitive ASCII substring search.
pub(crate) fn contains_ignore_ascii_case(haystack: &str, needle: &str) -> bool {
    let needle = needle.as_bytes();
    if needle.is_empty() {
        return true;
    }
    haystack.as_bytes().windows(needle.len()).any(|window| window.eq_ignore_ascii_case(needle))
}

//! `Set-Cookie` and `Cookie` header values (RFC 6265).
//!
//! Only single values are handled here; keeping cookies across requests is
//! left to the application.

use std::fmt::Write;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::trace;

use crate::protocol::chars::is_token_char;
use crate::protocol::{EncodeError, ParseError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: String,
    pub expires: Option<SystemTime>,
    pub secure: bool,
    pub http_only: bool,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    /// Parses one `Set-Cookie` value.
    ///
    /// Attribute names match case-insensitively and unknown attributes are
    /// skipped. `Max-Age` takes precedence over `Expires` wherever it appears;
    /// a non-positive `Max-Age` expires the cookie immediately.
    pub fn parse(set_cookie: &str) -> Result<Self, ParseError> {
        let mut parts = set_cookie.split(';');
        let pair = parts.next().unwrap_or_default();
        let (name, value) = pair.split_once('=').ok_or_else(|| ParseError::invalid_cookie("missing '='"))?;
        let name = name.trim();
        if name.is_empty() || !name.bytes().all(is_token_char) {
            return Err(ParseError::invalid_cookie(format!("bad cookie name {name:?}")));
        }

        let mut cookie = Cookie::new(name, unquote(value.trim()));
        let mut max_age = None;

        for attribute in parts {
            let (key, value) = match attribute.split_once('=') {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (attribute.trim(), ""),
            };

            if key.eq_ignore_ascii_case("domain") {
                let domain = value.trim_start_matches('.');
                if !domain.is_empty() {
                    cookie.domain = Some(domain.to_ascii_lowercase());
                }
            } else if key.eq_ignore_ascii_case("path") {
                if value.starts_with('/') {
                    cookie.path = value.to_string();
                }
            } else if key.eq_ignore_ascii_case("expires") {
                cookie.expires = httpdate::parse_http_date(value).ok();
            } else if key.eq_ignore_ascii_case("max-age") {
                max_age = value.parse::<i64>().ok().or(max_age);
            } else if key.eq_ignore_ascii_case("secure") {
                cookie.secure = true;
            } else if key.eq_ignore_ascii_case("httponly") {
                cookie.http_only = true;
            } else {
                trace!(attribute = key, "ignoring cookie attribute");
            }
        }

        if let Some(seconds) = max_age {
            cookie.expires = Some(match u64::try_from(seconds) {
                Ok(seconds) if seconds > 0 => SystemTime::now() + Duration::from_secs(seconds),
                _ => UNIX_EPOCH,
            });
        }

        Ok(cookie)
    }

    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|expires| expires <= SystemTime::now())
    }

    /// Encodes the cookie as a `Set-Cookie` value.
    pub fn to_header_value(&self) -> Result<String, EncodeError> {
        if self.name.is_empty() || !self.name.bytes().all(is_token_char) {
            return Err(EncodeError::bad_cookie_attr(format!("cookie name {:?}", self.name)));
        }
        if !self.value.bytes().all(is_cookie_octet) {
            return Err(EncodeError::bad_cookie_attr(format!("value of cookie {:?}", self.name)));
        }
        if let Some(domain) = &self.domain {
            if domain.is_empty() || !domain.bytes().all(|c| c.is_ascii_alphanumeric() || c == b'-' || c == b'.') {
                return Err(EncodeError::bad_cookie_attr(format!("domain {domain:?}")));
            }
        }
        if !self.path.starts_with('/') || self.path.bytes().any(|c| c == b';' || c.is_ascii_control()) {
            return Err(EncodeError::bad_cookie_attr(format!("path {:?}", self.path)));
        }

        let mut header = format!("{}={}", self.name, self.value);
        if let Some(domain) = &self.domain {
            let _ = write!(header, "; Domain={domain}");
        }
        let _ = write!(header, "; Path={}", self.path);
        if let Some(expires) = self.expires {
            let _ = write!(header, "; Expires={}", httpdate::fmt_http_date(expires));
        }
        if self.secure {
            header.push_str("; Secure");
        }
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        Ok(header)
    }
}

/// Splits a request `Cookie:` header into `(name, value)` pairs.
///
/// Pairs without `=` or with an empty name are dropped.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), unquote(value.trim()).to_string()))
        })
        .collect()
}

fn unquote(value: &str) -> &str {
    value.strip_prefix('"').and_then(|v| v.strip_suffix('"')).unwrap_or(value)
}

fn is_cookie_octet(c: u8) -> bool {
    matches!(c, 0x21 | 0x23..=0x2b | 0x2d..=0x3a | 0x3c..=0x5b | 0x5d..=0x7e)
}

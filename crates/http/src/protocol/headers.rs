//! Case-insensitive header container.
//!
//! [`Headers`] stores one entry per lowercase field name, in first-seen order.
//! Repeated fields are folded into the existing entry: `Cookie` values are
//! joined with `; `, every other field with `, `.

use std::fmt;

use crate::protocol::chars::{contains_ignore_ascii_case, from_dec_string};
use crate::protocol::{BodyError, HeaderId, ParseError};

#[derive(Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { fields: Vec::with_capacity(capacity) }
    }

    /// Adds a field, joining the value onto an existing entry with the same name.
    pub fn add(&mut self, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        match self.position(&name) {
            Some(index) => {
                let separator = if name.contains("cookie") { "; " } else { ", " };
                let existing = &mut self.fields[index].1;
                existing.push_str(separator);
                existing.push_str(value);
            }
            None => self.fields.push((name, value.to_string())),
        }
    }

    /// Sets a field, replacing any existing value.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) {
        let name = name.to_ascii_lowercase();
        let value = value.into();
        match self.position(&name) {
            Some(index) => self.fields[index].1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn insert_id(&mut self, id: HeaderId, value: impl Into<String>) {
        self.insert(id.lowercase_name(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.position(&name.to_ascii_lowercase())?;
        Some(self.fields.remove(index).1)
    }

    /// Returns the value stored under `name`, or the empty string when absent.
    pub fn find(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn find_id(&self, id: HeaderId) -> &str {
        self.find(id.lowercase_name())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            let name = name.to_ascii_lowercase();
            self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v.as_str())
        } else {
            self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
        }
    }

    pub fn get_id(&self, id: HeaderId) -> Option<&str> {
        self.get(id.lowercase_name())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates `(lowercase name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// The declared body length; `0` when no `Content-Length` is present.
    ///
    /// # Errors
    ///
    /// - [`ParseError::InvalidContentLength`] when the value is not a decimal number
    /// - [`BodyError::Oversize`] when it exceeds `max_body_size`
    pub fn content_length(&self, max_body_size: u64) -> Result<u64, ParseError> {
        let Some(value) = self.get_id(HeaderId::ContentLength) else {
            return Ok(0);
        };

        let value = value.trim();
        if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseError::invalid_content_length(format!("value {value} is not a decimal number")));
        }

        // all digits, so a failed conversion can only be an overflow
        let length = from_dec_string(value).and_then(|n| u64::try_from(n).ok()).unwrap_or(u64::MAX);
        if length > max_body_size {
            return Err(BodyError::oversize(length, max_body_size).into());
        }
        Ok(length)
    }

    /// True when a `Transfer-Encoding` field is present and is not `identity`.
    pub fn is_chunked(&self) -> bool {
        self.get_id(HeaderId::TransferEncoding).is_some_and(|value| !contains_ignore_ascii_case(value, "identity"))
    }

    /// True when the `Connection` field asks for `close`.
    pub fn close_connection(&self) -> bool {
        self.get_id(HeaderId::Connection).is_some_and(|value| contains_ignore_ascii_case(value, "close"))
    }

    /// True when the `Connection` field asks for `keep-alive`.
    pub fn keep_alive(&self) -> bool {
        self.get_id(HeaderId::Connection).is_some_and(|value| contains_ignore_ascii_case(value, "keep-alive"))
    }

    /// True when the `Expect` field asks for `100-continue`.
    pub fn expect_continue(&self) -> bool {
        self.get_id(HeaderId::Expect).is_some_and(|value| contains_ignore_ascii_case(value, "100-continue"))
    }

    fn position(&self, lowercase: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == lowercase)
    }
}

impl fmt::Debug for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

impl<N: AsRef<str>, V: AsRef<str>> FromIterator<(N, V)> for Headers {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.add(name.as_ref(), value.as_ref());
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_duplicates() {
        let mut headers = Headers::new();
        headers.add("Accept", "text/html");
        headers.add("accept", "application/json");
        headers.add("Cookie", "a=1");
        headers.add("COOKIE", "b=2");

        assert_eq!(headers.len(), 2);
        assert_eq!(headers.find("accept"), "text/html, application/json");
        assert_eq!(headers.find_id(HeaderId::Cookie), "a=1; b=2");
    }

    #[test]
    fn lookup_ignores_case() {
        let headers: Headers = [("Content-Type", "text/plain")].into_iter().collect();
        for name in ["content-type", "Content-Type", "CONTENT-TYPE", "cOnTeNt-TyPe"] {
            assert_eq!(headers.find(name), "text/plain");
        }
        assert_eq!(headers.find("host"), "");
        assert!(headers.get("host").is_none());
    }

    #[test]
    fn insert_replaces_and_remove_deletes() {
        let mut headers = Headers::new();
        headers.insert_id(HeaderId::Server, "a");
        headers.insert("server", "b");
        assert_eq!(headers.find_id(HeaderId::Server), "b");
        assert_eq!(headers.remove("Server"), Some("b".to_string()));
        assert!(headers.is_empty());
    }

    #[test]
    fn content_length() {
        let mut headers = Headers::new();
        assert_eq!(headers.content_length(100).unwrap(), 0);

        headers.insert("content-length", "42");
        assert_eq!(headers.content_length(100).unwrap(), 42);

        headers.insert("content-length", "4x2");
        assert!(matches!(headers.content_length(100), Err(ParseError::InvalidContentLength { .. })));

        headers.insert("content-length", "999999999999");
        assert!(matches!(headers.content_length(1_048_576), Err(ParseError::Body { source: BodyError::Oversize { .. } })));

        headers.insert("content-length", "99999999999999999999999999");
        assert!(matches!(headers.content_length(u64::MAX - 1), Err(ParseError::Body { source: BodyError::Oversize { .. } })));
    }

    #[test]
    fn derived_queries() {
        let mut headers = Headers::new();
        assert!(!headers.is_chunked());
        assert!(!headers.close_connection());
        assert!(!headers.expect_continue());

        headers.insert("transfer-encoding", "gzip, Chunked");
        headers.insert("connection", "Close");
        headers.insert("expect", "100-Continue");
        assert!(headers.is_chunked());
        assert!(headers.close_connection());
        assert!(headers.expect_continue());

        headers.insert("transfer-encoding", "IDENTITY");
        assert!(!headers.is_chunked());
    }
}

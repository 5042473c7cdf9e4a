//! Cached `Date` header value.
//!
//! Formatting an RFC 1123 date on every response is wasted work when many
//! responses share the same second, so the last formatted value is kept in an
//! [`ArcSwap`] and only rebuilt once the clock moves to a new second.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use arc_swap::ArcSwap;
use bytes::Bytes;
use once_cell::sync::Lazy;

#[derive(Debug)]
struct CachedDate {
    second: u64,
    value: Bytes,
}

impl CachedDate {
    fn at(now: SystemTime) -> Self {
        let second = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();
        Self { second, value: Bytes::from(httpdate::fmt_http_date(now)) }
    }
}

/// Hands out the current HTTP date, shared by all connections.
#[derive(Debug)]
pub struct DateService {
    current: ArcSwap<CachedDate>,
}

static DATE_SERVICE: Lazy<DateService> = Lazy::new(DateService::new);

impl DateService {
    pub fn get_global_instance() -> &'static DateService {
        &DATE_SERVICE
    }

    fn new() -> Self {
        Self { current: ArcSwap::from_pointee(CachedDate::at(SystemTime::now())) }
    }

    /// The current time as `Sun, 06 Nov 1994 08:49:37 GMT`.
    pub fn http_date(&self) -> Bytes {
        let now = SystemTime::now();
        let second = now.duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or_default();

        let cached = self.current.load();
        if cached.second == second {
            return cached.value.clone();
        }

        let fresh = Arc::new(CachedDate::at(now));
        let value = fresh.value.clone();
        self.current.store(fresh);
        value
    }

    /// Like [`DateService::http_date`], as a string.
    pub fn http_date_string(&self) -> String {
        String::from_utf8_lossy(&self.http_date()).into_owned()
    }
}

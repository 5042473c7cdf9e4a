//! Registry of well-known header fields.
//!
//! Every [`HeaderId`] has a canonical spelling used when writing headers and a
//! lowercase spelling used as the lookup key inside [`Headers`](super::Headers).

use std::fmt;

macro_rules! header_ids {
    ($( $(#[$docs:meta])* ($id:ident, $canonical:literal, $lowercase:literal); )+) => {
        /// Identifier of a well-known HTTP header field.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum HeaderId {
            $( $(#[$docs])* $id, )+
            /// Any header without a registry entry.
            ExtensionHeader,
        }

        impl HeaderId {
            /// Every registered id, excluding [`HeaderId::ExtensionHeader`].
            pub const ALL: &'static [HeaderId] = &[$( HeaderId::$id, )+];

            /// The canonical spelling, e.g. `Content-Length`.
            pub const fn canonical_name(self) -> &'static str {
                match self {
                    $( HeaderId::$id => $canonical, )+
                    HeaderId::ExtensionHeader => "",
                }
            }

            /// The lowercase spelling, e.g. `content-length`.
            pub const fn lowercase_name(self) -> &'static str {
                match self {
                    $( HeaderId::$id => $lowercase, )+
                    HeaderId::ExtensionHeader => "",
                }
            }

            /// Looks up a header by its lowercase name.
            pub fn from_lowercase(name: &str) -> HeaderId {
                match name {
                    $( $lowercase => HeaderId::$id, )+
                    _ => HeaderId::ExtensionHeader,
                }
            }
        }
    };
}

header_ids! {
    // general
    (CacheControl, "Cache-Control", "cache-control");
    (Connection, "Connection", "connection");
    (Date, "Date", "date");
    (Pragma, "Pragma", "pragma");
    (Trailer, "Trailer", "trailer");
    (TransferEncoding, "Transfer-Encoding", "transfer-encoding");
    (Upgrade, "Upgrade", "upgrade");
    (Via, "Via", "via");
    (Warning, "Warning", "warning");
    // request
    (Accept, "Accept", "accept");
    (AcceptCharset, "Accept-Charset", "accept-charset");
    (AcceptEncoding, "Accept-Encoding", "accept-encoding");
    (AcceptLanguage, "Accept-Language", "accept-language");
    (Authorization, "Authorization", "authorization");
    (Cookie, "Cookie", "cookie");
    (Expect, "Expect", "expect");
    (From, "From", "from");
    (Host, "Host", "host");
    (IfMatch, "If-Match", "if-match");
    (IfModifiedSince, "If-Modified-Since", "if-modified-since");
    (IfNoneMatch, "If-None-Match", "if-none-match");
    (IfRange, "If-Range", "if-range");
    (IfUnmodifiedSince, "If-Unmodified-Since", "if-unmodified-since");
    (MaxForwards, "Max-Forwards", "max-forwards");
    (Origin, "Origin", "origin");
    (ProxyAuthorization, "Proxy-Authorization", "proxy-authorization");
    (Range, "Range", "range");
    (Referer, "Referer", "referer");
    (Te, "TE", "te");
    (UserAgent, "User-Agent", "user-agent");
    // response
    (AcceptRanges, "Accept-Ranges", "accept-ranges");
    (Age, "Age", "age");
    (ETag, "ETag", "etag");
    (Location, "Location", "location");
    (ProxyAuthenticate, "Proxy-Authenticate", "proxy-authenticate");
    (RetryAfter, "Retry-After", "retry-after");
    (Server, "Server", "server");
    (SetCookie, "Set-Cookie", "set-cookie");
    (Vary, "Vary", "vary");
    (WwwAuthenticate, "WWW-Authenticate", "www-authenticate");
    // representation
    (Allow, "Allow", "allow");
    (ContentEncoding, "Content-Encoding", "content-encoding");
    (ContentLanguage, "Content-Language", "content-language");
    (ContentLength, "Content-Length", "content-length");
    (ContentLocation, "Content-Location", "content-location");
    (ContentMd5, "Content-MD5", "content-md5");
    (ContentRange, "Content-Range", "content-range");
    (ContentType, "Content-Type", "content-type");
    (Expires, "Expires", "expires");
    (LastModified, "Last-Modified", "last-modified");
}

impl HeaderId {
    /// Looks up a header by name in any ASCII casing.
    pub fn from_name(name: &str) -> HeaderId {
        if name.bytes().any(|b| b.is_ascii_uppercase()) {
            HeaderId::from_lowercase(&name.to_ascii_lowercase())
        } else {
            HeaderId::from_lowercase(name)
        }
    }
}

impl fmt::Display for HeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Returns the spelling used on the wire for a lowercase header name.
///
/// Registered names use their canonical form; extension names are title-cased
/// per dash-separated word, `x-request-id` becomes `X-Request-Id`.
pub fn wire_name(lowercase: &str) -> std::borrow::Cow<'_, str> {
    match HeaderId::from_lowercase(lowercase) {
        HeaderId::ExtensionHeader => {
            let mut name = String::with_capacity(lowercase.len());
            let mut upper = true;
            for c in lowercase.chars() {
                if upper {
                    name.push(c.to_ascii_uppercase());
                } else {
                    name.push(c);
                }
                upper = c == '-';
            }
            name.into()
        }
        id => id.canonical_name().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercase_name_is_lowercase_of_canonical() {
        for id in HeaderId::ALL {
            assert_eq!(id.lowercase_name(), id.canonical_name().to_ascii_lowercase(), "{id:?}");
        }
    }

    #[test]
    fn lookup_round_trips() {
        for id in HeaderId::ALL {
            assert_eq!(HeaderId::from_lowercase(id.lowercase_name()), *id);
            assert_eq!(HeaderId::from_name(id.canonical_name()), *id);
            assert_eq!(HeaderId::from_name(&id.canonical_name().to_ascii_uppercase()), *id);
        }
        assert_eq!(HeaderId::from_name("X-Custom"), HeaderId::ExtensionHeader);
    }

    #[test]
    fn registry_has_no_duplicates() {
        let mut names: Vec<_> = HeaderId::ALL.iter().map(|id| id.lowercase_name()).collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn wire_names() {
        assert_eq!(wire_name("content-length"), "Content-Length");
        assert_eq!(wire_name("www-authenticate"), "WWW-Authenticate");
        assert_eq!(wire_name("te"), "TE");
        assert_eq!(wire_name("x-request-id"), "X-Request-Id");
    }
}

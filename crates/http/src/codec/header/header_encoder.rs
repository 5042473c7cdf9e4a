//! HTTP head encoder for requests and responses.
//!
//! Serializes the start line and header fields of a message, then appends the
//! framing header that matches the [`PayloadSize`] the body will be written
//! with. Every name and value is validated before the first byte is written,
//! so a rejected head leaves the destination buffer untouched.
//!
//! Response heads are written as `Date`, `Server`, the remaining fields in
//! insertion order, then `Content-Length` or `Transfer-Encoding`.

use std::io;
use std::io::{ErrorKind, Write};

use bytes::{BufMut, BytesMut};
use http::Version;
use tokio_util::codec::Encoder;
use tracing::error;

use crate::protocol::chars::{is_field_value_char, is_token_char};
use crate::protocol::{EncodeError, HeaderId, Headers, PayloadSize, RequestHead, ResponseHead, SendError, wire_name};

/// Initial buffer size allocated for head serialization
const INIT_HEADER_SIZE: usize = 4 * 1024;

/// Encoder for message heads implementing the [`Encoder`] trait for both
/// `(ResponseHead, PayloadSize)` and `(RequestHead, PayloadSize)`.
pub struct HeaderEncoder;

impl Encoder<(ResponseHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (ResponseHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (head, payload_size) = item;

        validate_value("reason-phrase", &head.line.reason)?;
        validate_headers(&head.headers)?;
        let version = version_str(head.version())?;

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", version, head.status().as_str(), head.line.reason)?;

        for id in [HeaderId::Date, HeaderId::Server] {
            if let Some(value) = head.headers.get_id(id) {
                write_field(dst, id.canonical_name(), value);
            }
        }
        for (name, value) in head.headers.iter() {
            if !matches!(name, "date" | "server") && !is_framing(name) {
                write_field(dst, &wire_name(name), value);
            }
        }

        if !head.forbids_body() {
            write_framing(dst, payload_size, true);
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

impl Encoder<(RequestHead, PayloadSize)> for HeaderEncoder {
    type Error = SendError;

    fn encode(&mut self, item: (RequestHead, PayloadSize), dst: &mut BytesMut) -> Result<(), Self::Error> {
        let (head, payload_size) = item;

        let uri = head.uri();
        if uri.is_empty() || uri.bytes().any(|c| !c.is_ascii_graphic()) {
            return Err(EncodeError::BadHeaderValue { name: "request-target".into() }.into());
        }
        validate_headers(&head.headers)?;
        let version = version_str(head.version())?;

        dst.reserve(INIT_HEADER_SIZE);
        write!(FastWrite(dst), "{} {} {}\r\n", head.method(), uri, version)?;

        for (name, value) in head.headers.iter() {
            if !is_framing(name) {
                write_field(dst, &wire_name(name), value);
            }
        }

        write_framing(dst, payload_size, false);
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

fn version_str(version: Version) -> Result<&'static str, SendError> {
    match version {
        Version::HTTP_11 => Ok("HTTP/1.1"),
        Version::HTTP_10 => Ok("HTTP/1.0"),
        v => {
            error!(http_version = ?v, "unsupported http version");
            Err(io::Error::from(ErrorKind::Unsupported).into())
        }
    }
}

fn is_framing(name: &str) -> bool {
    name == HeaderId::ContentLength.lowercase_name() || name == HeaderId::TransferEncoding.lowercase_name()
}

fn write_framing(dst: &mut BytesMut, payload_size: PayloadSize, zero_length: bool) {
    match payload_size {
        PayloadSize::Length(n) => {
            // writing into BytesMut is infallible
            let _ = write!(FastWrite(dst), "Content-Length: {n}\r\n");
        }
        PayloadSize::Chunked => dst.put_slice(b"Transfer-Encoding: chunked\r\n"),
        PayloadSize::Empty if zero_length => dst.put_slice(b"Content-Length: 0\r\n"),
        PayloadSize::Empty | PayloadSize::UntilClose => {}
    }
}

fn write_field(dst: &mut BytesMut, name: &str, value: &str) {
    dst.put_slice(name.as_bytes());
    dst.put_slice(b": ");
    dst.put_slice(value.as_bytes());
    dst.put_slice(b"\r\n");
}

fn validate_headers(headers: &Headers) -> Result<(), EncodeError> {
    for (name, value) in headers.iter() {
        if name.is_empty() || !name.bytes().all(is_token_char) {
            return Err(EncodeError::BadHeaderName { name: name.to_string() });
        }
        validate_value(name, value)?;
    }
    Ok(())
}

fn validate_value(name: &str, value: &str) -> Result<(), EncodeError> {
    if value.bytes().all(is_field_value_char) {
        Ok(())
    } else {
        Err(EncodeError::BadHeaderValue { name: name.to_string() })
    }
}

/// Fast writer implementation for writing to BytesMut.
///
/// This avoids going through `fmt::Write` when formatting numbers into the
/// buffer, since enough space has already been reserved.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl Write for FastWrite<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode};

    use super::*;

    fn encode_response(head: ResponseHead, payload_size: PayloadSize) -> Result<String, SendError> {
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, payload_size), &mut dst)?;
        Ok(String::from_utf8(dst.to_vec()).unwrap())
    }

    #[test]
    fn response_head_order() {
        let mut head = ResponseHead::new(StatusCode::OK);
        head.headers.insert("x-trace-id", "abc");
        head.headers.insert("content-length", "999");
        head.headers.insert("server", "wicket-http");
        head.headers.insert("date", "Sun, 06 Nov 1994 08:49:37 GMT");

        assert_eq!(
            encode_response(head, PayloadSize::Length(2)).unwrap(),
            "HTTP/1.1 200 OK\r\n\
             Date: Sun, 06 Nov 1994 08:49:37 GMT\r\n\
             Server: wicket-http\r\n\
             X-Trace-Id: abc\r\n\
             Content-Length: 2\r\n\r\n"
        );
    }

    #[test]
    fn framing_headers() {
        let head = ResponseHead::new(StatusCode::OK);
        assert_eq!(encode_response(head.clone(), PayloadSize::Chunked).unwrap(), "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n");
        assert_eq!(encode_response(head, PayloadSize::Empty).unwrap(), "HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");

        let head = ResponseHead::new(StatusCode::NO_CONTENT);
        assert_eq!(encode_response(head, PayloadSize::Empty).unwrap(), "HTTP/1.1 204 No Content\r\n\r\n");

        let head = ResponseHead::new(StatusCode::CONTINUE);
        assert_eq!(encode_response(head, PayloadSize::Empty).unwrap(), "HTTP/1.1 100 Continue\r\n\r\n");
    }

    #[test]
    fn http_10_status_line() {
        let mut head = ResponseHead::new(StatusCode::NOT_FOUND);
        head.line.version = Version::HTTP_10;
        assert!(encode_response(head, PayloadSize::Empty).unwrap().starts_with("HTTP/1.0 404 Not Found\r\n"));
    }

    #[test]
    fn rejects_bad_fields_without_writing() {
        let mut head = ResponseHead::new(StatusCode::OK);
        head.headers.insert("bad name", "x");
        let mut dst = BytesMut::new();
        let result = HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst);
        assert!(matches!(result, Err(SendError::Encode { source: EncodeError::BadHeaderName { .. } })));
        assert!(dst.is_empty());

        let mut head = ResponseHead::new(StatusCode::OK);
        head.headers.insert("location", "/a\r\nSet-Cookie: x=1");
        let result = HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst);
        assert!(matches!(result, Err(SendError::Encode { source: EncodeError::BadHeaderValue { .. } })));
        assert!(dst.is_empty());
    }

    #[test]
    fn request_head() {
        let head = RequestHead::new(Method::POST, "/u").header(HeaderId::Host, "x");
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, PayloadSize::Chunked), &mut dst).unwrap();
        assert_eq!(&dst[..], b"POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n");

        let head = RequestHead::new(Method::GET, "/hello").header(HeaderId::Host, "x");
        let mut dst = BytesMut::new();
        HeaderEncoder.encode((head, PayloadSize::Empty), &mut dst).unwrap();
        assert_eq!(&dst[..], b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n");
    }
}

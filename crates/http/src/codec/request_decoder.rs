//! HTTP request decoder module
//!
//! This module decodes HTTP requests using a streaming approach. Bytes may
//! arrive in any split; the decoder keeps its position and yields each part of
//! the request as soon as it is complete.
//!
//! # Components
//!
//! - [`RequestDecoder`]: coordinates request-line, header and payload parsing
//! - Request line: [`RequestLineDecoder`]
//! - Header block: [`HeaderDecoder`]
//! - Payload: [`PayloadDecoder`], selected from the parsed headers
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use tokio_util::codec::Decoder;
//! use wicket_http::codec::RequestDecoder;
//! use wicket_http::config::ParserConfig;
//! use wicket_http::protocol::Message;
//!
//! let mut decoder = RequestDecoder::new(ParserConfig::DEFAULT);
//! let mut buffer = BytesMut::from(&b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n"[..]);
//! let Some(Message::Header((head, _))) = decoder.decode(&mut buffer).unwrap() else { panic!() };
//! assert_eq!(head.uri(), "/hello");
//! ```

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::codec::line::RequestLineDecoder;
use crate::config::ParserConfig;
use crate::protocol::{Headers, Message, ParseError, PayloadItem, PayloadSize, RequestHead, RequestLine};

/// A decoder for HTTP requests that handles the head and the payload.
///
/// # State Machine
///
/// - `line` is `None`: parsing the request line
/// - `line` is `Some` and `payload_decoder` is `None`: parsing the header block
/// - `payload_decoder` is `Some`: parsing the payload until [`PayloadItem::Eof`]
pub struct RequestDecoder {
    config: ParserConfig,
    line_decoder: RequestLineDecoder,
    header_decoder: HeaderDecoder,
    line: Option<RequestLine>,
    payload_decoder: Option<PayloadDecoder>,
}

impl RequestDecoder {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            line_decoder: RequestLineDecoder::new(config),
            header_decoder: HeaderDecoder::new(config),
            line: None,
            payload_decoder: None,
        }
    }

    /// True between messages, when no byte of the next request was consumed.
    pub fn is_idle(&self) -> bool {
        self.line.is_none() && self.payload_decoder.is_none() && self.line_decoder.is_idle()
    }

    /// True while a request body is being decoded.
    pub fn in_payload(&self) -> bool {
        self.payload_decoder.is_some()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

/// The body framing a request head announces.
///
/// `Transfer-Encoding` takes precedence over `Content-Length`; neither means
/// no body.
pub fn request_payload_size(headers: &Headers, config: &ParserConfig) -> Result<PayloadSize, ParseError> {
    if headers.is_chunked() {
        return Ok(PayloadSize::Chunked);
    }
    headers.content_length(config.max_body_size).map(PayloadSize::new_length)
}

impl Decoder for RequestDecoder {
    type Item = Message<(RequestHead, PayloadSize)>;
    type Error = ParseError;

    /// Attempts to decode the next part of a request from the buffer.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Message::Header(_)))`: the request head and its body framing
    /// - `Ok(Some(Message::Payload(_)))`: a body chunk, the trailers, or the end of the body
    /// - `Ok(None)`: need more data to proceed
    /// - `Err(_)`: the request is malformed
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // parse payload if have payload_decoder
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let message = match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Eof) => {
                    // no need payload decoder in this request now
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                Some(item) => Some(Message::Payload(item)),
                None => None,
            };

            return Ok(message);
        }

        if self.line.is_none() {
            match self.line_decoder.decode(src)? {
                Some(line) => self.line = Some(line),
                None => return Ok(None),
            }
        }

        let Some(headers) = self.header_decoder.decode(src)? else {
            return Ok(None);
        };
        let Some(line) = self.line.take() else {
            return Ok(None);
        };

        let payload_size = request_payload_size(&headers, &self.config)?;
        trace!(?payload_size, header_count = headers.len(), "parsed request head");

        if !payload_size.is_empty() {
            self.payload_decoder = Some(PayloadDecoder::new(payload_size, self.config));
        }
        Ok(Some(Message::Header((RequestHead { line, headers }, payload_size))))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::{Method, Version};
    use indoc::indoc;

    use super::*;
    use crate::protocol::{BodyError, HeaderId};

    fn crlf(s: &str) -> BytesMut {
        BytesMut::from(s.replace('\n', "\r\n").as_str())
    }

    fn decode_all(decoder: &mut RequestDecoder, buf: &mut BytesMut) -> Vec<Message<(RequestHead, PayloadSize)>> {
        let mut messages = vec![];
        while let Some(message) = decoder.decode(buf).unwrap() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn simple_get() {
        let mut buf = BytesMut::from(&b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n"[..]);
        let mut decoder = RequestDecoder::new(ParserConfig::DEFAULT);

        let Some(Message::Header((head, payload_size))) = decoder.decode(&mut buf).unwrap() else {
            panic!("expected request head");
        };
        assert_eq!(head.method(), &Method::GET);
        assert_eq!(head.uri(), "/hello");
        assert_eq!(head.version(), Version::HTTP_11);
        assert_eq!(head.headers().find_id(HeaderId::Host), "x");
        assert_eq!(payload_size, PayloadSize::Empty);
        assert!(decoder.is_idle());
        assert!(buf.is_empty());
    }

    #[test]
    fn content_length_body() {
        let mut buf = crlf(indoc! {r##"
        POST /submit HTTP/1.1
        Content-Length: 11

        "##});
        buf.extend_from_slice(b"hello world");

        let messages = decode_all(&mut RequestDecoder::new(ParserConfig::DEFAULT), &mut buf);
        assert_eq!(messages.len(), 3);
        assert!(matches!(&messages[0], Message::Header((_, PayloadSize::Length(11)))));
        assert!(matches!(&messages[1], Message::Payload(PayloadItem::Chunk(b)) if b == &Bytes::from_static(b"hello world")));
        assert!(matches!(&messages[2], Message::Payload(PayloadItem::Eof)));
    }

    #[test]
    fn chunked_upload() {
        let mut buf = BytesMut::from(
            &b"POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n"[..],
        );
        let messages = decode_all(&mut RequestDecoder::new(ParserConfig::DEFAULT), &mut buf);

        assert!(matches!(&messages[0], Message::Header((_, PayloadSize::Chunked))));
        let body: Vec<u8> = messages
            .into_iter()
            .filter_map(|m| m.into_payload_item())
            .filter_map(|item| item.into_bytes())
            .flat_map(|b| b.to_vec())
            .collect();
        assert_eq!(body, b"hello world");
    }

    #[test]
    fn pipelined_requests() {
        let mut buf = crlf(indoc! {r##"
        GET /a HTTP/1.1
        Host: x

        GET /b HTTP/1.1
        Host: x

        "##});
        let mut decoder = RequestDecoder::new(ParserConfig::DEFAULT);
        let uris: Vec<String> = decode_all(&mut decoder, &mut buf)
            .into_iter()
            .filter_map(|m| match m {
                Message::Header((head, _)) => Some(head.uri().to_string()),
                Message::Payload(_) => None,
            })
            .collect();
        assert_eq!(uris, vec!["/a", "/b"]);
    }

    #[test]
    fn byte_at_a_time() {
        let input = b"PUT /x HTTP/1.0\r\nContent-Length: 3\r\n\r\nabc";
        let mut decoder = RequestDecoder::new(ParserConfig::DEFAULT);
        let mut buf = BytesMut::new();
        let mut messages = vec![];
        for c in input {
            buf.extend_from_slice(&[*c]);
            while let Some(message) = decoder.decode(&mut buf).unwrap() {
                messages.push(message);
            }
        }
        assert!(messages[0].is_header());
        let body: Vec<u8> = messages.into_iter().filter_map(|m| m.into_payload_item()?.into_bytes()).flat_map(|b| b.to_vec()).collect();
        assert_eq!(body, b"abc");
    }

    #[test]
    fn encoded_request_decodes_back() {
        use tokio_util::codec::Encoder;

        use crate::codec::RequestEncoder;

        let mut head = RequestHead::new(Method::POST, "/upload?id=7").header(HeaderId::Host, "x");
        head.headers_mut().add("Accept", "text/plain");
        head.headers_mut().add("accept", "application/json");
        let mut trailers = Headers::new();
        trailers.insert("x-checksum", "11");

        let mut encoder = RequestEncoder::new();
        let mut wire = BytesMut::new();
        encoder.encode(Message::<_, Bytes>::Header((head.clone(), PayloadSize::Chunked)), &mut wire).unwrap();
        for part in ["hello", " ", "world"] {
            let chunk = PayloadItem::Chunk(Bytes::from_static(part.as_bytes()));
            encoder.encode(Message::<(RequestHead, PayloadSize), _>::Payload(chunk), &mut wire).unwrap();
        }
        encoder.encode(Message::<(RequestHead, PayloadSize), Bytes>::Payload(PayloadItem::Trailers(trailers)), &mut wire).unwrap();
        encoder.encode(Message::<(RequestHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut wire).unwrap();

        let mut decoder = RequestDecoder::new(ParserConfig { strict_crlf: true, ..ParserConfig::DEFAULT });
        let mut messages = decode_all(&mut decoder, &mut wire).into_iter();
        assert!(wire.is_empty());
        assert!(decoder.is_idle());

        let Some(Message::Header((decoded, PayloadSize::Chunked))) = messages.next() else { panic!("expected chunked head") };
        assert_eq!(decoded.method(), head.method());
        assert_eq!(decoded.uri(), head.uri());
        assert_eq!(decoded.version(), Version::HTTP_11);
        assert_eq!(decoded.headers().find_id(HeaderId::Host), "x");
        assert_eq!(decoded.headers().find("accept"), "text/plain, application/json");

        let mut body = Vec::new();
        let mut decoded_trailers = None;
        for message in messages {
            match message.into_payload_item() {
                Some(PayloadItem::Chunk(bytes)) => body.extend_from_slice(&bytes),
                Some(PayloadItem::Trailers(t)) => decoded_trailers = Some(t),
                Some(PayloadItem::Eof) => break,
                None => panic!("unexpected second head"),
            }
        }
        assert_eq!(body, b"hello world");
        assert_eq!(decoded_trailers.unwrap().find("x-checksum"), "11");
    }

    #[test]
    fn repeated_fields_survive_reencoding() {
        use tokio_util::codec::Encoder;

        use crate::codec::RequestEncoder;

        let mut buf = crlf(indoc! {r##"
        GET /list HTTP/1.1
        Host: x
        Accept: text/html
        Accept: */*
        Cookie: a=1
        Cookie: b=2

        "##});
        let mut decoder = RequestDecoder::new(ParserConfig::DEFAULT);
        let Some(Message::Header((first, PayloadSize::Empty))) = decoder.decode(&mut buf).unwrap() else { panic!("expected head") };
        assert_eq!(first.headers().find("accept"), "text/html, */*");
        assert_eq!(first.headers().find("cookie"), "a=1; b=2");

        let mut wire = BytesMut::new();
        RequestEncoder::new().encode(Message::<_, Bytes>::Header((first.clone(), PayloadSize::Empty)), &mut wire).unwrap();
        let Some(Message::Header((second, PayloadSize::Empty))) = decoder.decode(&mut wire).unwrap() else { panic!("expected head") };
        assert_eq!(second, first);
    }

    #[test]
    fn oversized_content_length() {
        let mut buf = BytesMut::from(&b"POST / HTTP/1.1\r\nContent-Length: 999999999999\r\n\r\n"[..]);
        let result = RequestDecoder::new(ParserConfig::DEFAULT).decode(&mut buf);
        let Err(e) = result else { panic!("expected an error") };
        assert!(matches!(e, ParseError::Body { source: BodyError::Oversize { .. } }));
        assert_eq!(e.status_code(), http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn whitespace_flood() {
        let mut buf = BytesMut::from(format!("GET / HTTP/1.1\r\nHost:{}x\r\n\r\n", " ".repeat(20)).as_str());
        let result = RequestDecoder::new(ParserConfig::DEFAULT).decode(&mut buf);
        assert!(matches!(result, Err(ParseError::TooMuchWhitespace { max_whitespace: 8 })));
    }
}

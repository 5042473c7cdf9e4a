//! HTTP response decoder, the client-side counterpart of [`RequestDecoder`](super::RequestDecoder).
//!
//! Body framing of a response depends on the request it answers: responses to
//! HEAD, and 1xx, 204 and 304 responses, never have a body; a response without
//! `Content-Length` or chunked framing runs until the server closes the
//! connection.

use bytes::BytesMut;
use http::Method;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::codec::body::PayloadDecoder;
use crate::codec::header::HeaderDecoder;
use crate::codec::line::StatusLineDecoder;
use crate::config::ParserConfig;
use crate::protocol::{Message, ParseError, PayloadItem, PayloadSize, ResponseHead, StatusLine};

pub struct ResponseDecoder {
    config: ParserConfig,
    line_decoder: StatusLineDecoder,
    header_decoder: HeaderDecoder,
    line: Option<StatusLine>,
    payload_decoder: Option<PayloadDecoder>,
    head_request: bool,
}

impl ResponseDecoder {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            line_decoder: StatusLineDecoder::new(config),
            header_decoder: HeaderDecoder::new(config),
            line: None,
            payload_decoder: None,
            head_request: false,
        }
    }

    /// Records the method of the request the next response answers.
    pub fn expect_response_to(&mut self, method: &Method) {
        self.head_request = method == Method::HEAD;
    }

    fn payload_size(&self, head: &ResponseHead) -> Result<PayloadSize, ParseError> {
        if self.head_request || head.forbids_body() {
            return Ok(PayloadSize::Empty);
        }
        if head.headers.is_chunked() {
            return Ok(PayloadSize::Chunked);
        }
        if head.headers.contains("content-length") {
            return head.headers.content_length(self.config.max_body_size).map(PayloadSize::new_length);
        }
        Ok(PayloadSize::UntilClose)
    }
}

impl Decoder for ResponseDecoder {
    type Item = Message<(ResponseHead, PayloadSize)>;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            return Ok(match payload_decoder.decode(src)? {
                Some(item @ PayloadItem::Eof) => {
                    self.payload_decoder.take();
                    Some(Message::Payload(item))
                }
                Some(item) => Some(Message::Payload(item)),
                None => None,
            });
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

        let head = ResponseHead { line, headers };
        let payload_size = self.payload_size(&head)?;
        trace!(status = %head.status(), ?payload_size, "parsed response head");

        if !payload_size.is_empty() {
            self.payload_decoder = Some(PayloadDecoder::new(payload_size, self.config));
        }
        Ok(Some(Message::Header((head, payload_size))))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload_decoder) = &mut self.payload_decoder {
            let item = payload_decoder.decode_eof(src)?;
            if item.as_ref().is_some_and(PayloadItem::is_eof) {
                self.payload_decoder.take();
            }
            return Ok(item.map(Message::Payload));
        }

        match self.decode(src)? {
            Some(message) => Ok(Some(message)),
            None if src.is_empty() && self.line.is_none() => Ok(None),
            None => Err(ParseError::io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed inside a response head",
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;

    fn body_of(messages: Vec<Message<(ResponseHead, PayloadSize)>>) -> Vec<u8> {
        messages.into_iter().filter_map(|m| m.into_payload_item()?.into_bytes()).flat_map(|b| b.to_vec()).collect()
    }

    #[test]
    fn content_length_response() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi"[..]);
        let mut decoder = ResponseDecoder::new(ParserConfig::DEFAULT);
        let mut messages = vec![];
        while let Some(message) = decoder.decode(&mut buf).unwrap() {
            messages.push(message);
        }

        let Message::Header((head, PayloadSize::Length(2))) = &messages[0] else { panic!("unexpected {:?}", messages[0]) };
        assert_eq!(head.status(), StatusCode::OK);
        assert_eq!(body_of(messages), b"hi");
    }

    #[test]
    fn encoded_responses_decode_back() {
        use tokio_util::codec::Encoder;

        use crate::codec::ResponseEncoder;
        use crate::protocol::{HeaderId, Headers};

        type Out = Message<(ResponseHead, PayloadSize), Bytes>;

        let mut created = ResponseHead::new(StatusCode::CREATED);
        created.headers_mut().insert_id(HeaderId::ContentType, "text/plain");
        created.headers_mut().add("Vary", "accept");
        created.headers_mut().add("vary", "accept-encoding");
        let mut trailers = Headers::new();
        trailers.insert("x-done", "yes");

        let mut encoder = ResponseEncoder::new();
        let mut wire = BytesMut::new();
        encoder.encode(Out::Header((created, PayloadSize::Chunked)), &mut wire).unwrap();
        encoder.encode(Out::Payload(PayloadItem::Chunk(Bytes::from_static(b"made "))), &mut wire).unwrap();
        encoder.encode(Out::Payload(PayloadItem::Chunk(Bytes::from_static(b"it"))), &mut wire).unwrap();
        encoder.encode(Out::Payload(PayloadItem::Trailers(trailers)), &mut wire).unwrap();
        encoder.encode(Out::Payload(PayloadItem::Eof), &mut wire).unwrap();
        encoder.encode(Out::Header((ResponseHead::new(StatusCode::OK), PayloadSize::Length(2))), &mut wire).unwrap();
        encoder.encode(Out::Payload(PayloadItem::Chunk(Bytes::from_static(b"ok"))), &mut wire).unwrap();
        encoder.encode(Out::Payload(PayloadItem::Eof), &mut wire).unwrap();

        let mut decoder = ResponseDecoder::new(ParserConfig { strict_crlf: true, ..ParserConfig::DEFAULT });
        let mut first = vec![];
        while let Some(message) = decoder.decode(&mut wire).unwrap() {
            let eof = matches!(message, Message::Payload(PayloadItem::Eof));
            first.push(message);
            if eof {
                break;
            }
        }

        let Message::Header((head, PayloadSize::Chunked)) = &first[0] else { panic!("unexpected {:?}", first[0]) };
        assert_eq!(head.status(), StatusCode::CREATED);
        assert_eq!(head.line.reason, "Created");
        assert_eq!(head.headers().find_id(HeaderId::ContentType), "text/plain");
        assert_eq!(head.headers().find("vary"), "accept, accept-encoding");
        assert!(first.iter().any(|m| matches!(m, Message::Payload(PayloadItem::Trailers(t)) if t.find("x-done") == "yes")));
        assert_eq!(body_of(first), b"made it");

        let mut second = vec![];
        while let Some(message) = decoder.decode(&mut wire).unwrap() {
            second.push(message);
        }
        assert!(matches!(&second[0], Message::Header((head, PayloadSize::Length(2))) if head.status() == StatusCode::OK));
        assert!(second.last().is_some_and(|m| matches!(m, Message::Payload(PayloadItem::Eof))));
        assert_eq!(body_of(second), b"ok");
        assert!(wire.is_empty());
    }

    #[test]
    fn head_and_bodyless_responses() {
        let mut decoder = ResponseDecoder::new(ParserConfig::DEFAULT);
        decoder.expect_response_to(&Method::HEAD);
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nContent-Length: 20\r\n\r\n"[..]);
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Header((_, PayloadSize::Empty)))));

        decoder.expect_response_to(&Method::GET);
        let mut buf = BytesMut::from(&b"HTTP/1.1 304 Not Modified\r\nContent-Length: 20\r\n\r\n"[..]);
        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Header((_, PayloadSize::Empty)))));
    }

    #[test]
    fn reads_until_close() {
        let mut buf = BytesMut::from(&b"HTTP/1.0 200 OK\r\n\r\nsome"[..]);
        let mut decoder = ResponseDecoder::new(ParserConfig::DEFAULT);

        assert!(matches!(decoder.decode(&mut buf).unwrap(), Some(Message::Header((_, PayloadSize::UntilClose)))));
        let chunk = decoder.decode(&mut buf).unwrap().unwrap();
        assert!(matches!(chunk, Message::Payload(PayloadItem::Chunk(b)) if b == Bytes::from_static(b"some")));
        assert!(decoder.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(b" more");
        assert!(decoder.decode(&mut buf).unwrap().is_some());
        assert!(matches!(decoder.decode_eof(&mut buf).unwrap(), Some(Message::Payload(PayloadItem::Eof))));
    }

    #[test]
    fn chunked_response_with_trailers() {
        let mut buf = BytesMut::from(&b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\nX-Done: yes\r\n\r\n"[..]);
        let mut decoder = ResponseDecoder::new(ParserConfig::DEFAULT);
        let mut messages = vec![];
        while let Some(message) = decoder.decode(&mut buf).unwrap() {
            messages.push(message);
        }
        assert_eq!(messages.len(), 4);
        assert!(matches!(&messages[2], Message::Payload(PayloadItem::Trailers(t)) if t.find("x-done") == "yes"));
        assert_eq!(body_of(messages), b"hi");
    }
}

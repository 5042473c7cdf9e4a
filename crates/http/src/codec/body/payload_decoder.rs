//! Body decoding for whichever framing the message head announced.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::codec::body::chunked_decoder::ChunkedDecoder;
use crate::codec::body::length_decoder::{LengthDecoder, UntilCloseDecoder};
use crate::config::ParserConfig;
use crate::protocol::{ParseError, PayloadItem, PayloadSize};

#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    kind: Kind,
}

#[derive(Debug, Clone)]
enum Kind {
    Length(LengthDecoder),
    Chunked(Box<ChunkedDecoder>),
    UntilClose(UntilCloseDecoder),
    NoBody,
}

impl PayloadDecoder {
    pub fn new(payload_size: PayloadSize, config: ParserConfig) -> Self {
        let kind = match payload_size {
            PayloadSize::Length(length) => Kind::Length(LengthDecoder::new(length)),
            PayloadSize::Chunked => Kind::Chunked(Box::new(ChunkedDecoder::new(config))),
            PayloadSize::UntilClose => Kind::UntilClose(UntilCloseDecoder::default()),
            PayloadSize::Empty => Kind::NoBody,
        };
        Self { kind }
    }
}

impl Decoder for PayloadDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode(src),
            Kind::Chunked(decoder) => decoder.decode(src),
            Kind::UntilClose(decoder) => decoder.decode(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match &mut self.kind {
            Kind::Length(decoder) => decoder.decode_eof(src),
            Kind::Chunked(decoder) => decoder.decode_eof(src),
            Kind::UntilClose(decoder) => decoder.decode_eof(src),
            Kind::NoBody => Ok(Some(PayloadItem::Eof)),
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;

    #[test]
    fn no_body_ends_at_once() {
        let mut decoder = PayloadDecoder::new(PayloadSize::Empty, ParserConfig::DEFAULT);
        let mut buf = BytesMut::from(&b"GET / HTTP/1.1\r\n"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(PayloadItem::Eof));
        assert_eq!(buf.len(), 16);
    }

    #[test]
    fn length_stops_at_boundary() {
        let mut decoder = PayloadDecoder::new(PayloadSize::Length(3), ParserConfig::DEFAULT);
        let mut buf = BytesMut::from(&b"abcGET"[..]);
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(PayloadItem::Chunk(Bytes::from_static(b"abc"))));
        assert_eq!(decoder.decode(&mut buf).unwrap(), Some(PayloadItem::Eof));
        assert_eq!(&buf[..], b"GET");
    }
}

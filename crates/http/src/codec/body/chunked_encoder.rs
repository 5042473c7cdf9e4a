use std::io::Write;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::codec::header::FastWrite;
use crate::protocol::{EncodeError, Headers, PayloadItem, SendError, wire_name};

/// Encodes payload items with chunked transfer coding.
///
/// Trailers received before [`PayloadItem::Eof`] are written after the last chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedEncoder {
    eof: bool,
    trailers: Headers,
}

impl ChunkedEncoder {
    pub fn new() -> Self {
        Self { eof: false, trailers: Headers::new() }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for ChunkedEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if self.eof {
            return Ok(());
        }

        match item {
            // a zero-size chunk would end the body early
            PayloadItem::Chunk(bytes) if !bytes.has_remaining() => Ok(()),
            PayloadItem::Chunk(bytes) => encode_chunk(dst, bytes, None),
            PayloadItem::Trailers(trailers) => {
                for (name, value) in trailers.iter() {
                    self.trailers.add(name, value);
                }
                Ok(())
            }
            PayloadItem::Eof => {
                self.eof = true;
                encode_last_chunk(dst, None, &self.trailers)
            }
        }
    }
}

/// Writes `hex_size[; extension] CRLF data CRLF`.
pub fn encode_chunk<D: Buf>(dst: &mut BytesMut, mut data: D, extension: Option<&str>) -> Result<(), SendError> {
    validate_extension(extension)?;

    let size = data.remaining();
    match extension {
        Some(ext) => write!(FastWrite(dst), "{size:x}; {ext}\r\n")?,
        None => write!(FastWrite(dst), "{size:x}\r\n")?,
    }
    dst.reserve(size + 2);
    while data.has_remaining() {
        let chunk = data.chunk();
        let len = chunk.len();
        dst.extend_from_slice(chunk);
        data.advance(len);
    }
    dst.extend_from_slice(b"\r\n");
    Ok(())
}

/// Writes `0[; extension] CRLF [trailer lines] CRLF`.
pub fn encode_last_chunk(dst: &mut BytesMut, extension: Option<&str>, trailers: &Headers) -> Result<(), SendError> {
    validate_extension(extension)?;
    for (name, value) in trailers.iter() {
        if value.bytes().any(|c| c == b'\r' || c == b'\n') {
            return Err(EncodeError::BadHeaderValue { name: name.to_string() }.into());
        }
    }

    match extension {
        Some(ext) => write!(FastWrite(dst), "0; {ext}\r\n")?,
        None => dst.extend_from_slice(b"0\r\n"),
    }
    for (name, value) in trailers.iter() {
        write!(FastWrite(dst), "{}: {}\r\n", wire_name(name), value)?;
    }
    dst.extend_from_slice(b"\r\n");
    Ok(())
}

fn validate_extension(extension: Option<&str>) -> Result<(), EncodeError> {
    match extension {
        Some(ext) if ext.bytes().any(|c| c == b'\r' || c == b'\n') => {
            Err(EncodeError::BadHeaderValue { name: "chunk-extension".into() })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::codec::body::chunked_decoder::ChunkedDecoder;
    use crate::config::ParserConfig;
    use tokio_util::codec::Decoder;

    #[test]
    fn encodes_chunks_and_trailers() {
        let mut encoder = ChunkedEncoder::new();
        let mut dst = BytesMut::new();

        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"hello")), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::new()), &mut dst).unwrap();
        encoder.encode(PayloadItem::Chunk(Bytes::from(vec![b'x'; 26])), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Trailers([("x-checksum", "abc")].into_iter().collect()), &mut dst).unwrap();
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut dst).unwrap();
        assert!(encoder.is_finish());

        let expected = format!("5\r\nhello\r\n1a\r\n{}\r\n0\r\nX-Checksum: abc\r\n\r\n", "x".repeat(26));
        assert_eq!(&dst[..], expected.as_bytes());

        // nothing is written after the last chunk
        encoder.encode(PayloadItem::Chunk(Bytes::from_static(b"late")), &mut dst).unwrap();
        assert_eq!(&dst[..], expected.as_bytes());
    }

    #[test]
    fn extensions() {
        let mut dst = BytesMut::new();
        encode_chunk(&mut dst, Bytes::from_static(b"abc"), Some("sig=1")).unwrap();
        encode_last_chunk(&mut dst, Some("done"), &Headers::new()).unwrap();
        assert_eq!(&dst[..], b"3; sig=1\r\nabc\r\n0; done\r\n\r\n");

        let result = encode_chunk(&mut dst, Bytes::from_static(b"abc"), Some("a\r\nb"));
        assert!(matches!(result, Err(SendError::Encode { .. })));
    }

    #[test]
    fn decoder_reassembles_encoded_body() {
        let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut encoder = ChunkedEncoder::new();
        let mut wire = BytesMut::new();
        for piece in body.chunks(777) {
            encoder.encode(PayloadItem::Chunk(Bytes::copy_from_slice(piece)), &mut wire).unwrap();
        }
        encoder.encode(PayloadItem::<Bytes>::Eof, &mut wire).unwrap();

        let mut decoder = ChunkedDecoder::new(ParserConfig::DEFAULT);
        let mut decoded = Vec::new();
        loop {
            match decoder.decode(&mut wire).unwrap().unwrap() {
                PayloadItem::Chunk(bytes) => decoded.extend_from_slice(&bytes),
                PayloadItem::Trailers(_) => {}
                PayloadItem::Eof => break,
            }
        }
        assert_eq!(decoded, body);
        assert!(wire.is_empty());
    }
}

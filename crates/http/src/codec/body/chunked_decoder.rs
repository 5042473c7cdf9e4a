//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module decodes bodies framed with chunked transfer coding as specified in
//! [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1):
//!
//! ```text
//! chunk      = chunk-size [ chunk-ext ] CRLF chunk-data CRLF
//! last-chunk = 1*("0") [ chunk-ext ] CRLF
//! trailer    = *( header-field CRLF ) CRLF
//! ```
//!
//! Each chunk is emitted as one [`PayloadItem::Chunk`] once all of its data
//! arrived. Trailer fields, if any, are emitted as [`PayloadItem::Trailers`]
//! right before [`PayloadItem::Eof`].

use std::task::Poll;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;
use tracing::trace;
use ChunkedState::*;

use crate::codec::header::HeaderDecoder;
use crate::config::ParserConfig;
use crate::protocol::chars::{from_hex_string, is_field_value_char, is_space_or_tab};
use crate::protocol::{BodyError, Headers, ParseError, PayloadItem};

/// Longest accepted chunk size, in hex digits.
const MAX_HEX_DIGITS: usize = 16;

/// The size line of the chunk being read.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkHeader {
    pub size: u64,
    pub hex_size: String,
    pub extension: String,
}

/// The terminating zero-size chunk and the trailer fields following it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastChunk {
    pub extension: String,
    pub trailers: Headers,
}

#[derive(Debug, Clone)]
pub struct ChunkedDecoder {
    config: ParserConfig,
    state: ChunkedState,
    header: ChunkHeader,
    last_chunk: Option<LastChunk>,
    line_length: usize,
    ws_seen: usize,
    trailer_decoder: HeaderDecoder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Skip whitespace before the chunk size
    SizeLs,
    /// Read the chunk size in hex
    Size,
    /// Whitespace after the size
    SizeWs,
    /// Whitespace after `;`
    ExtensionLs,
    /// Read the chunk extension
    Extension,
    /// Read LF after the size line
    SizeLf,
    /// Read chunk data
    Data,
    /// Read CR after chunk data
    DataCr,
    /// Read LF after chunk data
    DataLf,
    /// Read the trailer block after the last chunk
    Trailers,
    /// Final state after reading last chunk
    End,
}

macro_rules! try_next_byte {
    ($self:ident, $src:ident) => {{
        if $src.is_empty() {
            return Poll::Pending;
        }
        $self.line_length += 1;
        if $self.line_length > $self.config.max_line_length {
            return Poll::Ready(Err(ParseError::line_too_long($self.config.max_line_length)));
        }
        $src.get_u8()
    }};
}

impl ChunkedDecoder {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            state: SizeLs,
            header: ChunkHeader::default(),
            last_chunk: None,
            line_length: 0,
            ws_seen: 0,
            trailer_decoder: HeaderDecoder::new(config),
        }
    }

    /// The size line of the most recent chunk.
    pub fn chunk_header(&self) -> &ChunkHeader {
        &self.header
    }

    /// The last chunk, once it has been read completely.
    pub fn last_chunk(&self) -> Option<&LastChunk> {
        self.last_chunk.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.state == End
    }

    fn step(&mut self, src: &mut BytesMut, item: &mut Option<PayloadItem>) -> Poll<Result<ChunkedState, ParseError>> {
        match self.state {
            SizeLs => self.read_size_ls(src),
            Size => self.read_size(src),
            SizeWs => self.read_size_ws(src),
            ExtensionLs => self.read_extension_ls(src),
            Extension => self.read_extension(src),
            SizeLf => self.read_size_lf(src),
            Data => self.read_data(src, item),
            DataCr => self.read_data_cr(src),
            DataLf => self.read_data_lf(src),
            Trailers => self.read_trailers(src, item),
            End => Poll::Ready(Ok(End)),
        }
    }

    fn count_whitespace(&mut self) -> Result<(), ParseError> {
        self.ws_seen += 1;
        if self.ws_seen > self.config.max_whitespace {
            return Err(ParseError::too_much_whitespace(self.config.max_whitespace));
        }
        Ok(())
    }

    /// Handles the `CR` or `LF` ending a size line.
    fn end_of_size_line(&mut self, c: u8) -> Poll<Result<ChunkedState, ParseError>> {
        match c {
            b'\r' => Poll::Ready(Ok(SizeLf)),
            _ if self.config.strict_crlf => Poll::Ready(Err(ParseError::BareLf)),
            _ => Poll::Ready(self.finish_size_line()),
        }
    }

    fn read_size_ls(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            c if is_space_or_tab(c) => Poll::Ready(self.count_whitespace().map(|_| SizeLs)),
            c if c.is_ascii_hexdigit() => {
                self.header.hex_size.push(c as char);
                Poll::Ready(Ok(Size))
            }
            c => Poll::Ready(Err(ParseError::invalid_chunk_size(format!("unexpected byte {c:#04x}")))),
        }
    }

    fn read_size(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            c if c.is_ascii_hexdigit() => {
                self.header.hex_size.push(c as char);
                if self.header.hex_size.len() > MAX_HEX_DIGITS {
                    return Poll::Ready(Err(ParseError::invalid_chunk_size("chunk size overflow")));
                }
                Poll::Ready(Ok(Size))
            }
            c if is_space_or_tab(c) => Poll::Ready(self.count_whitespace().map(|_| SizeWs)),
            b';' => Poll::Ready(Ok(ExtensionLs)),
            c @ (b'\r' | b'\n') => self.end_of_size_line(c),
            c => Poll::Ready(Err(ParseError::invalid_chunk_size(format!("unexpected byte {c:#04x}")))),
        }
    }

    fn read_size_ws(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            // whitespace can follow the chunk size, but no more digits can come
            c if is_space_or_tab(c) => Poll::Ready(self.count_whitespace().map(|_| SizeWs)),
            b';' => Poll::Ready(Ok(ExtensionLs)),
            c @ (b'\r' | b'\n') => self.end_of_size_line(c),
            _ => Poll::Ready(Err(ParseError::invalid_chunk_size("invalid whitespace after chunk size"))),
        }
    }

    fn read_extension_ls(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            c if is_space_or_tab(c) => Poll::Ready(self.count_whitespace().map(|_| ExtensionLs)),
            c @ (b'\r' | b'\n') => self.end_of_size_line(c),
            c if is_field_value_char(c) => {
                self.header.extension.push(c as char);
                Poll::Ready(Ok(Extension))
            }
            c => Poll::Ready(Err(ParseError::invalid_character(c, "chunk extension"))),
        }
    }

    fn read_extension(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            c @ (b'\r' | b'\n') => self.end_of_size_line(c),
            c if is_field_value_char(c) => {
                self.header.extension.push(c as char);
                Poll::Ready(Ok(Extension))
            }
            c => Poll::Ready(Err(ParseError::invalid_character(c, "chunk extension"))),
        }
    }

    fn read_size_lf(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            b'\n' => Poll::Ready(self.finish_size_line()),
            c => Poll::Ready(Err(ParseError::invalid_character(c, "chunk size line end"))),
        }
    }

    fn finish_size_line(&mut self) -> Result<ChunkedState, ParseError> {
        self.line_length = 0;
        self.ws_seen = 0;

        let size = from_hex_string(&self.header.hex_size)
            .and_then(|size| u64::try_from(size).ok())
            .ok_or_else(|| ParseError::invalid_chunk_size(format!("invalid chunk size {:?}", self.header.hex_size)))?;

        if size > self.config.max_chunk_size {
            return Err(BodyError::bad_chunk(format!("chunk size {size} exceed the limit {}", self.config.max_chunk_size)).into());
        }

        self.header.size = size;
        trace!(size, extension = %self.header.extension, "read chunk size line");

        if size == 0 {
            self.last_chunk = None;
            Ok(Trailers)
        } else {
            Ok(Data)
        }
    }

    fn read_data(&mut self, src: &mut BytesMut, item: &mut Option<PayloadItem>) -> Poll<Result<ChunkedState, ParseError>> {
        // bounded by max_chunk_size
        let size = self.header.size as usize;
        if src.len() < size {
            src.reserve(size - src.len());
            return Poll::Pending;
        }

        *item = Some(PayloadItem::Chunk(src.split_to(size).freeze()));
        Poll::Ready(Ok(DataCr))
    }

    fn read_data_cr(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            b'\r' => Poll::Ready(Ok(DataLf)),
            b'\n' if !self.config.strict_crlf => Poll::Ready(Ok(self.next_chunk())),
            _ => Poll::Ready(Err(BodyError::bad_chunk("missing CRLF after chunk data").into())),
        }
    }

    fn read_data_lf(&mut self, src: &mut BytesMut) -> Poll<Result<ChunkedState, ParseError>> {
        match try_next_byte!(self, src) {
            b'\n' => Poll::Ready(Ok(self.next_chunk())),
            _ => Poll::Ready(Err(BodyError::bad_chunk("missing LF after chunk data").into())),
        }
    }

    fn next_chunk(&mut self) -> ChunkedState {
        self.header = ChunkHeader::default();
        self.line_length = 0;
        SizeLs
    }

    fn read_trailers(&mut self, src: &mut BytesMut, item: &mut Option<PayloadItem>) -> Poll<Result<ChunkedState, ParseError>> {
        match self.trailer_decoder.decode(src) {
            Ok(Some(trailers)) => {
                if !trailers.is_empty() {
                    *item = Some(PayloadItem::Trailers(trailers.clone()));
                }
                self.last_chunk = Some(LastChunk { extension: std::mem::take(&mut self.header.extension), trailers });
                Poll::Ready(Ok(End))
            }
            Ok(None) => Poll::Pending,
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    /// Decodes chunked transfer encoded data from the input buffer.
    ///
    /// # Returns
    /// - `Ok(Some(PayloadItem::Chunk(bytes)))` when a whole chunk was read
    /// - `Ok(Some(PayloadItem::Trailers(headers)))` when non-empty trailers were read
    /// - `Ok(Some(PayloadItem::Eof))` once the last chunk is processed
    /// - `Ok(None)` when more data is needed
    /// - `Err(ParseError)` if the chunked encoding is invalid
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            if self.state == End {
                trace!("finished reading chunked data");
                return Ok(Some(PayloadItem::Eof));
            }

            let mut item = None;

            self.state = match self.step(src, &mut item) {
                Poll::Pending => return Ok(None),
                Poll::Ready(Ok(new_state)) => new_state,
                Poll::Ready(Err(e)) => return Err(e),
            };

            if let Some(item) = item {
                return Ok(Some(item));
            }
        }
    }
}

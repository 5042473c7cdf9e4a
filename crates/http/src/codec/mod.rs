//! HTTP codec module for encoding and decoding HTTP messages
//!
//! This module provides streaming HTTP message processing built from small
//! resumable state machines. Every decoder consumes what it parsed from the
//! source buffer and keeps its position, so input may be split anywhere.
//!
//! # Architecture
//!
//! - Line and field parsers:
//!   - [`FieldLine`]: a single `name: value` header line
//!   - [`RequestLineDecoder`] and [`StatusLineDecoder`]: start lines
//!   - [`HeaderDecoder`]: a header block, also used for chunk trailers
//!   - [`ChunkedDecoder`]: chunked transfer coding
//!
//! - Server side:
//!   - [`RequestDecoder`]: decodes incoming requests
//!   - [`ResponseEncoder`]: encodes outgoing responses
//!
//! - Client side:
//!   - [`RequestEncoder`]: encodes outgoing requests
//!   - [`ResponseDecoder`]: decodes incoming responses
//!
//! All decoders and encoders implement the `tokio_util::codec` traits.

mod body;
mod field_line;
mod header;
mod line;
mod request_decoder;
mod request_encoder;
mod response_decoder;
mod response_encoder;

pub use body::{ChunkHeader, ChunkedDecoder, ChunkedEncoder, LastChunk, PayloadDecoder, PayloadEncoder, encode_chunk, encode_last_chunk};
pub use field_line::{FieldLine, FieldLineState};
pub use header::{HeaderDecoder, HeaderEncoder};
pub use line::{RequestLineDecoder, StatusLineDecoder};
pub use request_decoder::{RequestDecoder, request_payload_size};
pub use request_encoder::RequestEncoder;
pub use response_decoder::ResponseDecoder;
pub use response_encoder::ResponseEncoder;

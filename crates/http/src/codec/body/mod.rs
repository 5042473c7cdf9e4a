//! HTTP body handling module for processing request and response payloads
//!
//! # Components
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: chunked transfer coding, including extensions and trailers
//! - `LengthDecoder`: fixed-length payloads
//! - `UntilCloseDecoder`: payloads delimited by connection close
//! - [`PayloadDecoder`]: selects one of the above from a [`PayloadSize`](crate::protocol::PayloadSize)
//!
//! ## Encoders
//! - [`ChunkedEncoder`], [`encode_chunk`], [`encode_last_chunk`]: chunked transfer coding
//! - `LengthEncoder`: fixed-length payloads
//! - [`PayloadEncoder`]: selects one of the above

mod chunked_decoder;
mod chunked_encoder;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::{ChunkHeader, ChunkedDecoder, LastChunk};
pub use chunked_encoder::{ChunkedEncoder, encode_chunk, encode_last_chunk};
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;

//! Header block decoding and message head encoding
//!
//! - [`HeaderDecoder`]: decodes a header block into [`Headers`](crate::protocol::Headers),
//!   driving the field-line parser byte by byte; also used for chunk trailers
//! - [`HeaderEncoder`]: encodes request and response heads, adding the framing
//!   header for the body that follows

mod header_decoder;
mod header_encoder;

pub use header_decoder::HeaderDecoder;
pub use header_encoder::HeaderEncoder;
pub(crate) use header_encoder::FastWrite;

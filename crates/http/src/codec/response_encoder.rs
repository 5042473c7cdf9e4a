use std::io;
use std::io::ErrorKind;

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, ResponseHead, SendError};

/// Encodes a response head followed by its payload items.
///
/// The payload encoder is chosen from the [`PayloadSize`] sent with the head
/// and dropped once the body is finished, so the next head can follow.
pub struct ResponseEncoder {
    header_encoder: HeaderEncoder,
    payload_encoder: Option<PayloadEncoder>,
    omit_next_body: bool,
}

impl ResponseEncoder {
    pub fn new() -> Self {
        Default::default()
    }

    /// Writes the next head with its framing header but drops its body, as
    /// required when answering a HEAD request.
    pub fn omit_next_body(&mut self) {
        self.omit_next_body = true;
    }

    /// True when no body is pending and a new head may be encoded.
    pub fn is_idle(&self) -> bool {
        self.payload_encoder.is_none()
    }
}

impl Default for ResponseEncoder {
    fn default() -> Self {
        Self { header_encoder: HeaderEncoder, payload_encoder: None, omit_next_body: false }
    }
}

impl<D: Buf> Encoder<Message<(ResponseHead, PayloadSize), D>> for ResponseEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(ResponseHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive response head");
                    return Err(io::Error::from(ErrorKind::InvalidInput).into());
                }

                let omit_body = std::mem::take(&mut self.omit_next_body) || head.forbids_body();
                let payload_encoder = if omit_body { PayloadEncoder::empty() } else { PayloadEncoder::new(payload_size) };

                self.header_encoder.encode((head, payload_size), dst)?;
                if !payload_encoder.is_finish() {
                    self.payload_encoder = Some(payload_encoder);
                }
                Ok(())
            }

            Message::Payload(payload_item) => {
                let Some(payload_encoder) = &mut self.payload_encoder else {
                    // bodies of HEAD responses and empty bodies have no encoder
                    return Ok(());
                };

                let result = payload_encoder.encode(payload_item, dst);

                if payload_encoder.is_finish() || result.is_err() {
                    self.payload_encoder.take();
                }

                result
            }
        }
    }
}

use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;
use tracing::error;

use crate::codec::body::PayloadEncoder;
use crate::codec::header::HeaderEncoder;
use crate::protocol::{Message, PayloadSize, RequestHead, SendError};

/// Encodes a request head followed by its payload items, the client-side
/// counterpart of [`ResponseEncoder`](super::ResponseEncoder).
#[derive(Default)]
pub struct RequestEncoder {
    payload_encoder: Option<PayloadEncoder>,
}

impl RequestEncoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl<D: Buf> Encoder<Message<(RequestHead, PayloadSize), D>> for RequestEncoder {
    type Error = SendError;

    fn encode(&mut self, item: Message<(RequestHead, PayloadSize), D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            Message::Header((head, payload_size)) => {
                if self.payload_encoder.is_some() {
                    error!("expect payload item but receive request head");
                    return Err(SendError::invalid_body("previous request body not finished"));
                }
                HeaderEncoder.encode((head, payload_size), dst)?;
                if !payload_size.is_empty() {
                    self.payload_encoder = Some(PayloadEncoder::new(payload_size));
                }
                Ok(())
            }
            Message::Payload(item) => {
                let Some(encoder) = &mut self.payload_encoder else {
                    return Ok(());
                };
                let result = encoder.encode(item, dst);
                if encoder.is_finish() || result.is_err() {
                    self.payload_encoder = None;
                }
                result
            }
        }
    }
}

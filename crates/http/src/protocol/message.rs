use bytes::{Buf, Bytes};

use crate::protocol::Headers;

/// What a message decoder yields: the head once, then payload items until
/// [`PayloadItem::Eof`]. Encoders take the same sequence.
#[derive(Debug)]
pub enum Message<T, Data: Buf = Bytes> {
    Header(T),
    Payload(PayloadItem<Data>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadItem<Data: Buf = Bytes> {
    /// Body bytes; a chunked body yields one item per complete chunk.
    Chunk(Data),
    /// Trailer fields after the last chunk, always followed by `Eof`.
    Trailers(Headers),
    Eof,
}

/// How a body is delimited on the wire.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PayloadSize {
    Length(u64),
    Chunked,
    /// Runs until the peer closes; responses only.
    UntilClose,
    Empty,
}

impl PayloadSize {
    /// `Content-Length: 0` frames the same as no body at all.
    pub fn new_length(length: u64) -> Self {
        if length == 0 { PayloadSize::Empty } else { PayloadSize::Length(length) }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self, PayloadSize::Chunked)
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PayloadSize::Empty)
    }
}

impl<T, D: Buf> Message<T, D> {
    pub fn is_header(&self) -> bool {
        matches!(self, Message::Header(_))
    }

    pub fn into_payload_item(self) -> Option<PayloadItem<D>> {
        match self {
            Message::Header(_) => None,
            Message::Payload(item) => Some(item),
        }
    }
}

impl<D: Buf> PayloadItem<D> {
    pub fn is_eof(&self) -> bool {
        matches!(self, PayloadItem::Eof)
    }
}

impl PayloadItem {
    pub fn as_bytes(&self) -> Option<&Bytes> {
        if let PayloadItem::Chunk(bytes) = self { Some(bytes) } else { None }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        if let PayloadItem::Chunk(bytes) = self { Some(bytes) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_length_is_empty() {
        assert_eq!(PayloadSize::new_length(0), PayloadSize::Empty);
        assert_eq!(PayloadSize::new_length(3), PayloadSize::Length(3));
        assert!(!PayloadSize::UntilClose.is_empty());
    }

    #[test]
    fn payload_accessors() {
        let chunk = PayloadItem::Chunk(Bytes::from_static(b"abc"));
        assert_eq!(chunk.as_bytes(), Some(&Bytes::from_static(b"abc")));
        assert!(PayloadItem::<Bytes>::Eof.is_eof());
        assert_eq!(PayloadItem::Trailers(Headers::new()).into_bytes(), None);

        let message = Message::<(), Bytes>::Payload(chunk);
        assert!(!message.is_header());
        assert!(message.into_payload_item().is_some_and(|item| item.into_bytes().is_some()));
    }
}

//! Core HTTP protocol types.
//!
//! This module holds the message model shared by the parsers, encoders and
//! connection glue:
//!
//! - **Characters** ([`chars`]): byte classifiers and hex/decimal helpers
//! - **Header registry** ([`HeaderId`]): well-known field names in canonical
//!   and lowercase spelling
//! - **Header container** ([`Headers`]): case-insensitive field map with the
//!   derived framing queries
//! - **Messages** ([`Message`], [`PayloadItem`], [`PayloadSize`]): what the
//!   decoders yield
//! - **Requests** ([`RequestLine`], [`RequestHead`], [`Request`]) and
//!   **responses** ([`StatusLine`], [`ResponseHead`], [`Response`])
//! - **Errors** ([`HttpError`], [`ParseError`], [`SendError`], ...)

pub mod chars;

mod header_id;
pub use header_id::HeaderId;
pub use header_id::wire_name;

mod headers;
pub use headers::Headers;

mod message;
pub use message::Message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::Request;
pub use request::RequestHead;
pub use request::RequestLine;

mod response;
pub use response::Response;
pub use response::ResponseHead;
pub use response::StatusLine;

mod error;
pub use error::AuthError;
pub use error::BodyError;
pub use error::EncodeError;
pub use error::HttpError;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;
pub(crate) use error::is_disconnect_kind;

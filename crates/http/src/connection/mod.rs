//! Connection handling.
//!
//! Two layers live here:
//!
//! - [`Connection`]: owns a [`Transport`](crate::transport::Transport),
//!   buffers reads, serialises writes through a bounded send queue and reports
//!   [`ConnectionEvent`]s
//! - [`HttpConnection`]: consumes those events, parses requests, calls the
//!   [`Handler`](crate::handler::Handler) and queues the encoded responses,
//!   with keep-alive and `Expect: 100-continue` handling
//!
//! [`serve_connection`] wires both onto a transport in one call.

mod buffered;
mod http_connection;

pub use buffered::{Connection, ConnectionEvent, ConnectionHandle, ConnectionId, Open, WeakConnection};
pub use http_connection::{HttpConnection, serve_connection};

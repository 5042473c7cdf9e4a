//! Byte transports a [`Connection`](crate::connection::Connection) runs over.
//!
//! Every transport offers the same operations whether it is a plain TCP
//! stream, a TLS session or a UDP socket:
//!
//! - [`read`](LocalTransport::read) appends what arrived to a buffer
//! - [`write`](LocalTransport::write) sends a whole buffer
//! - [`connect`](LocalTransport::connect) opens the client side
//! - [`start`](LocalTransport::start) runs the server side handshake, a no-op
//!   without TLS
//! - [`shutdown`](LocalTransport::shutdown) and
//!   [`close`](LocalTransport::close) end the session gracefully or at once

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;

use crate::protocol::{TransportError, is_disconnect_kind};

mod stream;
pub use stream::StreamTransport;

mod tcp;
pub use tcp::TcpTransport;

#[cfg(feature = "tls")]
mod tls;
#[cfg(feature = "tls")]
pub use tls::{TlsConfig, TlsTransport, VerifyCallback, client_context, server_context};

mod udp;
pub use udp::{UdpOptions, UdpTransport};

#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    /// Reads into the spare capacity of `buf`. `Ok(0)` means the peer closed.
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize>;

    /// Writes all of `data`; a datagram transport sends it as one datagram.
    async fn write(&mut self, data: &[u8]) -> io::Result<()>;

    /// Opens the client side towards `host:port` and returns the peer address.
    async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, TransportError>;

    /// Completes the server side after accept.
    async fn start(&mut self) -> Result<(), TransportError>;

    async fn shutdown(&mut self) -> io::Result<()>;

    /// Drops the underlying socket without a graceful shutdown.
    fn close(&mut self);

    /// True for errors that mean the peer went away.
    fn is_disconnect(&self, error: &io::Error) -> bool {
        is_disconnect_kind(error.kind())
    }

    fn peer_addr(&self) -> Option<SocketAddr>;
}

pub(crate) fn not_connected() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "transport not connected")
}

pub(crate) async fn resolve(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    tokio::net::lookup_host((host, port)).await?.next().ok_or_else(|| {
        TransportError::from(io::Error::new(io::ErrorKind::AddrNotAvailable, format!("no address for {host}:{port}")))
    })
}

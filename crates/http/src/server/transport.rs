use std::io;
use std::net::SocketAddr;
#[cfg(feature = "tls")]
use std::sync::Arc;

use bytes::BytesMut;
#[cfg(feature = "tls")]
use openssl::ssl::SslAcceptor;
use tokio::net::TcpStream;

use crate::protocol::TransportError;
#[cfg(feature = "tls")]
use crate::transport::TlsTransport;
use crate::transport::{TcpTransport, Transport};

/// Turns accepted streams into transports.
#[derive(Clone)]
pub(crate) enum Acceptor {
    Tcp,
    #[cfg(feature = "tls")]
    Tls(Arc<SslAcceptor>),
}

impl Acceptor {
    pub(crate) fn wrap(&self, stream: TcpStream) -> ServerTransport {
        match self {
            Acceptor::Tcp => ServerTransport::Tcp(TcpTransport::from_stream(stream)),
            #[cfg(feature = "tls")]
            Acceptor::Tls(acceptor) => ServerTransport::Tls(TlsTransport::server(stream, Arc::clone(acceptor))),
        }
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Acceptor::Tcp => "tcp",
            #[cfg(feature = "tls")]
            Acceptor::Tls(_) => "tls",
        }
    }
}

/// The transport of a connection accepted by a [`Server`](super::Server).
#[derive(Debug)]
pub enum ServerTransport {
    Tcp(TcpTransport),
    #[cfg(feature = "tls")]
    Tls(TlsTransport),
}

macro_rules! delegate {
    ($self:ident, $t:ident => $call:expr) => {
        match $self {
            ServerTransport::Tcp($t) => $call,
            #[cfg(feature = "tls")]
            ServerTransport::Tls($t) => $call,
        }
    };
}

impl Transport for ServerTransport {
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        delegate!(self, t => t.read(buf).await)
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        delegate!(self, t => t.write(data).await)
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, TransportError> {
        delegate!(self, t => t.connect(host, port).await)
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        delegate!(self, t => t.start().await)
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        delegate!(self, t => t.shutdown().await)
    }

    fn close(&mut self) {
        delegate!(self, t => t.close())
    }

    fn is_disconnect(&self, error: &io::Error) -> bool {
        delegate!(self, t => t.is_disconnect(error))
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        delegate!(self, t => t.peer_addr())
    }
}

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

use crate::protocol::TransportError;
use crate::transport::{Transport, not_connected, resolve};

/// A plain TCP stream.
#[derive(Debug, Default)]
pub struct TcpTransport {
    stream: Option<TcpStream>,
    no_delay: bool,
}

impl TcpTransport {
    /// An unconnected transport for the client side.
    pub fn new() -> Self {
        Self { stream: None, no_delay: true }
    }

    /// Wraps an accepted stream.
    pub fn from_stream(stream: TcpStream) -> Self {
        Self { stream: Some(stream), no_delay: true }
    }

    pub fn set_no_delay(&mut self, no_delay: bool) -> io::Result<()> {
        self.no_delay = no_delay;
        match &self.stream {
            Some(stream) => stream.set_nodelay(no_delay),
            None => Ok(()),
        }
    }

    pub fn into_inner(self) -> Option<TcpStream> {
        self.stream
    }
}

impl Transport for TcpTransport {
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.read_buf(buf).await
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.write_all(data).await
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, TransportError> {
        let addr = resolve(host, port).await?;
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(self.no_delay)?;
        debug!(peer = %addr, "tcp connected");
        self.stream = Some(stream);
        Ok(addr)
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        match self.stream {
            Some(_) => Ok(()),
            None => Err(TransportError::NotConnected),
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match self.stream.as_mut() {
            Some(stream) => stream.shutdown().await,
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        self.stream = None;
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref()?.peer_addr().ok()
    }
}

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::TransportError;
use crate::transport::{Transport, not_connected};

/// Any already-open byte stream, such as one half of [`tokio::io::duplex`].
///
/// The stream is opened by whoever creates it, so `connect` is refused.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: Option<S>,
}

impl<S> StreamTransport<S> {
    pub fn new(stream: S) -> Self {
        Self { stream: Some(stream) }
    }
}

impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        self.stream.as_mut().ok_or_else(not_connected)?.read_buf(buf).await
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.as_mut().ok_or_else(not_connected)?.write_all(data).await
    }

    async fn connect(&mut self, _host: &str, _port: u16) -> Result<SocketAddr, TransportError> {
        Err(TransportError::NotConnected)
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        Ok(())
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
        None
    }
}

//! HTTP/1.1 client over a buffered connection.
//!
//! An [`HttpClient`] opens a [`Transport`] as a client, writes requests with
//! the [`RequestEncoder`] and reads answers back through the
//! [`ResponseDecoder`]. One request is in flight at a time, so responses come
//! back in the order requests were sent. Interim `1xx` responses are skipped.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use http::Method;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use crate::codec::{RequestEncoder, ResponseDecoder};
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionEvent, ConnectionHandle, Open};
use crate::protocol::{
    HeaderId, Headers, HttpError, Message, ParseError, PayloadItem, PayloadSize, RequestHead, Response, ResponseHead,
    SendError, TransportError,
};
use crate::transport::Transport;

pub struct HttpClient {
    connection: ConnectionHandle,
    events: UnboundedReceiver<ConnectionEvent>,
    host: String,
    peer: Option<SocketAddr>,
    encoder: RequestEncoder,
    decoder: ResponseDecoder,
    rx: BytesMut,
    disconnected: bool,
}

/// A response being assembled from decoded messages.
struct Incoming {
    head: ResponseHead,
    body: BytesMut,
    trailers: Headers,
}

impl HttpClient {
    /// Connects `transport` to `host:port`, running the TLS handshake if the
    /// transport has one.
    pub async fn connect<T>(transport: T, host: &str, port: u16, config: ClientConfig) -> Result<Self, HttpError>
    where
        T: Transport + 'static,
    {
        let authority = if port == 80 || port == 443 { host.to_string() } else { format!("{host}:{port}") };
        Self::open(transport, Open::Connect { host: host.to_string(), port }, authority, config).await
    }

    /// Uses a transport whose stream is already connected, such as an
    /// in-memory pipe. `host` is sent as the `Host` header.
    pub async fn attach<T>(transport: T, host: &str, config: ClientConfig) -> Result<Self, HttpError>
    where
        T: Transport + 'static,
    {
        Self::open(transport, Open::Accepted, host.to_string(), config).await
    }

    async fn open<T>(transport: T, open: Open, host: String, config: ClientConfig) -> Result<Self, HttpError>
    where
        T: Transport + 'static,
    {
        let (connection, handle, mut events) = Connection::new(transport, config.connection);
        connection.spawn(open);

        let peer = loop {
            match events.recv().await {
                Some(ConnectionEvent::Connected(peer)) => break peer,
                Some(ConnectionEvent::Error(e)) => return Err(e.into()),
                Some(ConnectionEvent::Disconnected) | None => return Err(TransportError::NotConnected.into()),
                Some(_) => {}
            }
        };
        debug!(connection = %handle.id(), ?peer, host = %host, "client connected");

        Ok(Self {
            connection: handle,
            events,
            host,
            peer,
            encoder: RequestEncoder::new(),
            decoder: ResponseDecoder::new(config.parser),
            rx: BytesMut::with_capacity(config.connection.rx_buffer_size),
            disconnected: false,
        })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.disconnected || self.connection.is_closed()
    }

    pub async fn get(&mut self, uri: &str) -> Result<Response<Bytes>, HttpError> {
        self.send(RequestHead::new(Method::GET, uri), Bytes::new()).await
    }

    /// Sends one request and waits for its final response.
    ///
    /// A `Host` header is added when `head` has none. A non-empty `body` is
    /// sent with a `Content-Length`.
    pub async fn send(&mut self, mut head: RequestHead, body: Bytes) -> Result<Response<Bytes>, HttpError> {
        if self.disconnected {
            return Err(SendError::Closed.into());
        }
        if !head.headers().contains(HeaderId::Host.lowercase_name()) {
            head.headers_mut().insert_id(HeaderId::Host, self.host.clone());
        }

        let method = head.method().clone();
        let payload_size = PayloadSize::new_length(body.len() as u64);
        trace!(connection = %self.connection.id(), %method, uri = head.uri(), "sending request");

        let mut buf = BytesMut::new();
        self.encoder.encode(Message::<_, Bytes>::Header((head, payload_size)), &mut buf)?;
        if !payload_size.is_empty() {
            self.encoder.encode(Message::<(RequestHead, PayloadSize), _>::Payload(PayloadItem::Chunk(body)), &mut buf)?;
            self.encoder.encode(Message::<(RequestHead, PayloadSize), Bytes>::Payload(PayloadItem::Eof), &mut buf)?;
        }
        self.connection.send_data_wait(buf.freeze()).await?;

        self.decoder.expect_response_to(&method);
        self.receive().await
    }

    /// Closes the connection after queued requests are written.
    pub fn shutdown(&self) {
        self.connection.shutdown();
    }

    pub fn close(&self) {
        self.connection.close();
    }

    async fn receive(&mut self) -> Result<Response<Bytes>, HttpError> {
        let mut incoming = None;

        loop {
            while let Some(message) = self.decoder.decode(&mut self.rx)? {
                if let Some(response) = Self::assemble(&mut incoming, message) {
                    return Ok(response);
                }
            }

            match self.events.recv().await {
                Some(ConnectionEvent::Received(data)) => self.rx.extend_from_slice(&data),
                Some(ConnectionEvent::Error(e)) => {
                    self.disconnected = true;
                    return Err(e.into());
                }
                Some(ConnectionEvent::Disconnected) | None => {
                    self.disconnected = true;
                    return self.receive_eof(incoming);
                }
                Some(_) => {}
            }
        }
    }

    fn receive_eof(&mut self, mut incoming: Option<Incoming>) -> Result<Response<Bytes>, HttpError> {
        while let Some(message) = self.decoder.decode_eof(&mut self.rx)? {
            if let Some(response) = Self::assemble(&mut incoming, message) {
                return Ok(response);
            }
        }
        debug!(connection = %self.connection.id(), "connection closed before a response");
        Err(ParseError::io(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "connection closed before a response"))
            .into())
    }

    fn assemble(incoming: &mut Option<Incoming>, message: Message<(ResponseHead, PayloadSize)>) -> Option<Response<Bytes>> {
        match message {
            Message::Header((head, _)) if head.status().is_informational() => {
                trace!(status = %head.status(), "skipping interim response");
                None
            }
            Message::Header((head, payload_size)) if payload_size.is_empty() => {
                Some(Response::from_parts(head, Bytes::new(), Headers::new()))
            }
            Message::Header((head, _)) => {
                *incoming = Some(Incoming { head, body: BytesMut::new(), trailers: Headers::new() });
                None
            }
            Message::Payload(item) => {
                let current = incoming.as_mut()?;
                match item {
                    PayloadItem::Chunk(data) => current.body.extend_from_slice(&data),
                    PayloadItem::Trailers(trailers) => current.trailers = trailers,
                    PayloadItem::Eof => {
                        let Incoming { head, body, trailers } = incoming.take()?;
                        return Some(Response::from_parts(head, body.freeze(), trailers));
                    }
                }
                None
            }
        }
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("connection", &self.connection.id())
            .field("host", &self.host)
            .field("peer", &self.peer)
            .finish()
    }
}

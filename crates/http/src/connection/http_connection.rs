use std::error::Error;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::FutureExt;
use http::{Method, StatusCode, Version};
use http_body::Body;
use http_body_util::BodyExt;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, error, info, trace, warn};

use crate::SERVER_NAME;
use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::config::{ParserConfig, ServerConfig};
use crate::connection::{Connection, ConnectionEvent, ConnectionHandle, Open, WeakConnection};
use crate::date::DateService;
use crate::handler::Handler;
use crate::protocol::{
    BodyError, HeaderId, Headers, HttpError, Message, ParseError, PayloadItem, PayloadSize, Request, RequestHead,
    Response, SendError,
};
use crate::transport::Transport;

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

/// Response bytes are handed to the connection once this much is buffered.
const FLUSH_THRESHOLD: usize = 16 * 1024;

/// Drives one HTTP/1.x conversation over a [`Connection`].
///
/// Received bytes are appended to a buffer and fed to a [`RequestDecoder`].
/// Once a request is complete, body and trailers included, it is handed to
/// the [`Handler`] and the response is encoded back onto the connection.
/// Requests on a persistent connection are answered one at a time, in order.
pub struct HttpConnection<H> {
    connection: WeakConnection,
    events: UnboundedReceiver<ConnectionEvent>,
    handler: Arc<H>,
    parser: ParserConfig,
    aggregate_chunks: bool,
    decoder: RequestDecoder,
    encoder: ResponseEncoder,
    rx: BytesMut,
    pending: Option<PendingRequest>,
    closing: bool,
}

struct PendingRequest {
    head: RequestHead,
    body: BytesMut,
    trailers: Headers,
    streamed: bool,
}

/// What a response must follow from the request it answers.
#[derive(Clone, Copy)]
struct Exchange {
    version: Version,
    keep_alive: bool,
    head_request: bool,
}

impl Exchange {
    fn closing(version: Version) -> Self {
        Self { version, keep_alive: false, head_request: false }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Close,
}

/// Spawns `transport` as a connection with an HTTP conversation on top.
///
/// The returned task ends after the connection reports it is disconnected.
pub fn serve_connection<T, H>(
    transport: T,
    handler: Arc<H>,
    config: &ServerConfig,
) -> (ConnectionHandle, JoinHandle<Result<(), HttpError>>)
where
    T: Transport + 'static,
    H: Handler + 'static,
    H::RespBody: 'static,
    <H::RespBody as Body>::Data: Send,
    <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>> + Send,
{
    let (connection, handle, events) = Connection::new(transport, config.connection);
    connection.spawn(Open::Accepted);
    let http = HttpConnection::new(handle.downgrade(), events, handler, config);
    (handle, tokio::spawn(http.process()))
}

impl<H> HttpConnection<H>
where
    H: Handler,
    <H::RespBody as Body>::Data: Send,
    <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>>,
{
    pub fn new(
        connection: WeakConnection,
        events: UnboundedReceiver<ConnectionEvent>,
        handler: Arc<H>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            connection,
            events,
            handler,
            parser: config.parser,
            aggregate_chunks: config.aggregate_chunks,
            decoder: RequestDecoder::new(config.parser),
            encoder: ResponseEncoder::new(),
            rx: BytesMut::with_capacity(config.connection.rx_buffer_size),
            pending: None,
            closing: false,
        }
    }

    pub async fn process(mut self) -> Result<(), HttpError> {
        let mut failure = None;

        while let Some(event) = self.events.recv().await {
            match event {
                ConnectionEvent::Connected(peer) => debug!(peer = ?peer, "http connection established"),

                ConnectionEvent::Received(bytes) => {
                    if self.closing {
                        trace!(size = bytes.len(), "dropping bytes received after close");
                        continue;
                    }
                    self.rx.extend_from_slice(&bytes);
                    match self.drive().await {
                        Ok(Flow::Continue) => {}
                        Ok(Flow::Close) => self.shutdown(),
                        Err(e) => {
                            error!(cause = %e, "http connection failed");
                            self.closing = true;
                            if let Some(connection) = self.connection.upgrade() {
                                connection.close();
                            }
                            failure = Some(e);
                        }
                    }
                }

                ConnectionEvent::Sent(size) => trace!(size, "response bytes written"),

                ConnectionEvent::ReceiveTimedOut => {
                    if self.pending.is_some() || !self.decoder.is_idle() {
                        warn!("timed out waiting for the rest of a request");
                    } else {
                        debug!("idle connection timed out");
                    }
                    self.shutdown();
                }

                ConnectionEvent::Error(e) => {
                    error!(cause = %e, "transport error");
                    failure = Some(e.into());
                }

                ConnectionEvent::Disconnected => {
                    info!("finished process, connection shutdown");
                    break;
                }
            }
        }

        failure.map_or(Ok(()), Err)
    }

    fn shutdown(&mut self) {
        self.closing = true;
        if let Some(connection) = self.connection.upgrade() {
            connection.shutdown();
        }
    }

    /// Queues `data`, waiting while the send queue is full.
    async fn send(&self, data: Bytes) -> Result<(), SendError> {
        let connection = self.connection.upgrade().ok_or(SendError::Closed)?;
        connection.send_data_wait(data).await
    }

    async fn drive(&mut self) -> Result<Flow, HttpError> {
        loop {
            let message = match self.decoder.decode(&mut self.rx) {
                Ok(Some(message)) => message,
                Ok(None) => return Ok(Flow::Continue),
                Err(e) => return self.reject(&e).await,
            };

            let flow = match message {
                Message::Header((head, payload_size)) => self.on_head(head, payload_size).await?,
                Message::Payload(item) => self.on_payload(item).await?,
            };
            if flow == Flow::Close {
                return Ok(Flow::Close);
            }
        }
    }

    async fn reject(&mut self, e: &ParseError) -> Result<Flow, HttpError> {
        warn!(cause = %e, "can't parse request");
        self.pending = None;
        let response = Response::with_status(e.status_code());
        self.send_response(response, Exchange::closing(Version::HTTP_11)).await?;
        Ok(Flow::Close)
    }

    async fn on_head(&mut self, head: RequestHead, payload_size: PayloadSize) -> Result<Flow, HttpError> {
        debug!(method = %head.method(), uri = head.uri(), ?payload_size, "received request head");

        // HTTP/1.0 peers never get an interim response
        if head.headers().expect_continue() && !payload_size.is_empty() && head.version() == Version::HTTP_11 {
            if let Some(response) = self.handler.expect_continue(&head).await {
                info!(uri = head.uri(), "answering before the request body");
                self.send_response(response, Exchange::closing(head.version())).await?;
                return Ok(Flow::Close);
            }
            self.send(Bytes::from_static(CONTINUE)).await?;
            info!("receive expect request header, sent continue response");
        }

        self.pending = Some(PendingRequest {
            head,
            body: BytesMut::new(),
            trailers: Headers::new(),
            streamed: payload_size.is_chunked() && !self.aggregate_chunks,
        });

        if payload_size.is_empty() { self.dispatch().await } else { Ok(Flow::Continue) }
    }

    async fn on_payload(&mut self, item: PayloadItem) -> Result<Flow, HttpError> {
        let Some(pending) = self.pending.as_mut() else {
            warn!("payload without a request head");
            return Ok(Flow::Continue);
        };

        match item {
            PayloadItem::Chunk(bytes) if pending.streamed => {
                self.handler.on_chunk(&pending.head, bytes).await;
            }
            PayloadItem::Chunk(bytes) => {
                let size = (pending.body.len() + bytes.len()) as u64;
                if size > self.parser.max_body_size {
                    let e = ParseError::from(BodyError::oversize(size, self.parser.max_body_size));
                    return self.reject(&e).await;
                }
                pending.body.extend_from_slice(&bytes);
            }
            PayloadItem::Trailers(trailers) => pending.trailers = trailers,
            PayloadItem::Eof => return self.dispatch().await,
        }
        Ok(Flow::Continue)
    }

    async fn dispatch(&mut self) -> Result<Flow, HttpError> {
        let Some(pending) = self.pending.take() else {
            return Ok(Flow::Continue);
        };

        let exchange = Exchange {
            version: pending.head.version(),
            keep_alive: pending.head.keep_alive(),
            head_request: pending.head.method() == Method::HEAD,
        };
        let request = Request::from_parts(pending.head, pending.body.freeze(), pending.trailers);

        let result = AssertUnwindSafe(self.handler.call(request)).catch_unwind().await;
        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                let e: Box<dyn Error + Send + Sync> = e.into();
                error!(cause = %e, "handle response error");
                return self.internal_error(exchange.version).await;
            }
            Err(_) => {
                error!("request handler panicked");
                return self.internal_error(exchange.version).await;
            }
        };

        match self.send_response(response, exchange).await {
            Ok(true) => Ok(Flow::Close),
            Ok(false) => Ok(Flow::Continue),
            Err(HttpError::ResponseError { source: SendError::Encode { source } }) => {
                error!(cause = %source, "can't encode response");
                self.internal_error(exchange.version).await
            }
            Err(e) => Err(e),
        }
    }

    async fn internal_error(&mut self, version: Version) -> Result<Flow, HttpError> {
        let response = Response::with_status(StatusCode::INTERNAL_SERVER_ERROR);
        self.send_response(response, Exchange::closing(version)).await?;
        Ok(Flow::Close)
    }

    /// Encodes and queues a response; returns whether the connection must
    /// close afterwards.
    async fn send_response<B>(&mut self, response: Response<B>, exchange: Exchange) -> Result<bool, HttpError>
    where
        B: Body,
        B::Error: Into<Box<dyn Error + Send + Sync>>,
    {
        let (mut head, body, trailers) = response.into_parts();
        head.line.version = exchange.version;

        let mut payload_size = match body.size_hint().exact() {
            Some(0) => PayloadSize::Empty,
            Some(length) => PayloadSize::Length(length),
            None => PayloadSize::Chunked,
        };
        let mut keep_alive = exchange.keep_alive && !head.headers().close_connection();
        if payload_size.is_chunked() && exchange.version == Version::HTTP_10 {
            // no chunked coding for HTTP/1.0 peers
            payload_size = PayloadSize::UntilClose;
            keep_alive = false;
        }

        let headers = head.headers_mut();
        headers.insert_id(HeaderId::Date, DateService::get_global_instance().http_date_string());
        if !headers.contains(HeaderId::Server.lowercase_name()) {
            headers.insert_id(HeaderId::Server, SERVER_NAME);
        }
        if !keep_alive {
            headers.insert_id(HeaderId::Connection, "close");
        } else if exchange.version == Version::HTTP_10 {
            headers.insert_id(HeaderId::Connection, "keep-alive");
        }

        if exchange.head_request {
            self.encoder.omit_next_body();
        }
        let status = head.status();
        let mut dst = BytesMut::new();
        self.encoder.encode(Message::<_, B::Data>::Header((head, payload_size)), &mut dst)?;

        let mut body = pin!(body);
        loop {
            match body.as_mut().frame().await {
                Some(Ok(frame)) => match frame.into_data() {
                    Ok(data) => self.encoder.encode(Message::Payload(PayloadItem::Chunk(data)), &mut dst)?,
                    Err(frame) => {
                        if let Ok(map) = frame.into_trailers() {
                            let trailers = map
                                .iter()
                                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?)))
                                .collect::<Headers>();
                            self.encoder.encode(Message::<_, B::Data>::Payload(PayloadItem::Trailers(trailers)), &mut dst)?;
                        }
                    }
                },
                Some(Err(e)) => {
                    let e: Box<dyn Error + Send + Sync> = e.into();
                    error!(cause = %e, "resolve response body error");
                    if !dst.is_empty() {
                        self.send(dst.split().freeze()).await?;
                    }
                    return Err(SendError::invalid_body(e).into());
                }
                None => break,
            }
            if dst.len() >= FLUSH_THRESHOLD {
                self.send(dst.split().freeze()).await?;
            }
        }

        if !trailers.is_empty() {
            self.encoder.encode(Message::<_, B::Data>::Payload(PayloadItem::Trailers(trailers)), &mut dst)?;
        }
        self.encoder.encode(Message::<_, B::Data>::Payload(PayloadItem::Eof), &mut dst)?;
        self.send(dst.freeze()).await?;

        debug!(%status, keep_alive, "response queued");
        Ok(!keep_alive)
    }
}

impl<H> std::fmt::Debug for HttpConnection<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection")
            .field("buffered", &self.rx.len())
            .field("pending", &self.pending.as_ref().map(|p| p.head.uri().to_string()))
            .field("closing", &self.closing)
            .finish()
    }
}

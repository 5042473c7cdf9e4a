//! TCP and TLS server.
//!
//! A [`Server`] owns the listening socket and the set of live connections.
//! Every accepted stream gets its socket options applied, becomes a
//! [`Connection`] whose handshake runs inside the connection task, and is
//! registered until it reports [`ConnectionEvent::Disconnected`]. Accept is
//! re-armed immediately.
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! use http::StatusCode;
//! use wicket_http::config::ServerConfig;
//! use wicket_http::handler::make_handler;
//! use wicket_http::protocol::{Request, Response};
//! use wicket_http::server::Server;
//!
//! async fn hello(_: Request) -> Result<Response, Infallible> {
//!     Ok(Response::text(StatusCode::OK, "hi"))
//! }
//!
//! # async fn run() -> Result<(), wicket_http::protocol::TransportError> {
//! let server = Server::bind("127.0.0.1:8080", ServerConfig::default()).await?;
//! server.serve(Arc::new(make_handler(hello))).await;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use http_body::Body;
use tokio::net::{TcpListener, TcpSocket, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionEvent, ConnectionHandle, ConnectionId, HttpConnection, Open};
use crate::handler::Handler;
use crate::protocol::TransportError;

mod transport;
use transport::Acceptor;
pub use transport::ServerTransport;

type Registry = Arc<Mutex<HashMap<ConnectionId, ConnectionHandle>>>;

pub struct Server {
    listener: TcpListener,
    config: ServerConfig,
    acceptor: Acceptor,
    registry: Registry,
    shutdown: CancellationToken,
}

/// Stops a running [`Server`] from another task.
#[derive(Clone, Debug)]
pub struct ServerHandle {
    registry: Registry,
    shutdown: CancellationToken,
}

impl ServerHandle {
    /// Stops accepting and closes every live connection.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn connection_count(&self) -> usize {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn connections(&self) -> Vec<ConnectionHandle> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner).values().cloned().collect()
    }
}

impl Server {
    pub async fn bind(addr: impl ToSocketAddrs, config: ServerConfig) -> Result<Self, TransportError> {
        let addr = tokio::net::lookup_host(addr)
            .await?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::AddrNotAvailable, "no address to bind"))?;

        let socket = if addr.is_ipv4() { TcpSocket::new_v4()? } else { TcpSocket::new_v6()? };
        socket.set_reuseaddr(config.reuse_address)?;
        socket.bind(addr).inspect_err(|e| error!(cause = %e, "bind server error"))?;
        let listener = socket.listen(config.backlog)?;
        info!(address = %listener.local_addr()?, "start listening");

        Ok(Self {
            listener,
            config,
            acceptor: Acceptor::Tcp,
            registry: Arc::default(),
            shutdown: CancellationToken::new(),
        })
    }

    /// Performs a TLS server handshake on every accepted stream.
    #[cfg(feature = "tls")]
    pub fn with_tls(mut self, acceptor: openssl::ssl::SslAcceptor) -> Self {
        self.acceptor = Acceptor::Tls(Arc::new(acceptor));
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle { registry: Arc::clone(&self.registry), shutdown: self.shutdown.clone() }
    }

    /// Serves HTTP on every accepted connection until shut down.
    pub async fn serve<H>(self, handler: Arc<H>)
    where
        H: Handler + 'static,
        H::RespBody: 'static,
        <H::RespBody as Body>::Data: Send,
        <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>> + Send,
    {
        let config = self.config;
        self.accept_loop(move |handle, events, registry| {
            let http = HttpConnection::new(handle.downgrade(), events, Arc::clone(&handler), &config);
            let id = handle.id();
            tokio::spawn(async move {
                match http.process().await {
                    Ok(()) => debug!(connection = %id, "http connection finished"),
                    Err(e) => error!(connection = %id, cause = %e, "service has error, connection shutdown"),
                }
                unregister(&registry, id);
            });
        })
        .await;
    }

    /// Hands every connection event to `callback` instead of speaking HTTP.
    ///
    /// The callback runs on the connection's event task, in event order.
    pub async fn serve_events<F>(self, callback: F)
    where
        F: Fn(&ConnectionHandle, ConnectionEvent) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        self.accept_loop(move |handle, mut events, registry| {
            let callback = Arc::clone(&callback);
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    let disconnected = matches!(event, ConnectionEvent::Disconnected);
                    callback(&handle, event);
                    if disconnected {
                        break;
                    }
                }
                unregister(&registry, handle.id());
            });
        })
        .await;
    }

    async fn accept_loop<F>(self, mut on_connection: F)
    where
        F: FnMut(ConnectionHandle, tokio::sync::mpsc::UnboundedReceiver<ConnectionEvent>, Registry),
    {
        let kind = self.acceptor.name();
        loop {
            let accepted = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            let (stream, remote_addr) = match accepted {
                Ok(stream_and_addr) => stream_and_addr,
                Err(e) => {
                    warn!(cause = %e, "failed to accept");
                    continue;
                }
            };

            if let Err(e) = stream.set_nodelay(self.config.no_delay) {
                warn!(cause = %e, "failed to set TCP_NODELAY");
            }

            let transport = self.acceptor.wrap(stream);
            let (connection, handle, events) = Connection::new(transport, self.config.connection);
            debug!(connection = %handle.id(), remote = %remote_addr, kind, "accepted connection");

            self.registry.lock().unwrap_or_else(PoisonError::into_inner).insert(handle.id(), handle.clone());
            connection.spawn(Open::Accepted);
            on_connection(handle, events, Arc::clone(&self.registry));
        }

        let connections: Vec<ConnectionHandle> =
            self.registry.lock().unwrap_or_else(PoisonError::into_inner).drain().map(|(_, handle)| handle).collect();
        info!(connections = connections.len(), "server shutdown");
        for connection in connections {
            connection.close();
        }
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.listener.local_addr().ok())
            .field("acceptor", &self.acceptor.name())
            .finish()
    }
}

fn unregister(registry: &Registry, id: ConnectionId) {
    registry.lock().unwrap_or_else(PoisonError::into_inner).remove(&id);
    debug!(connection = %id, "connection removed");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    use super::*;

    #[tokio::test]
    async fn registry_follows_connections() {
        let server = Server::bind("127.0.0.1:0", ServerConfig::default()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();

        let serving = tokio::spawn(server.serve_events(|connection, event| {
            if let ConnectionEvent::Received(bytes) = event {
                let _ = connection.send_data(bytes);
            }
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"echo").await.unwrap();
        let mut buf = [0; 4];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"echo");
        assert_eq!(handle.connection_count(), 1);

        drop(client);
        for _ in 0..100 {
            if handle.connection_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(handle.connection_count(), 0);

        handle.shutdown();
        serving.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_closes_live_connections() {
        let server = Server::bind("127.0.0.1:0", ServerConfig::default()).await.unwrap();
        let addr = server.local_addr().unwrap();
        let handle = server.handle();
        let serving = tokio::spawn(server.serve_events(|_, _| {}));

        let mut client = TcpStream::connect(addr).await.unwrap();
        for _ in 0..100 {
            if handle.connection_count() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown();
        serving.await.unwrap();

        let mut rest = Vec::new();
        let read = tokio::time::timeout(Duration::from_secs(5), client.read_to_end(&mut rest)).await.unwrap();
        assert!(matches!(read, Ok(0) | Err(_)));
    }
}

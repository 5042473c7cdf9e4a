//! TLS over TCP with OpenSSL.
//!
//! The server side loads its certificate chain, private key and optional
//! Diffie-Hellman parameters from PEM files; the handshake runs in
//! [`start`](Transport::start) after accept. The client side handshakes inside
//! [`connect`](Transport::connect), optionally checking the peer with a
//! [`VerifyCallback`].

use std::fmt::Write;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use bytes::BytesMut;
use openssl::dh::Dh;
use openssl::pkey::PKey;
use openssl::ssl::{Ssl, SslAcceptor, SslConnector, SslMethod, SslOptions, SslVerifyMode};
use openssl::x509::X509NameRef;
use serde::Deserialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_openssl::SslStream;
use tracing::{debug, warn};

use crate::protocol::TransportError;
use crate::transport::{Transport, not_connected, resolve};

/// Receives the OpenSSL pre-verification result and the subject of the
/// certificate being checked, as `/C=../CN=..`; returns whether to accept it.
pub type VerifyCallback = Arc<dyn Fn(bool, &str) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub certificate_chain_file: PathBuf,
    pub private_key_file: PathBuf,
    /// Decrypts an encrypted private key.
    pub password: Option<String>,
    pub dh_file: Option<PathBuf>,
}

/// Builds the server context: SSLv2 and SSLv3 disabled, OpenSSL bug
/// workarounds on.
pub fn server_context(config: &TlsConfig) -> Result<SslAcceptor, TransportError> {
    let mut builder = SslAcceptor::mozilla_intermediate(SslMethod::tls()).map_err(TransportError::tls_handshake)?;
    builder.set_options(SslOptions::ALL | SslOptions::NO_SSLV2 | SslOptions::NO_SSLV3);

    builder.set_certificate_chain_file(&config.certificate_chain_file).map_err(TransportError::tls_handshake)?;

    let pem = std::fs::read(&config.private_key_file)?;
    let password = config.password.clone().unwrap_or_default();
    let key = PKey::private_key_from_pem_callback(&pem, |buf| {
        let len = password.len().min(buf.len());
        buf[..len].copy_from_slice(&password.as_bytes()[..len]);
        Ok(len)
    })
    .map_err(TransportError::tls_handshake)?;
    builder.set_private_key(&key).map_err(TransportError::tls_handshake)?;

    if let Some(dh_file) = &config.dh_file {
        let dh = Dh::params_from_pem(&std::fs::read(dh_file)?).map_err(TransportError::tls_handshake)?;
        builder.set_tmp_dh(&dh).map_err(TransportError::tls_handshake)?;
    }

    builder.check_private_key().map_err(TransportError::tls_handshake)?;
    Ok(builder.build())
}

/// Builds the client context. Without a callback the default chain and host
/// name checks apply.
pub fn client_context(verify: Option<VerifyCallback>) -> Result<SslConnector, TransportError> {
    let mut builder = SslConnector::builder(SslMethod::tls()).map_err(TransportError::tls_handshake)?;
    builder.set_options(SslOptions::ALL | SslOptions::NO_SSLV2 | SslOptions::NO_SSLV3);

    if let Some(verify) = verify {
        builder.set_verify_callback(SslVerifyMode::PEER, move |preverified, ctx| {
            let subject = ctx.current_cert().map(|cert| subject_line(cert.subject_name())).unwrap_or_default();
            verify(preverified, &subject)
        });
    }
    Ok(builder.build())
}

fn subject_line(name: &X509NameRef) -> String {
    let mut line = String::new();
    for entry in name.entries() {
        let key = entry.object().nid().short_name().unwrap_or("?");
        let value = String::from_utf8_lossy(entry.data().as_slice());
        let _ = write!(line, "/{key}={value}");
    }
    line
}

enum Session {
    Accepted(TcpStream, Arc<SslAcceptor>),
    Client(Arc<SslConnector>),
    Established(SslStream<TcpStream>),
    Closed,
}

pub struct TlsTransport {
    session: Session,
    peer: Option<SocketAddr>,
    verify_hostname: bool,
}

impl TlsTransport {
    /// Wraps an accepted stream; the handshake happens in `start`.
    pub fn server(stream: TcpStream, acceptor: Arc<SslAcceptor>) -> Self {
        let peer = stream.peer_addr().ok();
        Self { session: Session::Accepted(stream, acceptor), peer, verify_hostname: true }
    }

    pub fn client(connector: Arc<SslConnector>) -> Self {
        Self { session: Session::Client(connector), peer: None, verify_hostname: true }
    }

    /// Disables matching the certificate against the host passed to `connect`.
    pub fn verify_hostname(mut self, verify: bool) -> Self {
        self.verify_hostname = verify;
        self
    }

    fn stream(&mut self) -> io::Result<&mut SslStream<TcpStream>> {
        match &mut self.session {
            Session::Established(stream) => Ok(stream),
            _ => Err(not_connected()),
        }
    }
}

impl std::fmt::Debug for TlsTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.session {
            Session::Accepted(..) => "accepted",
            Session::Client(_) => "client",
            Session::Established(_) => "established",
            Session::Closed => "closed",
        };
        f.debug_struct("TlsTransport").field("session", &state).field("peer", &self.peer).finish()
    }
}

impl Transport for TlsTransport {
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        self.stream()?.read_buf(buf).await
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream()?.write_all(data).await
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, TransportError> {
        let Session::Client(connector) = &self.session else {
            return Err(TransportError::tls_handshake("transport is not a client"));
        };
        let connector = Arc::clone(connector);

        let addr = resolve(host, port).await?;
        let tcp = TcpStream::connect(addr).await?;
        tcp.set_nodelay(true)?;

        let mut config = connector.configure().map_err(TransportError::tls_handshake)?;
        config.set_verify_hostname(self.verify_hostname);
        let ssl = config.into_ssl(host).map_err(TransportError::tls_handshake)?;
        let mut stream = SslStream::new(ssl, tcp).map_err(TransportError::tls_handshake)?;
        Pin::new(&mut stream).connect().await.map_err(|e| {
            warn!(peer = %addr, cause = %e, "tls client handshake failed");
            TransportError::tls_handshake(e)
        })?;

        debug!(peer = %addr, "tls client handshake done");
        self.peer = Some(addr);
        self.session = Session::Established(stream);
        Ok(addr)
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        let (tcp, acceptor) = match std::mem::replace(&mut self.session, Session::Closed) {
            Session::Accepted(tcp, acceptor) => (tcp, acceptor),
            established @ Session::Established(_) => {
                self.session = established;
                return Ok(());
            }
            other => {
                self.session = other;
                return Err(TransportError::NotConnected);
            }
        };

        let ssl = Ssl::new(acceptor.context()).map_err(TransportError::tls_handshake)?;
        let mut stream = SslStream::new(ssl, tcp).map_err(TransportError::tls_handshake)?;
        Pin::new(&mut stream).accept().await.map_err(TransportError::tls_handshake)?;

        debug!(peer = ?self.peer, "tls server handshake done");
        self.session = Session::Established(stream);
        Ok(())
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        match &mut self.session {
            Session::Established(stream) => AsyncWriteExt::shutdown(stream).await,
            _ => Ok(()),
        }
    }

    fn close(&mut self) {
        self.session = Session::Closed;
    }

    fn is_disconnect(&self, error: &io::Error) -> bool {
        // a peer dropping TCP without close_notify surfaces as a protocol error
        crate::protocol::is_disconnect_kind(error.kind())
            || (error.kind() == io::ErrorKind::Other && error.to_string().contains("unexpected EOF"))
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }
}

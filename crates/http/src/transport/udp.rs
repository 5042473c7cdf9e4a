//! UDP sockets: unicast, multicast and broadcast.
//!
//! A connected transport reads and writes its single peer. A bound transport
//! receives from anyone and replies to whoever sent the last datagram. Each
//! read returns exactly one datagram.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::BytesMut;
use serde::Deserialize;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tracing::{debug, trace};

use crate::protocol::TransportError;
use crate::transport::{Transport, not_connected, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UdpOptions {
    pub reuse_address: bool,
    pub broadcast: bool,
    /// `None` keeps the operating system default.
    pub multicast_ttl: Option<u32>,
}

impl Default for UdpOptions {
    fn default() -> Self {
        Self { reuse_address: true, broadcast: false, multicast_ttl: None }
    }
}

#[derive(Debug)]
pub struct UdpTransport {
    socket: Option<UdpSocket>,
    options: UdpOptions,
    connected: bool,
    remote: Option<SocketAddr>,
}

impl UdpTransport {
    /// An unbound transport; `connect` binds an ephemeral port.
    pub fn new(options: UdpOptions) -> Self {
        Self { socket: None, options, connected: false, remote: None }
    }

    /// Listens on `addr` in bound mode.
    pub fn bind(addr: SocketAddr, options: UdpOptions) -> io::Result<Self> {
        let socket = open_socket(addr, &options)?;
        debug!(local = %addr, "udp socket bound");
        Ok(Self { socket: Some(socket), options, connected: false, remote: None })
    }

    /// Listens on `listen` and joins the IPv4 multicast `group` on `interface`.
    pub fn multicast_receiver(
        listen: SocketAddr,
        group: Ipv4Addr,
        interface: Ipv4Addr,
        options: UdpOptions,
    ) -> io::Result<Self> {
        let transport = Self::bind(listen, UdpOptions { reuse_address: true, ..options })?;
        if let Some(socket) = &transport.socket {
            socket.join_multicast_v4(group, interface)?;
            debug!(%group, %interface, "joined multicast group");
        }
        Ok(transport)
    }

    /// A sender bound to an ephemeral port that transmits to the broadcast
    /// address on `port`.
    pub fn broadcaster(port: u16, options: UdpOptions) -> io::Result<Self> {
        let mut transport =
            Self::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0), UdpOptions { broadcast: true, ..options })?;
        transport.remote = Some(SocketAddr::new(Ipv4Addr::BROADCAST.into(), port));
        Ok(transport)
    }

    pub fn set_multicast_ttl(&mut self, ttl: u32) -> io::Result<()> {
        self.options.multicast_ttl = Some(ttl);
        match &self.socket {
            Some(socket) => socket.set_multicast_ttl_v4(ttl),
            None => Ok(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Where the next write goes in bound mode.
    pub fn set_remote(&mut self, remote: SocketAddr) {
        self.remote = Some(remote);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref()?.local_addr().ok()
    }
}

fn open_socket(addr: SocketAddr, options: &UdpOptions) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(options.reuse_address)?;
    if options.broadcast {
        socket.set_broadcast(true)?;
    }
    if let Some(ttl) = options.multicast_ttl {
        socket.set_multicast_ttl_v4(ttl)?;
    }
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    UdpSocket::from_std(socket.into())
}

fn unspecified_for(addr: &SocketAddr) -> SocketAddr {
    let ip: IpAddr = if addr.is_ipv4() { Ipv4Addr::UNSPECIFIED.into() } else { Ipv6Addr::UNSPECIFIED.into() };
    SocketAddr::new(ip, 0)
}

impl Transport for UdpTransport {
    async fn read(&mut self, buf: &mut BytesMut) -> io::Result<usize> {
        let socket = self.socket.as_ref().ok_or_else(not_connected)?;
        if self.connected {
            return socket.recv_buf(buf).await;
        }
        let (n, from) = socket.recv_buf_from(buf).await?;
        trace!(%from, size = n, "udp datagram received");
        self.remote = Some(from);
        Ok(n)
    }

    async fn write(&mut self, data: &[u8]) -> io::Result<()> {
        let socket = self.socket.as_ref().ok_or_else(not_connected)?;
        let sent = if self.connected {
            socket.send(data).await?
        } else {
            let remote = self.remote.ok_or_else(not_connected)?;
            socket.send_to(data, remote).await?
        };
        if sent < data.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "datagram truncated"));
        }
        Ok(())
    }

    async fn connect(&mut self, host: &str, port: u16) -> Result<SocketAddr, TransportError> {
        let addr = resolve(host, port).await?;
        if self.socket.is_none() {
            self.socket = Some(open_socket(unspecified_for(&addr), &self.options)?);
        }
        let socket = self.socket.as_ref().ok_or(TransportError::NotConnected)?;
        socket.connect(addr).await?;

        debug!(peer = %addr, "udp connected");
        self.connected = true;
        self.remote = Some(addr);
        Ok(addr)
    }

    async fn start(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.close();
        Ok(())
    }

    fn close(&mut self) {
        self.socket = None;
        self.connected = false;
    }

    fn is_disconnect(&self, error: &io::Error) -> bool {
        // ICMP port unreachable on a connected socket
        error.kind() == io::ErrorKind::ConnectionRefused || crate::protocol::is_disconnect_kind(error.kind())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.remote
    }
}

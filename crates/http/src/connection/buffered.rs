//! Transport-agnostic buffered connection.
//!
//! A [`Connection`] owns one [`Transport`] and runs as its own task. It posts a
//! read sized `rx_buffer_size` whenever no write is pending, writes queued
//! buffers strictly in the order they were queued, and reports everything that
//! happens as a [`ConnectionEvent`] on an unbounded channel.
//!
//! The event stream of a connection always ends with exactly one
//! [`ConnectionEvent::Disconnected`]; nothing follows it.

use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use bytes::{Bytes, BytesMut};
use once_cell::sync::OnceCell;
use tokio::sync::Notify;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::config::ConnectionConfig;
use crate::protocol::{SendError, TransportError};
use crate::transport::Transport;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug)]
pub enum ConnectionEvent {
    /// The transport is open; carries the peer address when known.
    Connected(Option<SocketAddr>),
    Received(Bytes),
    /// One queued buffer of this many bytes was written.
    Sent(usize),
    Disconnected,
    /// No byte arrived within the receive timeout. The connection stays open.
    ReceiveTimedOut,
    Error(TransportError),
}

enum Command {
    Send(Bytes),
    Shutdown,
}

struct Shared {
    id: ConnectionId,
    commands: UnboundedSender<Command>,
    queued: AtomicUsize,
    max_send_queue: usize,
    closed: AtomicBool,
    cancel: CancellationToken,
    peer: OnceCell<SocketAddr>,
    /// Woken whenever a queue slot frees up or the connection closes.
    drained: Notify,
}

impl Shared {
    fn release(&self, slots: usize) {
        self.queued.fetch_sub(slots, Ordering::AcqRel);
        self.drained.notify_waiters();
    }
}

/// Cloneable handle used to send on and close a running [`Connection`].
#[derive(Clone)]
pub struct ConnectionHandle {
    shared: Arc<Shared>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.peer.get().copied()
    }

    /// Queues `data` for writing after everything queued before it.
    pub fn send_data(&self, data: Bytes) -> Result<(), SendError> {
        let shared = &self.shared;
        if shared.closed.load(Ordering::Acquire) {
            return Err(SendError::Closed);
        }
        if shared.queued.fetch_add(1, Ordering::AcqRel) >= shared.max_send_queue {
            shared.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(SendError::QueueFull { limit: shared.max_send_queue });
        }
        if shared.commands.send(Command::Send(data)).is_err() {
            shared.queued.fetch_sub(1, Ordering::AcqRel);
            return Err(SendError::Closed);
        }
        Ok(())
    }

    /// Like [`send_data`](Self::send_data), but waits for a free queue slot
    /// instead of failing with [`SendError::QueueFull`].
    pub async fn send_data_wait(&self, data: Bytes) -> Result<(), SendError> {
        loop {
            let drained = self.shared.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();
            match self.send_data(data.clone()) {
                Err(SendError::QueueFull { .. }) => drained.await,
                result => return result,
            }
        }
    }

    /// Number of buffers queued but not yet written.
    pub fn queued(&self) -> usize {
        self.shared.queued.load(Ordering::Acquire)
    }

    /// Writes everything already queued, then shuts the transport down.
    pub fn shutdown(&self) {
        let _ = self.shared.commands.send(Command::Shutdown);
    }

    /// Closes at once; queued buffers are discarded.
    pub fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        self.shared.cancel.cancel();
        self.shared.drained.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn downgrade(&self) -> WeakConnection {
        WeakConnection { shared: Arc::downgrade(&self.shared) }
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.shared.id)
            .field("queued", &self.queued())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A handle that does not keep the connection alive.
#[derive(Clone, Debug, Default)]
pub struct WeakConnection {
    shared: Weak<Shared>,
}

impl WeakConnection {
    pub fn upgrade(&self) -> Option<ConnectionHandle> {
        self.shared.upgrade().map(|shared| ConnectionHandle { shared })
    }
}

/// How the transport is opened before the read loop starts.
#[derive(Debug, Clone)]
pub enum Open {
    /// An accepted transport: run its server side handshake.
    Accepted,
    /// Connect as a client.
    Connect { host: String, port: u16 },
}

pub struct Connection<T> {
    transport: T,
    config: ConnectionConfig,
    shared: Arc<Shared>,
    commands: UnboundedReceiver<Command>,
    events: UnboundedSender<ConnectionEvent>,
    queue: VecDeque<Bytes>,
}

enum Step {
    Cancelled,
    Command(Option<Command>),
    Read(io::Result<usize>),
    TimedOut,
}

impl<T: Transport + 'static> Connection<T> {
    pub fn new(transport: T, config: ConnectionConfig) -> (Self, ConnectionHandle, UnboundedReceiver<ConnectionEvent>) {
        let (command_tx, command_rx) = unbounded_channel();
        let (event_tx, event_rx) = unbounded_channel();
        let shared = Arc::new(Shared {
            id: ConnectionId::next(),
            commands: command_tx,
            queued: AtomicUsize::new(0),
            max_send_queue: config.max_send_queue,
            closed: AtomicBool::new(false),
            cancel: CancellationToken::new(),
            peer: OnceCell::new(),
            drained: Notify::new(),
        });
        let handle = ConnectionHandle { shared: Arc::clone(&shared) };
        let connection = Self { transport, config, shared, commands: command_rx, events: event_tx, queue: VecDeque::new() };
        (connection, handle, event_rx)
    }

    pub fn spawn(self, open: Open) -> JoinHandle<()> {
        tokio::spawn(self.run(open))
    }

    pub async fn run(mut self, open: Open) {
        let id = self.shared.id;
        match self.open(open).await {
            Ok(peer) => {
                if let Some(peer) = peer {
                    let _ = self.shared.peer.set(peer);
                }
                debug!(connection = %id, peer = ?peer, "connection opened");
                self.emit(ConnectionEvent::Connected(peer));
                self.event_loop().await;
            }
            Err(e) => {
                error!(connection = %id, cause = %e, "failed to open connection");
                self.transport.close();
                self.emit(ConnectionEvent::Error(e));
            }
        }

        self.shared.closed.store(true, Ordering::Release);
        self.shared.release(self.queue.len());
        self.queue.clear();
        debug!(connection = %id, "connection closed");
        self.emit(ConnectionEvent::Disconnected);
    }

    async fn open(&mut self, open: Open) -> Result<Option<SocketAddr>, TransportError> {
        let opening = async {
            match &open {
                Open::Accepted => self.transport.start().await.map(|()| self.transport.peer_addr()),
                Open::Connect { host, port } => self.transport.connect(host, *port).await.map(Some),
            }
        };
        match self.config.connection_timeout() {
            Some(limit) => timeout(limit, opening).await.map_err(|_| TransportError::Timeout)?,
            None => opening.await,
        }
    }

    async fn event_loop(&mut self) {
        let id = self.shared.id;
        let cancel = self.shared.cancel.clone();
        let receive_timeout = self.config.receive_timeout();
        let mut deadline = receive_timeout.map(|t| Instant::now() + t);
        let mut rx = BytesMut::new();
        let mut shutting_down = false;

        loop {
            if let Some(data) = self.queue.pop_front() {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => None,
                    result = self.transport.write(&data) => Some(result),
                };
                self.shared.release(1);
                match result {
                    None => return self.transport.close(),
                    Some(Ok(())) => {
                        trace!(connection = %id, size = data.len(), "sent");
                        self.emit(ConnectionEvent::Sent(data.len()));
                        continue;
                    }
                    Some(Err(e)) => return self.io_failed(e),
                }
            }

            if shutting_down {
                if let Err(e) = self.transport.shutdown().await {
                    trace!(connection = %id, cause = %e, "shutdown failed");
                }
                self.transport.close();
                return;
            }

            rx.reserve(self.config.rx_buffer_size);
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => Step::Cancelled,
                command = self.commands.recv() => Step::Command(command),
                result = self.transport.read(&mut rx) => Step::Read(result),
                () = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => Step::TimedOut,
            };

            match step {
                Step::Cancelled => return self.transport.close(),
                Step::Command(Some(Command::Send(data))) => self.queue.push_back(data),
                Step::Command(Some(Command::Shutdown) | None) => shutting_down = true,
                Step::Read(Ok(0)) => {
                    debug!(connection = %id, "peer closed");
                    return self.transport.close();
                }
                Step::Read(Ok(n)) => {
                    trace!(connection = %id, size = n, "received");
                    deadline = receive_timeout.map(|t| Instant::now() + t);
                    self.emit(ConnectionEvent::Received(rx.split().freeze()));
                }
                Step::Read(Err(e)) => return self.io_failed(e),
                Step::TimedOut => {
                    debug!(connection = %id, "receive timed out");
                    deadline = receive_timeout.map(|t| Instant::now() + t);
                    self.emit(ConnectionEvent::ReceiveTimedOut);
                }
            }
        }
    }

    fn io_failed(&mut self, e: io::Error) {
        if self.transport.is_disconnect(&e) {
            debug!(connection = %self.shared.id, cause = %e, "peer disconnected");
        } else {
            error!(connection = %self.shared.id, cause = %e, "transport error");
            self.emit(ConnectionEvent::Error(e.into()));
        }
        self.transport.close();
    }

    fn emit(&self, event: ConnectionEvent) {
        // nobody listening is fine
        let _ = self.events.send(event);
    }
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection").field("id", &self.shared.id).field("queue", &self.queue.len()).finish()
    }
}

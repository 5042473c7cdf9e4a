//! Parser, connection and server limits.
//!
//! Every config deserializes with serde, missing fields falling back to the
//! defaults below, so an embedding application can load them from its own
//! configuration format.

use std::time::Duration;

use once_cell::sync::OnceCell;
use serde::Deserialize;

/// Limits enforced by the request-line, status-line, header and chunk parsers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Reject a bare `LF` line ending in heads and chunk lines.
    pub strict_crlf: bool,
    /// Cap on leading whitespace per header value or chunk size line.
    pub max_whitespace: usize,
    /// Cap on the bytes of a single header or chunk line.
    pub max_line_length: usize,
    /// Cap on the bytes of a whole header block.
    pub max_headers_size: usize,
    /// Cap on the request-target length.
    pub max_uri_length: usize,
    /// Cap on a `Content-Length` body and on an aggregated chunked body.
    pub max_body_size: u64,
    /// Cap on the size of one chunk.
    pub max_chunk_size: u64,
    /// Answer methods outside RFC 7231 with `501 Not Implemented`.
    pub strict_methods: bool,
}

static GLOBAL_PARSER_CONFIG: OnceCell<ParserConfig> = OnceCell::new();

impl ParserConfig {
    pub const DEFAULT: ParserConfig = ParserConfig {
        strict_crlf: false,
        max_whitespace: 8,
        max_line_length: 1024,
        max_headers_size: 8 * 1024,
        max_uri_length: 8190,
        max_body_size: 1024 * 1024,
        max_chunk_size: 1024 * 1024,
        strict_methods: false,
    };

    /// The process-wide defaults: the value passed to [`ParserConfig::set_global`]
    /// if it was called, [`ParserConfig::DEFAULT`] otherwise.
    pub fn global() -> &'static ParserConfig {
        GLOBAL_PARSER_CONFIG.get().unwrap_or(&Self::DEFAULT)
    }

    /// Freezes the process-wide defaults. Returns the rejected value if they
    /// were already set.
    pub fn set_global(config: ParserConfig) -> Result<(), ParserConfig> {
        GLOBAL_PARSER_CONFIG.set(config)
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        *Self::global()
    }
}

/// Buffering, timer and backpressure settings of a buffered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Size of the buffer each read is posted into.
    pub rx_buffer_size: usize,
    /// Idle read deadline in milliseconds, `0` disables it.
    pub receive_timeout_ms: u64,
    /// Connect and handshake deadline in milliseconds, `0` disables it.
    pub connection_timeout_ms: u64,
    /// Maximum number of queued outbound buffers.
    pub max_send_queue: usize,
}

impl ConnectionConfig {
    pub const fn tcp() -> Self {
        Self { rx_buffer_size: 8 * 1024, receive_timeout_ms: 0, connection_timeout_ms: 0, max_send_queue: 1024 }
    }

    pub const fn udp() -> Self {
        Self { rx_buffer_size: 2 * 1024, ..Self::tcp() }
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.receive_timeout_ms)
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        non_zero_millis(self.connection_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::tcp()
    }
}

fn non_zero_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Set `TCP_NODELAY` on accepted sockets.
    pub no_delay: bool,
    /// Set `SO_REUSEADDR` on the listening socket.
    pub reuse_address: bool,
    pub backlog: u32,
    /// Collect chunked request bodies into one buffer before calling the handler.
    /// When false each chunk is handed to `Handler::on_chunk` as it completes.
    pub aggregate_chunks: bool,
    pub connection: ConnectionConfig,
    pub parser: ParserConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            no_delay: true,
            reuse_address: true,
            backlog: 1024,
            aggregate_chunks: true,
            connection: ConnectionConfig::tcp(),
            parser: ParserConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub connection: ConnectionConfig,
    pub parser: ParserConfig,
}

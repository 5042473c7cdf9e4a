//! An embeddable asynchronous HTTP/1.1 library.
//!
//! The crate is built in layers so each can be used on its own:
//!
//! - resumable parsers for request lines, status lines, header blocks and
//!   chunked bodies, fed with whatever bytes have arrived
//! - encoders for request and response heads and bodies
//! - byte transports over TCP, TLS and UDP behind one [`transport::Transport`]
//!   trait
//! - a buffered [`connection::Connection`] with a bounded send queue, receive
//!   timeout and lifecycle events
//! - a [`server::Server`] and an [`client::HttpClient`] that speak HTTP over
//!   those connections, plus Basic authentication and cookie helpers
//!
//! # Example
//!
//! ```no_run
//! use std::convert::Infallible;
//! use std::sync::Arc;
//!
//! use http::StatusCode;
//! use tracing::{Level, info};
//! use tracing_subscriber::FmtSubscriber;
//! use wicket_http::config::ServerConfig;
//! use wicket_http::handler::make_handler;
//! use wicket_http::protocol::{Request, Response};
//! use wicket_http::server::Server;
//!
//! #[tokio::main]
//! async fn main() {
//!     let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
//!     tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
//!
//!     let server = match Server::bind("127.0.0.1:8080", ServerConfig::default()).await {
//!         Ok(server) => server,
//!         Err(e) => {
//!             tracing::error!(cause = %e, "bind server error");
//!             return;
//!         }
//!     };
//!     server.serve(Arc::new(make_handler(hello_world))).await;
//! }
//!
//! async fn hello_world(request: Request) -> Result<Response, Infallible> {
//!     info!(path = request.path(), size = request.body().len(), "request received");
//!     Ok(Response::text(StatusCode::OK, "Hello World!\r\n"))
//! }
//! ```
//!
//! # Modules
//!
//! - [`protocol`]: message model, header registry and error types
//! - [`codec`]: parsers and encoders as `tokio_util::codec` state machines
//! - [`transport`]: TCP, TLS and UDP transports
//! - [`connection`]: buffered connections and the HTTP conversation on top
//! - [`server`] and [`client`]: the two ends of an HTTP exchange
//! - [`handler`]: the request handler trait
//! - [`auth`]: Base64 and Basic authentication
//! - [`cookie`]: `Set-Cookie` parsing and encoding
//! - [`config`]: serde-loadable limits and timeouts
//! - [`date`]: the cached `Date` header value
//!
//! # Errors
//!
//! - [`protocol::HttpError`]: top-level error of a connection
//! - [`protocol::ParseError`]: malformed input, with the status code to answer
//! - [`protocol::SendError`]: queueing and encoding failures
//! - [`protocol::TransportError`]: socket and TLS failures
//!
//! The library installs no `tracing` subscriber; logging is up to the
//! embedding application.

pub mod auth;
pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod cookie;
pub mod date;
pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;

/// Value of the `Server` header stamped on every response.
pub const SERVER_NAME: &str = concat!("wicket-http/", env!("CARGO_PKG_VERSION"));

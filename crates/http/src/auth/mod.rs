//! Base64 and HTTP Basic authentication.
//!
//! [`BasicAuthenticator`] checks credentials against a user table and
//! produces the `WWW-Authenticate` challenge; [`BasicAuth`] applies it in
//! front of any [`Handler`](crate::handler::Handler).

pub mod base64;

mod basic;
pub use basic::BasicAuth;
pub use basic::BasicAuthenticator;

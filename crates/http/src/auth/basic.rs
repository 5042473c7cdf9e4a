//! HTTP Basic authentication (RFC 7617).

use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use http_body::Body;
use http_body_util::{Either, Full};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::auth::base64;
use crate::handler::Handler;
use crate::protocol::{AuthError, HeaderId, Headers, Request, RequestHead, Response};

const SCHEME: &str = "basic";

/// Validates `Authorization: Basic` credentials against a user table.
///
/// Readers take a lock-free snapshot of the table; writers replace it.
#[derive(Debug)]
pub struct BasicAuthenticator {
    realm: String,
    users: ArcSwap<HashMap<String, String>>,
}

impl BasicAuthenticator {
    pub fn new(realm: impl Into<String>) -> Self {
        Self { realm: realm.into(), users: ArcSwap::from_pointee(HashMap::new()) }
    }

    pub fn with_users<I, U, P>(realm: impl Into<String>, users: I) -> Self
    where
        I: IntoIterator<Item = (U, P)>,
        U: Into<String>,
        P: Into<String>,
    {
        let users = users.into_iter().map(|(u, p)| (u.into(), p.into())).collect::<HashMap<_, _>>();
        Self { realm: realm.into(), users: ArcSwap::from_pointee(users) }
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    pub fn add_user(&self, user: impl Into<String>, password: impl Into<String>) {
        let (user, password) = (user.into(), password.into());
        self.users.rcu(|users| {
            let mut users = HashMap::clone(users);
            users.insert(user.clone(), password.clone());
            users
        });
    }

    pub fn remove_user(&self, user: &str) -> bool {
        let previous = self.users.rcu(|users| {
            let mut users = HashMap::clone(users);
            users.remove(user);
            users
        });
        previous.contains_key(user)
    }

    /// The `WWW-Authenticate` value sent with a `401`.
    pub fn challenge(&self) -> String {
        if self.realm.is_empty() { "Basic".to_string() } else { format!("Basic realm=\"{}\"", self.realm) }
    }

    /// Returns the authenticated user name.
    pub fn authenticate(&self, headers: &Headers) -> Result<String, AuthError> {
        let value = headers.get_id(HeaderId::Authorization).ok_or(AuthError::Missing)?.trim();

        let (scheme, credentials) = value.split_once(' ').ok_or(AuthError::Malformed)?;
        if !scheme.eq_ignore_ascii_case(SCHEME) {
            return Err(AuthError::Malformed);
        }

        let decoded = base64::decode(credentials.trim());
        let decoded = String::from_utf8(decoded).map_err(|_| AuthError::Malformed)?;
        let (user, password) = decoded.split_once(':').ok_or(AuthError::Malformed)?;

        let users = self.users.load();
        match users.get(user) {
            Some(expected) if bool::from(expected.as_bytes().ct_eq(password.as_bytes())) => Ok(user.to_string()),
            Some(_) => Err(AuthError::WrongPassword),
            None => {
                // keep the unknown-user path as slow as a real comparison
                let _ = password.as_bytes().ct_eq(password.as_bytes());
                Err(AuthError::UnknownUser)
            }
        }
    }

    /// Empty on success, otherwise the challenge to send back.
    pub fn verify(&self, headers: &Headers) -> String {
        match self.authenticate(headers) {
            Ok(_) => String::new(),
            Err(e) => {
                debug!(realm = %self.realm, cause = %e, "basic authentication failed");
                self.challenge()
            }
        }
    }
}

/// Wraps a handler so that only authenticated requests reach it.
///
/// Every failure answers with the same `401` challenge, whatever the cause.
#[derive(Debug)]
pub struct BasicAuth<H> {
    inner: H,
    authenticator: Arc<BasicAuthenticator>,
}

impl<H> BasicAuth<H> {
    pub fn new(inner: H, authenticator: Arc<BasicAuthenticator>) -> Self {
        Self { inner, authenticator }
    }

    pub fn authenticator(&self) -> &Arc<BasicAuthenticator> {
        &self.authenticator
    }

    fn reject<B>(&self, head: &RequestHead) -> Option<Response<Either<B, Full<Bytes>>>> {
        let challenge = self.authenticator.verify(head.headers());
        if challenge.is_empty() {
            return None;
        }
        warn!(uri = head.uri(), "rejecting unauthenticated request");
        Some(Response::unauthorized(challenge).map_body(Either::Right))
    }
}

#[async_trait]
impl<H> Handler for BasicAuth<H>
where
    H: Handler,
    H::RespBody: Body<Data = Bytes>,
    <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>>,
{
    type RespBody = Either<H::RespBody, Full<Bytes>>;
    type Error = H::Error;

    async fn call(&self, req: Request) -> Result<Response<Self::RespBody>, Self::Error> {
        if let Some(response) = self.reject(req.head()) {
            return Ok(response);
        }
        let response = self.inner.call(req).await?;
        Ok(response.map_body(Either::Left))
    }

    async fn expect_continue(&self, head: &RequestHead) -> Option<Response<Self::RespBody>> {
        if let Some(response) = self.reject(head) {
            return Some(response);
        }
        self.inner.expect_continue(head).await.map(|response| response.map_body(Either::Left))
    }

    async fn on_chunk(&self, head: &RequestHead, chunk: Bytes) {
        if self.authenticator.authenticate(head.headers()).is_ok() {
            self.inner.on_chunk(head, chunk).await;
        }
    }
}

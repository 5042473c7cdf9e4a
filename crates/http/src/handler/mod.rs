//! Request handler trait and function adaptors.
//!
//! A [`Handler`] receives every complete request of a connection and returns
//! the response to send. Plain async functions become handlers through
//! [`make_handler`].

use std::error::Error;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body::Body;

use crate::protocol::{Request, RequestHead, Response};

#[async_trait]
pub trait Handler: Send + Sync {
    type RespBody: Body + Send;
    type Error: Into<Box<dyn Error + Send + Sync>> + Send;

    async fn call(&self, req: Request) -> Result<Response<Self::RespBody>, Self::Error>;

    /// Called for a request carrying `Expect: 100-continue` before its body is
    /// read. Returning a response sends it instead of `100 Continue`, skips
    /// the body and closes the connection.
    async fn expect_continue(&self, _head: &RequestHead) -> Option<Response<Self::RespBody>> {
        None
    }

    /// Receives each chunk of a chunked request body as it completes, when the
    /// server does not aggregate chunks. The request passed to
    /// [`Handler::call`] then has an empty body.
    async fn on_chunk(&self, _head: &RequestHead, _chunk: Bytes) {}
}

#[async_trait]
impl<H: Handler + ?Sized> Handler for Arc<H> {
    type RespBody = H::RespBody;
    type Error = H::Error;

    async fn call(&self, req: Request) -> Result<Response<Self::RespBody>, Self::Error> {
        (**self).call(req).await
    }

    async fn expect_continue(&self, head: &RequestHead) -> Option<Response<Self::RespBody>> {
        (**self).expect_continue(head).await
    }

    async fn on_chunk(&self, head: &RequestHead, chunk: Bytes) {
        (**self).on_chunk(head, chunk).await
    }
}

#[derive(Debug)]
pub struct HandlerFn<F> {
    f: F,
}

#[async_trait]
impl<RespBody, Err, F, Fut> Handler for HandlerFn<F>
where
    RespBody: Body + Send,
    F: Fn(Request) -> Fut + Send + Sync,
    Err: Into<Box<dyn Error + Send + Sync>> + Send,
    Fut: Future<Output = Result<Response<RespBody>, Err>> + Send,
{
    type RespBody = RespBody;
    type Error = Err;

    async fn call(&self, req: Request) -> Result<Response<Self::RespBody>, Self::Error> {
        (self.f)(req).await
    }
}

pub fn make_handler<F, RespBody, Err, Ret>(f: F) -> HandlerFn<F>
where
    RespBody: Body,
    Err: Into<Box<dyn Error + Send + Sync>>,
    Ret: Future<Output = Result<Response<RespBody>, Err>>,
    F: Fn(Request) -> Ret,
{
    HandlerFn { f }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use http::{Method, StatusCode};
    use http_body_util::{BodyExt, Full};

    use super::*;

    async fn echo(request: Request) -> Result<Response<Full<Bytes>>, Infallible> {
        Ok(Response::new(StatusCode::OK, Full::new(request.body().clone())))
    }

    #[tokio::test]
    async fn function_handler() {
        let handler = Arc::new(make_handler(echo));
        let request = RequestHead::new(Method::POST, "/").body(Bytes::from_static(b"ping"));

        let response = handler.call(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_parts().1.collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from_static(b"ping"));
        assert!(handler.expect_continue(&RequestHead::new(Method::GET, "/")).await.is_none());
    }
}

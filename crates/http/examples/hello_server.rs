use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use wicket_http::auth::{BasicAuth, BasicAuthenticator};
use wicket_http::config::ServerConfig;
use wicket_http::cookie::{Cookie, parse_cookie_header};
use wicket_http::handler::{Handler, make_handler};
use wicket_http::protocol::{HeaderId, Request, RequestHead, Response};
use wicket_http::server::Server;

// curl -v http://127.0.0.1:8080/hello
// curl -v -H "Transfer-Encoding: chunked" -d "name=hello" http://127.0.0.1:8080/echo
// curl -v -u ken:secret http://127.0.0.1:8081/
async fn hello_world(request: Request) -> Result<Response, Infallible> {
    info!(path = request.path(), size = request.body().len(), "receiving request");

    let visits = parse_cookie_header(request.headers().find_id(HeaderId::Cookie))
        .into_iter()
        .find(|(name, _)| name == "visits")
        .and_then(|(_, value)| value.parse::<u32>().ok())
        .unwrap_or(0);

    let mut response = match request.path() {
        "/echo" => Response::text(StatusCode::OK, String::from_utf8_lossy(request.body()).into_owned()),
        _ => Response::text(StatusCode::OK, format!("Hello World! visit #{}\r\n", visits + 1)),
    };
    if let Ok(cookie) = Cookie::new("visits", (visits + 1).to_string()).to_header_value() {
        response.headers_mut().insert_id(HeaderId::SetCookie, cookie);
    }
    Ok(response)
}

struct Streaming;

#[async_trait::async_trait]
impl Handler for Streaming {
    type RespBody = http_body_util::Full<Bytes>;
    type Error = Infallible;

    async fn call(&self, request: Request) -> Result<Response<Self::RespBody>, Self::Error> {
        hello_world(request).await
    }

    async fn on_chunk(&self, head: &RequestHead, chunk: Bytes) {
        info!(uri = head.uri(), size = chunk.len(), "chunk received");
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let plain = match Server::bind("127.0.0.1:8080", ServerConfig { aggregate_chunks: false, ..Default::default() }).await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };
    let protected = match Server::bind("127.0.0.1:8081", ServerConfig::default()).await {
        Ok(server) => server,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    let authenticator = Arc::new(BasicAuthenticator::with_users("demo", [("ken", "secret")]));
    let guarded = BasicAuth::new(make_handler(hello_world), authenticator);

    tokio::join!(plain.serve(Arc::new(Streaming)), protected.serve(Arc::new(guarded)));
}

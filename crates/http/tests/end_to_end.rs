use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body::Body;
use http_body_util::Full;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use wicket_http::SERVER_NAME;
use wicket_http::auth::{BasicAuth, BasicAuthenticator};
use wicket_http::client::HttpClient;
use wicket_http::config::{ClientConfig, ConnectionConfig, ServerConfig};
use wicket_http::connection::{Connection, ConnectionEvent, Open};
use wicket_http::handler::{Handler, make_handler};
use wicket_http::protocol::{HeaderId, Request, RequestHead, Response};
use wicket_http::server::{Server, ServerHandle};
use wicket_http::transport::{TcpTransport, UdpOptions, UdpTransport};

async fn start<H>(handler: H, config: ServerConfig) -> (SocketAddr, ServerHandle)
where
    H: Handler + 'static,
    H::RespBody: Body<Data = Bytes> + 'static,
    <H::RespBody as Body>::Error: Into<Box<dyn Error + Send + Sync>> + Send,
{
    let server = Server::bind("127.0.0.1:0", config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let handle = server.handle();
    tokio::spawn(server.serve(Arc::new(handler)));
    (addr, handle)
}

async fn hi(_: Request) -> Result<Response, Infallible> {
    Ok(Response::new(StatusCode::OK, Full::new(Bytes::from_static(b"hi"))))
}

/// Reads whatever the server sends until it closes the connection.
async fn exchange_until_close(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut response)).await.unwrap().unwrap();
    String::from_utf8(response).unwrap()
}

fn without_date(response: &str) -> String {
    response.split_inclusive("\r\n").filter(|line| !line.starts_with("Date: ")).collect()
}

#[tokio::test]
async fn simple_get() {
    let (addr, server) = start(make_handler(hi), ServerConfig::default()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").await.unwrap();

    let expected = format!("HTTP/1.1 200 OK\r\nServer: {SERVER_NAME}\r\nContent-Length: 2\r\n\r\nhi");
    let mut received = Vec::new();
    while without_date(&String::from_utf8_lossy(&received)).len() < expected.len() {
        let mut buf = [0; 256];
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf)).await.unwrap().unwrap();
        assert_ne!(n, 0, "server closed a keep-alive connection");
        received.extend_from_slice(&buf[..n]);
    }

    let received = String::from_utf8(received).unwrap();
    assert!(received.contains("\r\nDate: "));
    assert_eq!(without_date(&received), expected);
    server.shutdown();
}

#[tokio::test]
async fn chunked_upload() {
    let delivered = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&delivered);
    let handler = make_handler(move |request: Request| {
        let sink = Arc::clone(&sink);
        async move {
            *sink.lock().unwrap() = Some(request.body().clone());
            Ok::<_, Infallible>(Response::with_status(StatusCode::NO_CONTENT))
        }
    });
    let (addr, server) = start(handler, ServerConfig::default()).await;

    let response = exchange_until_close(
        addr,
        b"POST /u HTTP/1.1\r\nHost: x\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n5\r\nhello\r\n6\r\n world\r\n0\r\n\r\n",
    )
    .await;

    assert!(response.starts_with("HTTP/1.1 204 No Content\r\n"), "{response}");
    assert!(!response.contains("Content-Length"));
    let body = delivered.lock().unwrap().clone().unwrap();
    assert_eq!(body, Bytes::from_static(b"hello world"));
    assert_eq!(body.len(), 11);
    server.shutdown();
}

#[tokio::test]
async fn basic_auth() {
    let authenticator = Arc::new(BasicAuthenticator::with_users("api", [("Ken", "ABCD")]));
    let (addr, server) = start(BasicAuth::new(make_handler(hi), authenticator), ServerConfig::default()).await;
    let port = addr.port();

    let mut client = HttpClient::connect(TcpTransport::new(), "127.0.0.1", port, ClientConfig::default()).await.unwrap();

    let rejected = client
        .send(RequestHead::new(Method::GET, "/").header(HeaderId::Authorization, "Basic S2VuOldyb25n"), Bytes::new())
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(rejected.headers().find_id(HeaderId::WwwAuthenticate), r#"Basic realm="api""#);

    let accepted = client
        .send(RequestHead::new(Method::GET, "/").header(HeaderId::Authorization, "Basic S2VuOkFCQ0Q"), Bytes::new())
        .await
        .unwrap();
    assert_eq!(accepted.status(), StatusCode::OK);
    assert_eq!(accepted.body(), &Bytes::from_static(b"hi"));

    client.close();
    server.shutdown();
}

#[tokio::test]
async fn whitespace_flood_is_rejected() {
    let mut config = ServerConfig::default();
    config.parser.max_whitespace = 8;
    let (addr, server) = start(make_handler(hi), config).await;

    let request = format!("GET / HTTP/1.1\r\nHost:{}x\r\n\r\n", " ".repeat(20));
    let response = exchange_until_close(addr, request.as_bytes()).await;

    assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"), "{response}");
    assert!(response.contains("Connection: close\r\n"));
    server.shutdown();
}

#[tokio::test]
async fn oversized_content_length() {
    let called = Arc::new(Mutex::new(false));
    let flag = Arc::clone(&called);
    let handler = make_handler(move |_: Request| {
        let flag = Arc::clone(&flag);
        async move {
            *flag.lock().unwrap() = true;
            Ok::<_, Infallible>(Response::with_status(StatusCode::OK))
        }
    });
    let (addr, server) = start(handler, ServerConfig::default()).await;

    let response =
        exchange_until_close(addr, b"POST /big HTTP/1.1\r\nHost: x\r\nContent-Length: 999999999999\r\n\r\nxx").await;

    assert!(response.starts_with("HTTP/1.1 413 Payload Too Large\r\n"), "{response}");
    assert!(!*called.lock().unwrap());
    server.shutdown();
}

#[tokio::test]
async fn persistent_connection_answers_in_order() {
    let handler = make_handler(|request: Request| async move {
        Ok::<_, Infallible>(Response::text(StatusCode::OK, request.path().to_string()))
    });
    let (addr, server) = start(handler, ServerConfig::default()).await;

    let mut client =
        HttpClient::connect(TcpTransport::new(), "127.0.0.1", addr.port(), ClientConfig::default()).await.unwrap();
    for path in ["/one", "/two", "/three"] {
        let response = client.get(path).await.unwrap();
        assert_eq!(response.body(), path.as_bytes());
    }
    assert_eq!(server.connection_count(), 1);

    let head = client.send(RequestHead::new(Method::HEAD, "/four"), Bytes::new()).await.unwrap();
    assert_eq!(head.headers().find_id(HeaderId::ContentLength), "5");
    assert!(head.body().is_empty());

    client.close();
    server.shutdown();
}

#[tokio::test]
async fn udp_datagrams_become_events() {
    let server = UdpTransport::bind("127.0.0.1:0".parse().unwrap(), UdpOptions::default()).unwrap();
    let port = server.local_addr().unwrap().port();
    let (connection, handle, mut events) = Connection::new(server, ConnectionConfig::udp());
    connection.spawn(Open::Accepted);
    assert!(matches!(events.recv().await, Some(ConnectionEvent::Connected(_))));

    let (client, client_handle, mut client_events) = Connection::new(UdpTransport::new(UdpOptions::default()), ConnectionConfig::udp());
    client.spawn(Open::Connect { host: "127.0.0.1".to_string(), port });
    assert!(matches!(client_events.recv().await, Some(ConnectionEvent::Connected(Some(_)))));
    client_handle.send_data(Bytes::from_static(b"ping")).unwrap();

    loop {
        match events.recv().await {
            Some(ConnectionEvent::Received(data)) => {
                assert_eq!(data, Bytes::from_static(b"ping"));
                break;
            }
            Some(ConnectionEvent::Sent(_)) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    handle.send_data(Bytes::from_static(b"pong")).unwrap();

    loop {
        match client_events.recv().await {
            Some(ConnectionEvent::Received(data)) => {
                assert_eq!(data, Bytes::from_static(b"pong"));
                break;
            }
            Some(ConnectionEvent::Sent(_)) => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    handle.close();
}

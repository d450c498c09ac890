//! Serving over a real socket.

use std::fs;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{header, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use keel_config::{AppConfig, DirectoryConfig};
use keel_controller::{
    register_renderer, Controller, Descriptor, Invocation, RenderError, Renderer,
    ResponseContext, RouteConfig,
};
use keel_server::{Server, ShutdownSignal};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};

#[derive(Clone, Default)]
struct Hello;

impl Controller for Hello {}

fn config(static_dir: &std::path::Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.http_port = 8080;
    config.server.app_path = static_dir.display().to_string();
    config.server.shutdown_timeout_secs = Some(1);
    config.router.directories.push(DirectoryConfig {
        url: "/static".into(),
        source: "public".into(),
    });
    config
}

async fn send(addr: SocketAddr, method: Method, path: &str) -> (StatusCode, http::HeaderMap, Bytes) {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .unwrap();
    tokio::spawn(conn);

    let req = Request::builder()
        .method(method)
        .uri(path)
        .header(header::HOST, "localhost")
        .body(Full::new(Bytes::new()))
        .unwrap();
    let res = sender.send_request(req).await.unwrap();
    let status = res.status();
    let headers = res.headers().clone();
    let body = res.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

#[tokio::test]
async fn serves_routes_and_static_files_until_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("public")).unwrap();
    fs::write(dir.path().join("public").join("app.css"), "body{}").unwrap();

    let hello = Descriptor::new(Hello).sync_operation("Get", |inv: &mut Invocation<Hello>| {
        let name = inv.param("name").unwrap_or("world").to_string();
        inv.set("hello", name);
    });

    let mut server = Server::from_config(config(dir.path())).unwrap();
    server
        .router_mut()
        .public_route("/hello/{name}", &hello, RouteConfig::new("get:Get"))
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let running = tokio::spawn(server.serve(listener, shutdown.clone()));

    let (status, headers, body) = send(addr, Method::GET, "/hello/keel").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], br#"{"hello":"keel"}"#);
    assert_eq!(headers["x-request-id"].len(), 36);

    let (status, headers, body) = send(addr, Method::GET, "/static/app.css").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/css; charset=utf-8");
    assert_eq!(&body[..], b"body{}");

    let (status, _, _) = send(addr, Method::GET, "/static/").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, headers, _) = send(addr, Method::DELETE, "/hello/keel").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers[header::ALLOW], "GET");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn run_with_shutdown_reports_bind_failure() {
    let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = taken.local_addr().unwrap().port();

    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.server.host = "127.0.0.1".into();
    config.server.http_port = port;

    let server = Server::from_config(config).unwrap();
    let err = server
        .run_with_shutdown(ShutdownSignal::new())
        .await
        .unwrap_err();
    assert!(matches!(err, keel_server::ServerError::Bind(_)));
}

static RENDERS: AtomicUsize = AtomicUsize::new(0);

/// Counts render calls and writes nothing.
struct Counting;

impl Renderer for Counting {
    fn render(&self, _response: &mut ResponseContext) -> Result<(), RenderError> {
        RENDERS.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Sleeper;

impl Controller for Sleeper {
    fn render_type(&self) -> Option<&str> {
        Some("counting")
    }
}

const PENDING: u8 = 0;
const FINISHED: u8 = 1;
const CANCELLED: u8 = 2;

#[tokio::test]
async fn dropped_connection_cancels_the_operation() {
    register_renderer("counting", || Arc::new(Counting) as Arc<dyn Renderer>).unwrap();

    let seen = Arc::new(AtomicU8::new(PENDING));
    let observed = Arc::clone(&seen);
    let sleeper = Descriptor::new(Sleeper).operation("Sleep", move |inv| {
        let observed = Arc::clone(&observed);
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(400)).await;
            let state = if inv.request().is_cancelled() {
                CANCELLED
            } else {
                FINISHED
            };
            observed.store(state, Ordering::SeqCst);
            inv.set("slept", true);
        })
    });

    let dir = tempfile::tempdir().unwrap();
    fs::create_dir(dir.path().join("public")).unwrap();
    let mut server = Server::from_config(config(dir.path())).unwrap();
    server
        .router_mut()
        .public_route("/sleep", &sleeper, RouteConfig::new("get:Sleep"))
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();
    let running = tokio::spawn(server.serve(listener, shutdown.clone()));

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /sleep HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(stream);

    let mut waited = Duration::ZERO;
    while seen.load(Ordering::SeqCst) == PENDING && waited < Duration::from_secs(3) {
        tokio::time::sleep(Duration::from_millis(25)).await;
        waited += Duration::from_millis(25);
    }
    assert_eq!(seen.load(Ordering::SeqCst), CANCELLED);
    assert_eq!(RENDERS.load(Ordering::SeqCst), 0);

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .expect("server should stop")
        .unwrap()
        .unwrap();
}

use crate::broker::{BrokerLink, LinkState};
use crate::config::{BrokerBackendKind, Settings, StreamingMode};
use crate::server::ServerShell;
use crate::utils::RelayError;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

fn local_settings() -> Settings {
    let mut settings = Settings::default();
    settings.server.host = "127.0.0.1".into();
    settings.server.port = 0;
    settings.socket.host = "127.0.0.1".into();
    settings.socket.port = 0;
    settings.features.broker_backend = BrokerBackendKind::Memory;
    settings.relay.poll_wait_ms = 500;
    settings.logging.file = None;
    settings
}

struct Running {
    link: Option<Arc<BrokerLink>>,
    http: SocketAddr,
    socket: Option<SocketAddr>,
    shutdown: oneshot::Sender<()>,
    server: JoinHandle<Result<(), RelayError>>,
}

async fn start(settings: Settings) -> Running {
    let shell = ServerShell::bind(settings).await.expect("server failed to bind");
    let link = shell.link().cloned();
    let http = shell.http_addr().unwrap();
    let socket = shell.socket_addr();
    let (shutdown, signal) = oneshot::channel::<()>();
    let server = tokio::spawn(shell.serve(async {
        let _ = signal.await;
    }));
    Running {
        link,
        http,
        socket,
        shutdown,
        server,
    }
}

/// Sends one HTTP/1.1 request and returns the status code and body.
async fn http(addr: SocketAddr, method: &str, path: &str, form: Option<&str>) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let body = form.unwrap_or("");
    let request = format!(
        "{method} {path} HTTP/1.1\r\n\
         Host: localhost\r\n\
         Connection: close\r\n\
         Content-Type: application/x-www-form-urlencoded\r\n\
         Content-Length: {}\r\n\r\n{body}",
        body.len()
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("malformed status line");
    let body = raw
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_owned())
        .unwrap_or_default();
    (status, body)
}

#[tokio::test]
async fn integration_publish_and_poll_over_http() {
    let running = start(local_settings()).await;

    assert_eq!(
        http(running.http, "POST", "/publish", Some("type=hello+world")).await,
        (200, String::new())
    );
    assert_eq!(
        http(running.http, "GET", "/subscribe", None).await,
        (200, "hello world".to_string())
    );
    assert_eq!(
        http(running.http, "GET", "/subscribe", None).await,
        (200, "-1".to_string())
    );

    let (status, _) = http(running.http, "POST", "/publish", Some("type=")).await;
    assert_eq!(status, 400);

    let (status, page) = http(running.http, "GET", "/", None).await;
    assert_eq!(status, 200);
    assert!(page.contains("<html"));

    running.shutdown.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn integration_streaming_runs_beside_http() {
    let mut settings = local_settings();
    settings.features.enable_streaming = true;
    settings.socket.mode = StreamingMode::Echo;
    let running = start(settings).await;

    let socket = running.socket.expect("streaming listener not bound");
    let (mut ws, _) = connect_async(format!("ws://{socket}/")).await.unwrap();
    ws.send(WsMessage::text("ping")).await.unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("no echo")
        .unwrap()
        .unwrap();
    assert_eq!(reply, WsMessage::text("ping"));

    // The WebSocket side never feeds the broker channel.
    assert_eq!(
        http(running.http, "GET", "/subscribe", None).await,
        (200, "-1".to_string())
    );

    running.shutdown.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn integration_without_broker_serves_no_relay_routes() {
    let mut settings = local_settings();
    settings.features.enable_broker = false;
    let running = start(settings).await;
    assert!(running.link.is_none());
    assert!(running.socket.is_none());

    let (status, _) = http(running.http, "POST", "/publish", Some("type=x")).await;
    assert_eq!(status, 404);

    let (status, body) = http(running.http, "GET", "/health", None).await;
    assert_eq!(status, 200);
    let health: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert!(health["broker"].is_null());

    running.shutdown.send(()).unwrap();
    running.server.await.unwrap().unwrap();
}

#[tokio::test]
async fn integration_shutdown_closes_broker_link() {
    let running = start(local_settings()).await;
    let link = running.link.clone().expect("broker link missing");
    assert_eq!(link.state(), LinkState::Connected);

    running.shutdown.send(()).unwrap();
    running.server.await.unwrap().unwrap();
    assert_eq!(link.state(), LinkState::Closed);
}

#[tokio::test]
async fn integration_unreachable_broker_is_fatal() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let mut settings = local_settings();
    settings.features.broker_backend = BrokerBackendKind::Redis;
    settings.redis.port = port;

    let result = ServerShell::bind(settings).await;
    assert!(matches!(result, Err(RelayError::BrokerUnavailable(_))));
}

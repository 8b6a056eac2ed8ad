//! End-to-end: a gateway built from config, with SQLite stores on disk,
//! a real WebSocket authority and a real HTTP listener.

use std::time::Duration;

use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::Request;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use classgate::prelude::*;
use classgate::{IDENTITY_DB, SESSION_DB};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

const OPEN: &str = r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
const WAIT: Duration = Duration::from_secs(10);

/// Plays the authority: handshake, answer `getActiveClass` with `class`,
/// then wait for the gateway's disconnect.
async fn spawn_authority(class: Value) -> (String, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let auth_url = format!("http://{}", listener.local_addr().unwrap());

    let task = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        ws.send(Message::Text(OPEN.to_string().into())).await.unwrap();
        assert_eq!(read_text(&mut ws).await, "40");
        ws.send(Message::Text(r#"40{"sid":"abc"}"#.to_string().into()))
            .await
            .unwrap();
        assert_eq!(read_text(&mut ws).await, r#"42["getActiveClass"]"#);
        let frame = format!(r#"42["setClass",{class}]"#);
        ws.send(Message::Text(frame.into())).await.unwrap();

        assert_eq!(read_text(&mut ws).await, "41");
    });

    (auth_url, task)
}

async fn read_text<S>(ws: &mut tokio_tungstenite::WebSocketStream<S>) -> String
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    loop {
        match ws.next().await.expect("stream open").expect("frame") {
            Message::Text(text) => return text.as_str().to_owned(),
            _ => continue,
        }
    }
}

async fn wait_for_class(mut view: ClassView) {
    timeout(WAIT, async {
        while view.current().is_none() {
            if view.changed().await.is_none() {
                break;
            }
        }
    })
    .await
    .expect("class should arrive");
}

fn token(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{header}.{body}.c2ln")
}

fn config(auth_url: String, db_dir: &std::path::Path) -> GatewayConfig {
    GatewayConfig {
        port: 0,
        session_secret: "e2e secret".into(),
        auth_url,
        this_url: "http://gate.test".into(),
        db_dir: db_dir.to_path_buf(),
        ..GatewayConfig::default()
    }
}

#[tokio::test]
async fn test_gateway_logs_in_and_shows_authority_class() {
    let (auth_url, authority) = spawn_authority(json!({"id": 3, "name": "Chemistry"})).await;
    let dir = tempfile::tempdir().unwrap();

    let gateway = GatewayBuilder::new(config(auth_url, dir.path()))
        .build()
        .await
        .unwrap();
    let app = gateway.router();

    wait_for_class(gateway.channel().class_view()).await;

    let login = Request::builder()
        .uri(format!("/login?token={}", token(json!({"displayName": "alice"}))))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(login).await.unwrap();
    assert_eq!(response.headers()[LOCATION], "/");
    let set_cookie = response.headers()[SET_COOKIE].to_str().unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();

    let index = Request::builder()
        .uri("/")
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(index).await.unwrap();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let viewer: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        viewer,
        json!({"user": "alice", "currentClass": {"id": 3, "name": "Chemistry"}})
    );

    // Both databases live in DB_DIR and hold the login.
    assert!(dir.path().join(SESSION_DB).exists());
    let identities = SqliteIdentityStore::open(dir.path().join(IDENTITY_DB)).unwrap();
    assert!(identities.find("alice").await.unwrap().is_some());

    gateway.channel().shutdown().await;
    timeout(WAIT, authority)
        .await
        .expect("authority should see the disconnect")
        .unwrap();
}

#[tokio::test]
async fn test_gateway_serves_http_until_shutdown() {
    let (auth_url, authority) = spawn_authority(json!({"name": "History"})).await;
    let dir = tempfile::tempdir().unwrap();

    let gateway = GatewayBuilder::new(config(auth_url, dir.path()))
        .build()
        .await
        .unwrap();
    let port = gateway.local_addr().unwrap().port();
    wait_for_class(gateway.channel().class_view()).await;
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(gateway.run_until(async {
        let _ = stop_rx.await;
    }));

    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: gate.test\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    timeout(WAIT, stream.read_to_string(&mut raw))
        .await
        .expect("response should arrive")
        .unwrap();
    assert!(raw.starts_with("HTTP/1.1 302"), "got: {raw}");
    assert!(raw.to_ascii_lowercase().contains("location: /login"));

    stop_tx.send(()).unwrap();
    let result = timeout(WAIT, server)
        .await
        .expect("server should stop")
        .unwrap();
    assert!(result.is_ok());
    // Shutting down disconnects from the authority.
    timeout(WAIT, authority)
        .await
        .expect("authority should see the disconnect")
        .unwrap();
}

#[tokio::test]
async fn test_build_with_invalid_auth_url_fails() {
    let dir = tempfile::tempdir().unwrap();

    let result = GatewayBuilder::new(config("localhost:420".into(), dir.path()))
        .build()
        .await;

    assert!(matches!(result, Err(GatewayError::Channel(_))));
}

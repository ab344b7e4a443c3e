#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use relay_api::config::Config;
use relay_api::store::MemoryStore;
use relay_api::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        port: 0,
        jwt_secret: "gateway-test-secret".to_string(),
        token_ttl_secs: 3600,
        fold_room_names: true,
    }
}

/// App state backed by the in-memory store.
pub fn test_state() -> AppState {
    AppState::new(test_config(), Arc::new(MemoryStore::new()))
}

/// Router + state for axum-test driven REST tests.
pub fn test_app() -> (axum::Router, AppState) {
    let state = test_state();
    (relay_api::routes::router().with_state(state.clone()), state)
}

/// Start a real TCP server for WebSocket testing. The server runs in the
/// background for the lifetime of the test process.
pub async fn spawn_server() -> (SocketAddr, AppState) {
    let state = test_state();
    let app = relay_api::routes::router().with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, state)
}

/// Register a user over REST and return `(user_id, token)`.
pub async fn register_user(addr: SocketAddr, username: &str) -> (i64, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/v1/auth/register"))
        .json(&serde_json::json!({ "username": username, "password": "password123" }))
        .send()
        .await
        .expect("register request");
    assert!(resp.status().is_success(), "register failed: {}", resp.status());

    let body: serde_json::Value = resp.json().await.expect("parse register response");
    (
        body["user"]["id"].as_i64().expect("user id"),
        body["token"].as_str().expect("token").to_string(),
    )
}

pub async fn send_event(ws: &mut WsStream, value: serde_json::Value) {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await
        .expect("ws send");
}

/// Read the next JSON frame, skipping pings.
pub async fn next_event(ws: &mut WsStream) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream ended")
            .expect("ws read error");
        if let tungstenite::Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("parse event");
        }
    }
}

/// Read frames until the named event arrives, returning its data.
pub async fn wait_for(ws: &mut WsStream, event: &str) -> serde_json::Value {
    for _ in 0..50 {
        let ev = next_event(ws).await;
        if ev["event"] == event {
            return ev["data"].clone();
        }
    }
    panic!("event {event} never arrived");
}

/// Collect every event that arrives within the window.
pub async fn collect_events(ws: &mut WsStream, window: Duration) -> Vec<serde_json::Value> {
    let mut events = Vec::new();
    loop {
        match time::timeout(window, ws.next()).await {
            Ok(Some(Ok(tungstenite::Message::Text(text)))) => {
                events.push(serde_json::from_str(&text).expect("parse event"));
            }
            Ok(Some(Ok(_))) => continue,
            _ => return events,
        }
    }
}

/// Connect to the gateway and complete the `connect` handshake.
pub async fn connect_ws(addr: SocketAddr, token: &str) -> WsStream {
    let url = format!("ws://{addr}/gateway");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    send_event(
        &mut ws,
        serde_json::json!({ "event": "connect", "data": { "token": token } }),
    )
    .await;

    let data = wait_for(&mut ws, "connected").await;
    assert!(data["user"]["userId"].is_i64());

    ws
}

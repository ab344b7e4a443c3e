//! WebSocket upgrade handler and per-connection event loop.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time;

use crate::auth::Identity;
use crate::AppState;

use super::events::{ClientEvent, ServerEvent, UserPresencePayload};
use super::handler;

/// Timeout for receiving the `connect` event after the socket opens.
const CONNECT_TIMEOUT_SECS: u64 = 10;

pub fn router() -> Router<AppState> {
    Router::new().route("/gateway", get(ws_upgrade))
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Step 1: the first frame must be `connect` with a credential.
    let token = match time::timeout(
        Duration::from_secs(CONNECT_TIMEOUT_SECS),
        read_connect(&mut ws_rx),
    )
    .await
    {
        Ok(Ok(token)) => token,
        Ok(Err(reason)) => {
            tracing::debug!(%reason, "handshake failed");
            let _ = send_event(&mut ws_tx, &ServerEvent::error(reason)).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
        Err(_timeout) => {
            let _ = send_event(&mut ws_tx, &ServerEvent::error("Handshake timeout")).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    // Step 2: fail closed on a bad credential.
    let identity = match state.verifier.verify(&token).await {
        Ok(identity) => identity,
        Err(err) => {
            tracing::debug!(error = %err, "gateway credential rejected");
            let _ = send_event(&mut ws_tx, &ServerEvent::error(err.client_message())).await;
            let _ = ws_tx.send(Message::Close(None)).await;
            return;
        }
    };

    let connection_id = courier_common::id::prefixed_ulid(courier_common::id::prefix::CONNECTION);
    let (out_tx, out_rx) = mpsc::unbounded_channel();

    if let Err(err) = state
        .registry
        .register(&connection_id, identity.clone(), out_tx)
    {
        tracing::error!(%connection_id, error = %err, "registration failed");
        let _ = send_event(&mut ws_tx, &ServerEvent::error(err.client_message())).await;
        let _ = ws_tx.send(Message::Close(None)).await;
        return;
    }

    tracing::info!(
        %connection_id,
        user_id = identity.user_id,
        username = %identity.username,
        "gateway session established"
    );

    // Ack to the new connection, then announce the user's first session.
    if send_event(
        &mut ws_tx,
        &ServerEvent::Connected {
            user: identity.clone(),
        },
    )
    .await
    .is_err()
    {
        teardown(&state, &connection_id);
        return;
    }

    if state.presence.set_online(&identity) {
        state
            .registry
            .broadcast(Arc::new(ServerEvent::UserJoined(UserPresencePayload {
                user_id: identity.user_id,
                username: identity.username.clone(),
            })));
    }

    run_session(&state, &connection_id, &identity, ws_tx, ws_rx, out_rx).await;

    // Teardown runs on every exit path, including mid-send failures.
    teardown(&state, &connection_id);

    tracing::info!(
        %connection_id,
        user_id = identity.user_id,
        "gateway session ended"
    );
}

/// Read frames until the client sends `connect`, rejecting anything else.
async fn read_connect(ws_rx: &mut SplitStream<WebSocket>) -> Result<String, &'static str> {
    while let Some(msg) = ws_rx.next().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(?e, "ws read error during handshake");
                return Err("read error");
            }
        };

        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => return Err("client closed"),
            Message::Ping(_) | Message::Pong(_) => continue,
            _ => continue,
        };

        return match serde_json::from_str::<ClientEvent>(&text) {
            Ok(ClientEvent::Connect(payload)) => Ok(payload.token),
            Ok(_) => Err("Expected connect"),
            Err(_) => Err("Invalid JSON"),
        };
    }
    Err("connection closed before connect")
}

/// Main session loop: apply client events, drain the outbound queue.
async fn run_session(
    state: &AppState,
    connection_id: &str,
    identity: &Identity,
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut ws_rx: SplitStream<WebSocket>,
    mut out_rx: mpsc::UnboundedReceiver<Arc<ServerEvent>>,
) {
    loop {
        tokio::select! {
            // Client sends us an event.
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let event: ClientEvent = match serde_json::from_str(&text) {
                            Ok(ev) => ev,
                            Err(_) => {
                                let err = ServerEvent::error("Unrecognized event");
                                if send_event(&mut ws_tx, &err).await.is_err() {
                                    break;
                                }
                                continue;
                            }
                        };

                        if let Err(err) =
                            handler::dispatch(state, connection_id, identity, event).await
                        {
                            tracing::debug!(%connection_id, error = %err, "event rejected");
                            let reply = ServerEvent::error(err.client_message());
                            if send_event(&mut ws_tx, &reply).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(?e, %connection_id, "ws read error");
                        break;
                    }
                    _ => continue,
                }
            }

            // An event fanned out to this connection.
            out = out_rx.recv() => {
                match out {
                    Some(event) => {
                        if send_event(&mut ws_tx, &event).await.is_err() {
                            break;
                        }
                    }
                    // Sender side dropped: the registry entry is gone.
                    None => break,
                }
            }
        }
    }
}

/// Unregister and announce departure. Safe to call more than once.
fn teardown(state: &AppState, connection_id: &str) {
    let Some(closed) = state.registry.unregister(connection_id) else {
        return;
    };
    if let Some(username) = state.presence.remove_session(closed.identity.user_id) {
        state
            .registry
            .broadcast(Arc::new(ServerEvent::UserLeft(UserPresencePayload {
                user_id: closed.identity.user_id,
                username,
            })));
    }
}

async fn send_event(
    ws_tx: &mut SplitSink<WebSocket, Message>,
    event: &ServerEvent,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(event).unwrap_or_default();
    ws_tx.send(Message::Text(json.into())).await
}

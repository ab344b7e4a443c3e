mod common;

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use relay_api::store::ChatStore;
use tokio::time;
use tokio_tungstenite::tungstenite;

use common::{collect_events, connect_ws, next_event, register_user, send_event, spawn_server, wait_for};

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connect_with_bad_token_is_refused() {
    let (addr, _state) = spawn_server().await;

    let url = format!("ws://{addr}/gateway");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    send_event(
        &mut ws,
        serde_json::json!({ "event": "connect", "data": { "token": "garbage" } }),
    )
    .await;

    let ev = next_event(&mut ws).await;
    assert_eq!(ev["event"], "error");
    assert_eq!(ev["data"]["message"], "Invalid or expired token");

    // The server closes after refusing.
    let msg = time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("timeout");
    assert!(matches!(
        msg,
        Some(Ok(tungstenite::Message::Close(_))) | None
    ));
}

#[tokio::test]
async fn first_frame_must_be_connect() {
    let (addr, _state) = spawn_server().await;

    let url = format!("ws://{addr}/gateway");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");

    send_event(
        &mut ws,
        serde_json::json!({ "event": "message:send", "data": "hello?" }),
    )
    .await;

    let ev = next_event(&mut ws).await;
    assert_eq!(ev["event"], "error");
    assert_eq!(ev["data"]["message"], "Expected connect");
}

#[tokio::test]
async fn presence_is_announced_to_existing_sessions() {
    let (addr, _state) = spawn_server().await;
    let (_alice_id, alice_token) = register_user(addr, "alice").await;
    let (bob_id, bob_token) = register_user(addr, "bob").await;

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let _bob_ws = connect_ws(addr, &bob_token).await;

    let joined = wait_for(&mut alice_ws, "user:joined").await;
    // Alice sees her own arrival first; skip to bob's if needed.
    let data = if joined["username"] == "alice" {
        wait_for(&mut alice_ws, "user:joined").await
    } else {
        joined
    };
    assert_eq!(data["username"], "bob");
    assert_eq!(data["userId"], bob_id);
}

// ---------------------------------------------------------------------------
// Global fanout
// ---------------------------------------------------------------------------

#[tokio::test]
async fn global_message_reaches_all_sessions_and_persists() {
    let (addr, state) = spawn_server().await;
    let (alice_id, alice_token) = register_user(addr, "alice").await;
    let (_bob_id, bob_token) = register_user(addr, "bob").await;

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let mut bob_ws = connect_ws(addr, &bob_token).await;

    send_event(
        &mut alice_ws,
        serde_json::json!({ "event": "message:send", "data": "hi" }),
    )
    .await;

    // The sender's copy comes back through the fanout, not a local echo.
    let alice_copy = wait_for(&mut alice_ws, "message:received").await;
    let bob_copy = wait_for(&mut bob_ws, "message:received").await;

    for copy in [&alice_copy, &bob_copy] {
        assert_eq!(copy["content"], "hi");
        assert_eq!(copy["username"], "alice");
        assert_eq!(copy["userId"], alice_id);
    }
    assert_eq!(alice_copy["id"], bob_copy["id"]);

    // The durable row agrees with the broadcast copy.
    let rows = state.store.recent_messages(10).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, alice_copy["id"].as_i64().unwrap());
    assert_eq!(rows[0].content, "hi");
    assert_eq!(rows[0].username, "alice");
}

#[tokio::test]
async fn empty_message_is_rejected_to_sender_only() {
    let (addr, state) = spawn_server().await;
    let (_alice_id, alice_token) = register_user(addr, "alice").await;
    let (_bob_id, bob_token) = register_user(addr, "bob").await;

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let mut bob_ws = connect_ws(addr, &bob_token).await;

    send_event(
        &mut alice_ws,
        serde_json::json!({ "event": "message:send", "data": "   " }),
    )
    .await;

    let err = wait_for(&mut alice_ws, "error").await;
    assert_eq!(err["message"], "Message content is required");

    // Nothing persisted, nothing fanned out to bob.
    assert!(state.store.recent_messages(10).await.unwrap().is_empty());
    let bob_events = collect_events(&mut bob_ws, Duration::from_millis(200)).await;
    assert!(bob_events
        .iter()
        .all(|ev| ev["event"] != "message:received" && ev["event"] != "error"));
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

#[tokio::test]
async fn room_create_broadcasts_once_and_converges_on_case() {
    let (addr, _state) = spawn_server().await;
    let (_alice_id, alice_token) = register_user(addr, "alice").await;
    let (_bob_id, bob_token) = register_user(addr, "bob").await;

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let mut bob_ws = connect_ws(addr, &bob_token).await;

    send_event(
        &mut alice_ws,
        serde_json::json!({ "event": "room:create", "data": "Lobby" }),
    )
    .await;

    let created_alice = wait_for(&mut alice_ws, "room:created").await;
    let created_bob = wait_for(&mut bob_ws, "room:created").await;
    assert_eq!(created_alice["id"], created_bob["id"]);
    assert_eq!(created_alice["name"], "lobby");

    // A differently-cased repeat create resolves to the same room for the
    // caller and is not re-broadcast.
    send_event(
        &mut bob_ws,
        serde_json::json!({ "event": "room:create", "data": "LOBBY" }),
    )
    .await;
    let repeat = wait_for(&mut bob_ws, "room:created").await;
    assert_eq!(repeat["id"], created_alice["id"]);

    let alice_events = collect_events(&mut alice_ws, Duration::from_millis(200)).await;
    assert!(alice_events.iter().all(|ev| ev["event"] != "room:created"));
}

#[tokio::test]
async fn joining_unknown_room_fails() {
    let (addr, _state) = spawn_server().await;
    let (_alice_id, alice_token) = register_user(addr, "alice").await;
    let mut alice_ws = connect_ws(addr, &alice_token).await;

    send_event(
        &mut alice_ws,
        serde_json::json!({ "event": "room:join", "data": "ghost" }),
    )
    .await;

    let err = wait_for(&mut alice_ws, "error").await;
    assert_eq!(err["message"], "Room not found");
}

#[tokio::test]
async fn room_messages_follow_the_single_room_membership() {
    let (addr, _state) = spawn_server().await;
    let (_alice_id, alice_token) = register_user(addr, "alice").await;
    let (_bob_id, bob_token) = register_user(addr, "bob").await;

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let mut bob_ws = connect_ws(addr, &bob_token).await;

    for name in ["alpha", "beta"] {
        send_event(
            &mut alice_ws,
            serde_json::json!({ "event": "room:create", "data": name }),
        )
        .await;
        wait_for(&mut alice_ws, "room:created").await;
    }

    send_event(
        &mut alice_ws,
        serde_json::json!({ "event": "room:join", "data": "alpha" }),
    )
    .await;
    wait_for(&mut alice_ws, "room:user-joined").await;

    send_event(
        &mut bob_ws,
        serde_json::json!({ "event": "room:join", "data": "alpha" }),
    )
    .await;
    let joined = wait_for(&mut bob_ws, "room:user-joined").await;
    assert_eq!(joined["username"], "bob");

    // Both occupants (sender included) get the room message.
    send_event(
        &mut alice_ws,
        serde_json::json!({
            "event": "room:message:send",
            "data": { "roomName": "alpha", "content": "in alpha" }
        }),
    )
    .await;
    let to_alice = wait_for(&mut alice_ws, "room:message:received").await;
    let to_bob = wait_for(&mut bob_ws, "room:message:received").await;
    assert_eq!(to_alice["id"], to_bob["id"]);
    assert_eq!(to_bob["content"], "in alpha");

    // Alice switches to beta: implicit leave of alpha.
    send_event(
        &mut alice_ws,
        serde_json::json!({ "event": "room:join", "data": "beta" }),
    )
    .await;
    wait_for(&mut alice_ws, "room:user-joined").await;

    // After the switch she is a recipient for beta and not for alpha.
    send_event(
        &mut bob_ws,
        serde_json::json!({
            "event": "room:message:send",
            "data": { "roomName": "alpha", "content": "still alpha" }
        }),
    )
    .await;
    wait_for(&mut bob_ws, "room:message:received").await;

    send_event(
        &mut alice_ws,
        serde_json::json!({
            "event": "room:message:send",
            "data": { "roomName": "beta", "content": "in beta" }
        }),
    )
    .await;
    let beta_copy = wait_for(&mut alice_ws, "room:message:received").await;
    assert_eq!(beta_copy["content"], "in beta");

    let leftovers = collect_events(&mut alice_ws, Duration::from_millis(200)).await;
    assert!(
        leftovers
            .iter()
            .all(|ev| ev["event"] != "room:message:received"),
        "alice still receives alpha traffic: {leftovers:?}"
    );
}

// ---------------------------------------------------------------------------
// Direct conversations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn direct_messages_converge_on_one_conversation() {
    let (addr, _state) = spawn_server().await;
    let (alice_id, alice_token) = register_user(addr, "alice").await;
    let (bob_id, bob_token) = register_user(addr, "bob").await;
    let (_carol_id, carol_token) = register_user(addr, "carol").await;

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let mut bob_ws = connect_ws(addr, &bob_token).await;
    let mut carol_ws = connect_ws(addr, &carol_token).await;

    send_event(
        &mut alice_ws,
        serde_json::json!({
            "event": "direct:message:send",
            "data": { "recipientId": bob_id, "content": "psst" }
        }),
    )
    .await;

    let to_bob = wait_for(&mut bob_ws, "direct:message:received").await;
    let to_alice = wait_for(&mut alice_ws, "direct:message:received").await;
    assert_eq!(to_bob["content"], "psst");
    assert_eq!(to_bob["conversationId"], to_alice["conversationId"]);

    // Both participants hear the conversation changed.
    wait_for(&mut alice_ws, "conversation:updated").await;
    wait_for(&mut bob_ws, "conversation:updated").await;

    // The reverse direction lands in the same conversation.
    send_event(
        &mut bob_ws,
        serde_json::json!({
            "event": "direct:message:send",
            "data": { "recipientId": alice_id, "content": "yes?" }
        }),
    )
    .await;
    let reply = wait_for(&mut alice_ws, "direct:message:received").await;
    assert_eq!(reply["conversationId"], to_bob["conversationId"]);

    // Bystanders see none of it.
    let carol_events = collect_events(&mut carol_ws, Duration::from_millis(200)).await;
    assert!(carol_events
        .iter()
        .all(|ev| ev["event"] != "direct:message:received"));
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

#[tokio::test]
async fn group_messages_reach_members_only() {
    let (addr, _state) = spawn_server().await;
    let (_alice_id, alice_token) = register_user(addr, "alice").await;
    let (bob_id, bob_token) = register_user(addr, "bob").await;
    let (_carol_id, carol_token) = register_user(addr, "carol").await;

    // Alice creates a group with bob over REST.
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{addr}/api/v1/groups"))
        .header("Authorization", format!("Bearer {alice_token}"))
        .json(&serde_json::json!({ "name": "book club", "member_ids": [] }))
        .send()
        .await
        .expect("create group");
    assert_eq!(resp.status(), 201);
    let group: serde_json::Value = resp.json().await.unwrap();
    let group_id = group["id"].as_i64().unwrap();

    let resp = client
        .post(format!("http://{addr}/api/v1/groups/{group_id}/members"))
        .header("Authorization", format!("Bearer {alice_token}"))
        .json(&serde_json::json!({ "user_id": bob_id }))
        .send()
        .await
        .expect("add member");
    assert_eq!(resp.status(), 200);

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let mut bob_ws = connect_ws(addr, &bob_token).await;
    let mut carol_ws = connect_ws(addr, &carol_token).await;

    // Bob opts his connection into the group channel.
    send_event(
        &mut bob_ws,
        serde_json::json!({ "event": "group:join", "data": group_id }),
    )
    .await;
    wait_for(&mut bob_ws, "group:updated").await;

    send_event(
        &mut alice_ws,
        serde_json::json!({
            "event": "group:message:send",
            "data": { "groupId": group_id, "content": "meeting at 8" }
        }),
    )
    .await;

    let to_bob = wait_for(&mut bob_ws, "group:message:received").await;
    assert_eq!(to_bob["content"], "meeting at 8");
    assert_eq!(to_bob["groupId"], group_id);
    // The sender hears their own copy through the fanout.
    wait_for(&mut alice_ws, "group:message:received").await;

    // Carol is not a member: sending fails on her connection only, and she
    // received nothing.
    send_event(
        &mut carol_ws,
        serde_json::json!({
            "event": "group:message:send",
            "data": { "groupId": group_id, "content": "let me in" }
        }),
    )
    .await;
    let err = wait_for(&mut carol_ws, "error").await;
    assert_eq!(err["message"], "Not a member of this group");
    let carol_events = collect_events(&mut carol_ws, Duration::from_millis(200)).await;
    assert!(carol_events
        .iter()
        .all(|ev| ev["event"] != "group:message:received"));
}

// ---------------------------------------------------------------------------
// Disconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn disconnect_announces_departure_and_stops_delivery() {
    let (addr, state) = spawn_server().await;
    let (_alice_id, alice_token) = register_user(addr, "alice").await;
    let (_bob_id, bob_token) = register_user(addr, "bob").await;

    let mut alice_ws = connect_ws(addr, &alice_token).await;
    let mut bob_ws = connect_ws(addr, &bob_token).await;

    bob_ws
        .send(tungstenite::Message::Close(None))
        .await
        .expect("close");

    let left = wait_for(&mut alice_ws, "user:left").await;
    assert_eq!(left["username"], "bob");

    // Only alice's session remains registered.
    let deadline = time::Instant::now() + Duration::from_secs(5);
    while state.registry.connection_count() > 1 {
        assert!(time::Instant::now() < deadline, "bob's session never torn down");
        time::sleep(Duration::from_millis(10)).await;
    }

    send_event(
        &mut alice_ws,
        serde_json::json!({ "event": "message:send", "data": "anyone there?" }),
    )
    .await;
    let copy = wait_for(&mut alice_ws, "message:received").await;
    assert_eq!(copy["content"], "anyone there?");
}

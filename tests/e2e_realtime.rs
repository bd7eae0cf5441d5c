//! E2E tests for the realtime WebSocket channel

mod common;

use std::time::Duration;

use common::{TestServer, TestUser};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{Error as WsError, Message, handshake};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn connect(server: &TestServer, user: &TestUser) -> Socket {
    let (socket, _) = connect_async(server.ws_url(&user.token)).await.unwrap();
    socket
}

async fn send(socket: &mut Socket, event: Value) {
    socket
        .send(Message::Text(event.to_string()))
        .await
        .unwrap();
}

/// Next JSON event, skipping control frames
async fn next_event(socket: &mut Socket) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("timed out waiting for event")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert nothing arrives within a short window
async fn assert_silent(socket: &mut Socket) {
    let result = tokio::time::timeout(Duration::from_millis(200), socket.next()).await;
    assert!(result.is_err(), "unexpected frame: {:?}", result);
}

/// Round-trip an unparseable frame; frames on one connection are handled
/// in order, so everything sent before it has been processed
async fn sync(socket: &mut Socket) {
    socket.send(Message::Text("sync".to_string())).await.unwrap();
    assert_eq!(next_event(socket).await["event"], "error");
}

async fn join(socket: &mut Socket, sender: &TestUser, receiver: &TestUser) {
    send(
        socket,
        json!({ "event": "joinChat", "data": { "senderId": sender.id, "receiverId": receiver.id } }),
    )
    .await;
    sync(socket).await;
}

async fn register(socket: &mut Socket, user: &TestUser) -> Value {
    send(socket, json!({ "event": "register", "data": user.id })).await;
    next_event(socket).await
}

#[tokio::test]
async fn test_register_broadcasts_online_users() {
    let server = TestServer::new().await;
    let alice = server.create_user("alice", false).await;
    let bob = server.create_user("bob", false).await;

    let mut alice_ws = connect(&server, &alice).await;
    let event = register(&mut alice_ws, &alice).await;
    assert_eq!(event["event"], "onlineUsers");
    assert_eq!(event["data"], json!([alice.id]));

    let mut bob_ws = connect(&server, &bob).await;
    let event = register(&mut bob_ws, &bob).await;
    assert_eq!(event["event"], "onlineUsers");
    assert_eq!(event["data"].as_array().unwrap().len(), 2);

    let event = next_event(&mut alice_ws).await;
    assert_eq!(event["event"], "onlineUsers");
    assert_eq!(event["data"].as_array().unwrap().len(), 2);

    let online: Value = server
        .get(&alice, "/api/v1/online")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(online["online"].as_array().unwrap().len(), 2);

    bob_ws.close(None).await.unwrap();

    let event = next_event(&mut alice_ws).await;
    assert_eq!(event["event"], "onlineUsers");
    assert_eq!(event["data"], json!([alice.id]));
}

#[tokio::test]
async fn test_chat_message_delivery_and_notification() {
    let server = TestServer::new().await;
    let alice = server.create_user("alice", false).await;
    let bob = server.create_user("bob", false).await;

    let mut alice_ws = connect(&server, &alice).await;
    register(&mut alice_ws, &alice).await;
    let mut bob_ws = connect(&server, &bob).await;
    register(&mut bob_ws, &bob).await;
    next_event(&mut alice_ws).await; // bob came online

    join(&mut alice_ws, &alice, &bob).await;

    // Bob is not in the room: he gets a notification only
    send(
        &mut alice_ws,
        json!({
            "event": "chatMessage",
            "data": { "senderId": alice.id, "receiverId": bob.id, "text": "hello bob" }
        }),
    )
    .await;

    let event = next_event(&mut alice_ws).await;
    assert_eq!(event["event"], "chatMessage");
    assert_eq!(event["data"]["text"], "hello bob");

    let event = next_event(&mut bob_ws).await;
    assert_eq!(event["event"], "newMessageNotification");
    assert_eq!(event["data"]["senderId"], alice.id.as_str());
    assert_eq!(event["data"]["textPreview"], "hello bob");

    // Once bob joins, messages arrive in the room without a notification
    join(&mut bob_ws, &bob, &alice).await;
    send(
        &mut alice_ws,
        json!({
            "event": "chatMessage",
            "data": { "senderId": alice.id, "receiverId": bob.id, "text": "in the room" }
        }),
    )
    .await;

    let event = next_event(&mut bob_ws).await;
    assert_eq!(event["event"], "chatMessage");
    assert_eq!(event["data"]["text"], "in the room");
    let event = next_event(&mut alice_ws).await;
    assert_eq!(event["data"]["text"], "in the room");
    assert_silent(&mut bob_ws).await;

    // Both messages were persisted
    let thread: Vec<Value> = server
        .get(&alice, &format!("/api/v1/chat/{}", bob.id))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(thread.len(), 2);
}

#[tokio::test]
async fn test_typing_reaches_counterpart_only() {
    let server = TestServer::new().await;
    let alice = server.create_user("alice", false).await;
    let bob = server.create_user("bob", false).await;

    let mut alice_ws = connect(&server, &alice).await;
    register(&mut alice_ws, &alice).await;
    let mut bob_ws = connect(&server, &bob).await;
    register(&mut bob_ws, &bob).await;
    next_event(&mut alice_ws).await;

    join(&mut alice_ws, &alice, &bob).await;
    join(&mut bob_ws, &bob, &alice).await;

    send(
        &mut alice_ws,
        json!({ "event": "typing", "data": { "senderId": alice.id, "receiverId": bob.id } }),
    )
    .await;
    let event = next_event(&mut bob_ws).await;
    assert_eq!(event["event"], "typing");
    assert_eq!(event["data"]["senderId"], alice.id.as_str());

    send(
        &mut alice_ws,
        json!({ "event": "stopTyping", "data": { "senderId": alice.id, "receiverId": bob.id } }),
    )
    .await;
    let event = next_event(&mut bob_ws).await;
    assert_eq!(event["event"], "stopTyping");

    assert_silent(&mut alice_ws).await;
}

#[tokio::test]
async fn test_private_receiver_blocks_realtime_send() {
    let server = TestServer::new().await;
    let alice = server.create_user("alice", false).await;
    let bob = server.create_user("bob", true).await;

    let mut alice_ws = connect(&server, &alice).await;
    register(&mut alice_ws, &alice).await;

    send(
        &mut alice_ws,
        json!({
            "event": "chatMessage",
            "data": { "senderId": alice.id, "receiverId": bob.id, "text": "let me in" }
        }),
    )
    .await;

    let event = next_event(&mut alice_ws).await;
    assert_eq!(event["event"], "error");

    let thread: Vec<Value> = server
        .get(&bob, &format!("/api/v1/chat/{}", alice.id))
        .await
        .json()
        .await
        .unwrap();
    assert!(thread.is_empty());
}

#[tokio::test]
async fn test_malformed_frame_keeps_connection_open() {
    let server = TestServer::new().await;
    let alice = server.create_user("alice", false).await;

    let mut alice_ws = connect(&server, &alice).await;
    send(&mut alice_ws, json!({ "event": "teleport", "data": 1 })).await;
    alice_ws
        .send(Message::Text("not json".to_string()))
        .await
        .unwrap();

    assert_eq!(next_event(&mut alice_ws).await["event"], "error");
    assert_eq!(next_event(&mut alice_ws).await["event"], "error");

    let event = register(&mut alice_ws, &alice).await;
    assert_eq!(event["event"], "onlineUsers");
}

#[tokio::test]
async fn test_impersonation_is_rejected() {
    let server = TestServer::new().await;
    let alice = server.create_user("alice", false).await;
    let bob = server.create_user("bob", false).await;

    let mut alice_ws = connect(&server, &alice).await;
    send(&mut alice_ws, json!({ "event": "register", "data": bob.id })).await;

    let event = next_event(&mut alice_ws).await;
    assert_eq!(event["event"], "error");
    assert!(!server.state.presence.is_online(&bob.id).await);
}

#[tokio::test]
async fn test_upgrade_requires_session() {
    let server = TestServer::new().await;
    let url = server.ws_url("garbage");

    assert!(connect_async(url).await.is_err());
}

type Handshake = Result<(Socket, handshake::client::Response), WsError>;

fn assert_rejected_with_503(result: Handshake) {
    match result {
        Err(WsError::Http(response)) => {
            assert_eq!(response.status(), 503);
        }
        other => panic!("expected 503 upgrade rejection, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_connection_cap_rejects_upgrade() {
    let server = TestServer::with_max_connections(1).await;
    let alice = server.create_user("alice", false).await;
    let bob = server.create_user("bob", false).await;

    let mut alice_ws = connect(&server, &alice).await;
    assert_rejected_with_503(connect_async(server.ws_url(&bob.token)).await);

    // Closing the socket frees the slot
    alice_ws.close(None).await.unwrap();
    let mut admitted = false;
    for _ in 0..40 {
        if connect_async(server.ws_url(&bob.token)).await.is_ok() {
            admitted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(admitted, "slot was not released after close");
}

#[tokio::test]
async fn test_concurrent_upgrades_respect_cap() {
    let server = TestServer::with_max_connections(1).await;
    let alice = server.create_user("alice", false).await;

    let attempts = (0..5).map(|_| connect_async(server.ws_url(&alice.token)));
    let results = futures::future::join_all(attempts).await;

    let (accepted, rejected): (Vec<_>, Vec<_>) = results.into_iter().partition(Result::is_ok);
    assert_eq!(accepted.len(), 1);
    for result in rejected {
        assert_rejected_with_503(result);
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.state.realtime.connection_count().await, 1);
}

//! End-to-end tests against a real bound gateway: WebSocket clients connect,
//! chat, switch channels, and disconnect; HTTP routes answer alongside.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::net::SocketAddr;

use {
    futures::{SinkExt, StreamExt},
    serde_json::{Value, json},
    tokio::{
        net::TcpStream,
        time::{Duration, timeout},
    },
    tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message},
};

use {
    parlor_gateway::{config::GatewayConfig, server},
    parlor_protocol::{EventFrame, events},
};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_gateway() -> SocketAddr {
    let config = GatewayConfig::default();
    let state = server::build_state(&config);
    let app = server::build_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, username: &str) -> WsClient {
    let (ws, _) = connect_async(format!("ws://{addr}/ws?username={username}"))
        .await
        .unwrap();
    ws
}

async fn next_event(ws: &mut WsClient) -> EventFrame {
    loop {
        let msg = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .expect("read failed");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

/// Skip frames until one with the given event name arrives.
async fn next_named(ws: &mut WsClient, event: &str) -> Value {
    loop {
        let frame = next_event(ws).await;
        if frame.event == event {
            return frame.payload;
        }
    }
}

async fn send_frame(ws: &mut WsClient, value: Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

#[tokio::test]
async fn bootstrap_chat_and_listing_flow() {
    let addr = start_gateway().await;

    let mut alice = connect(addr, "alice").await;
    let bootstrap = next_named(&mut alice, events::BOOTSTRAP).await;
    assert_eq!(bootstrap["username"], "alice");
    let names: Vec<&str> = bootstrap["channels"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["general", "random", "announcements"]);

    let presence = next_named(&mut alice, events::PRESENCE_UPDATE).await;
    assert_eq!(presence["count"], 1);
    assert_eq!(presence["users"], json!(["alice"]));

    let mut bob = connect(addr, "bob").await;
    next_named(&mut bob, events::BOOTSTRAP).await;
    assert_eq!(next_named(&mut bob, events::PRESENCE_UPDATE).await["count"], 2);
    assert_eq!(
        next_named(&mut alice, events::PRESENCE_UPDATE).await["count"],
        2
    );

    send_frame(
        &mut alice,
        json!({"event": "message:send", "payload": {"text": "  hello  "}}),
    )
    .await;
    for ws in [&mut alice, &mut bob] {
        let msg = next_named(ws, events::MESSAGE_NEW).await;
        assert_eq!(msg["text"], "hello");
        assert_eq!(msg["author"], "alice");
        assert_eq!(msg["channel"], "general");
    }

    let summaries: Value = reqwest::get(format!("http://{addr}/api/channels"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summaries[0]["name"], "general");
    assert_eq!(summaries[0]["messageCount"], 1);
    assert_eq!(summaries[1]["messageCount"], 0);
}

#[tokio::test]
async fn channel_switch_scopes_fanout_and_disconnect_updates_presence() {
    let addr = start_gateway().await;

    let mut alice = connect(addr, "alice").await;
    next_named(&mut alice, events::PRESENCE_UPDATE).await;
    let mut bob = connect(addr, "bob").await;
    next_named(&mut bob, events::PRESENCE_UPDATE).await;
    next_named(&mut alice, events::PRESENCE_UPDATE).await;

    send_frame(&mut bob, json!({"event": "channel:join", "payload": "random"})).await;
    let history = next_named(&mut bob, events::CHANNEL_HISTORY).await;
    assert_eq!(history["name"], "random");
    assert!(history["messages"].as_array().unwrap().is_empty());

    // Alice still chats in general; bob must not see it.
    send_frame(
        &mut alice,
        json!({"event": "message:send", "payload": {"text": "hi"}}),
    )
    .await;
    let msg = next_named(&mut alice, events::MESSAGE_NEW).await;
    assert_eq!(msg["channel"], "general");

    alice.close(None).await.unwrap();

    // Bob's very next frame is the presence drop, not a stray message.
    let frame = next_event(&mut bob).await;
    assert_eq!(frame.event, events::PRESENCE_UPDATE);
    assert_eq!(frame.payload["count"], 1);
    assert_eq!(frame.payload["users"], json!(["bob"]));
}

#[tokio::test]
async fn unknown_channel_join_toasts_the_requester() {
    let addr = start_gateway().await;

    let mut alice = connect(addr, "alice").await;
    next_named(&mut alice, events::PRESENCE_UPDATE).await;

    send_frame(&mut alice, json!({"event": "channel:join", "payload": "nope"})).await;
    let frame = next_event(&mut alice).await;
    assert_eq!(frame.event, events::TOAST);
    assert_eq!(frame.payload["type"], "error");
    assert_eq!(frame.payload["message"], "Channel #nope does not exist");
}

#[tokio::test]
async fn missing_username_gets_a_guest_name() {
    let addr = start_gateway().await;

    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let bootstrap = next_named(&mut ws, events::BOOTSTRAP).await;
    assert!(
        bootstrap["username"]
            .as_str()
            .unwrap()
            .starts_with("guest-")
    );
}

#[tokio::test]
async fn malformed_frames_do_not_kill_the_connection() {
    let addr = start_gateway().await;

    let mut alice = connect(addr, "alice").await;
    next_named(&mut alice, events::PRESENCE_UPDATE).await;

    send_frame(&mut alice, json!({"not": "a frame"})).await;
    ws_send_raw(&mut alice, "this is not json").await;

    // Still alive and serviceable afterwards.
    send_frame(
        &mut alice,
        json!({"event": "message:send", "payload": {"text": "still here"}}),
    )
    .await;
    let msg = next_named(&mut alice, events::MESSAGE_NEW).await;
    assert_eq!(msg["text"], "still here");
}

async fn ws_send_raw(ws: &mut WsClient, raw: &str) {
    ws.send(Message::Text(raw.to_string().into())).await.unwrap();
}

#[tokio::test]
async fn health_endpoint_responds() {
    let addr = start_gateway().await;

    let body: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

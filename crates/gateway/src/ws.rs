use {
    axum::extract::ws::{Message, WebSocket},
    futures::{SinkExt, stream::StreamExt},
    serde_json::Value,
    tokio::sync::mpsc,
    tracing::{debug, info, warn},
};

use parlor_protocol::{ClientFrame, MAX_FRAME_BYTES, SendParams, events};

use crate::{hub::ConnectedClient, server::AppState};

/// Handle a single WebSocket connection through its full lifecycle:
/// register → broker connect → message loop → cleanup.
pub async fn handle_connection(socket: WebSocket, state: AppState, username: Option<String>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "ws: new connection");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (client_tx, mut client_rx) = mpsc::unbounded_channel::<String>();

    // Spawn write loop: forwards frames from the client_tx channel to the WebSocket.
    let write_conn_id = conn_id.clone();
    let write_handle = tokio::spawn(async move {
        while let Some(msg) = client_rx.recv().await {
            if ws_tx.send(Message::Text(msg.into())).await.is_err() {
                debug!(conn_id = %write_conn_id, "ws: write loop closed");
                break;
            }
        }
    });

    // The client must be reachable before the broker starts pushing: the
    // bootstrap and the first presence update go through the hub.
    state
        .hub
        .register_client(ConnectedClient::new(conn_id.clone(), client_tx.clone()))
        .await;
    state
        .broker
        .on_connect(&conn_id, username.as_deref().unwrap_or_default())
        .await;

    // ── Message loop ─────────────────────────────────────────────────────

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t.to_string(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "ws: read error");
                break;
            },
        };

        if text.len() > MAX_FRAME_BYTES {
            warn!(conn_id = %conn_id, size = text.len(), "ws: frame too large, dropping");
            continue;
        }

        let frame: ClientFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!(conn_id = %conn_id, error = %e, "ws: invalid frame, dropping");
                continue;
            },
        };

        dispatch(&state, &conn_id, frame).await;
    }

    // ── Cleanup ──────────────────────────────────────────────────────────

    state.hub.remove_client(&conn_id).await;
    state.broker.on_disconnect(&conn_id).await;
    info!(conn_id = %conn_id, "ws: connection closed");

    drop(client_tx);
    write_handle.abort();
}

async fn dispatch(state: &AppState, conn_id: &str, frame: ClientFrame) {
    match frame.event.as_str() {
        events::CHANNEL_JOIN => {
            let name = frame
                .payload
                .as_ref()
                .and_then(Value::as_str)
                .unwrap_or_default();
            state.broker.on_channel_join(conn_id, name).await;
        },
        events::MESSAGE_SEND => {
            let params: SendParams = frame
                .payload
                .and_then(|p| serde_json::from_value(p).ok())
                .unwrap_or_default();
            state.broker.on_message_send(conn_id, &params.text).await;
        },
        other => {
            debug!(conn_id = %conn_id, event = %other, "ws: unknown event, dropping");
        },
    }
}

//! Connect/join/send/disconnect orchestration.
//!
//! The broker is the only writer of channel and session state. It receives
//! connection-lifecycle occurrences from the transport, mutates the stores,
//! and decides what goes back out and to whom:
//!
//! - channel switches answer the requester alone (pull model),
//! - messages fan out to the channel's broadcast group,
//! - presence fans out to every connection.

pub mod transport;

pub use transport::Transport;

use std::{collections::HashMap, sync::Arc};

use {
    tokio::sync::Mutex,
    tracing::{debug, info, warn},
};

use {
    parlor_channels::ChannelStore,
    parlor_protocol::{Bootstrap, ChatMessage, PresenceUpdate, Toast, events, sanitize},
    parlor_sessions::SessionRegistry,
};

/// Protocol state machine for all connections.
///
/// Holds no per-session state of its own; everything lives in the registry
/// and the channel store so isolated instances can be built per test.
pub struct Broker {
    channels: Arc<ChannelStore>,
    sessions: Arc<SessionRegistry>,
    transport: Arc<dyn Transport>,
    /// One guard per channel, held across append + group broadcast so
    /// history order and delivery order agree. Distinct channels do not
    /// contend.
    send_guards: HashMap<String, Mutex<()>>,
}

impl Broker {
    pub fn new(
        channels: Arc<ChannelStore>,
        sessions: Arc<SessionRegistry>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let send_guards = channels
            .names()
            .map(|name| (name.to_string(), Mutex::new(())))
            .collect();
        Self {
            channels,
            sessions,
            transport,
            send_guards,
        }
    }

    /// A new connection arrived with a candidate username.
    pub async fn on_connect(&self, conn_id: &str, raw_username: &str) {
        let username = self.sessions.register(conn_id, raw_username).await;
        info!(conn_id = %conn_id, username = %username, "session connected");

        let bootstrap = Bootstrap {
            username,
            channels: self.channels.list().await,
        };
        if let Some(payload) = to_payload(&bootstrap) {
            self.transport
                .send_to(conn_id, events::BOOTSTRAP, payload)
                .await;
        }

        if let Some(session) = self.sessions.get(conn_id).await {
            self.transport.subscribe(conn_id, &session.channel).await;
        }
        self.broadcast_presence().await;
    }

    /// The connection asked to switch channels.
    pub async fn on_channel_join(&self, conn_id: &str, raw_name: &str) {
        let requested = sanitize::channel_name(raw_name);
        if !self.channels.exists(&requested) {
            let shown = if requested.is_empty() {
                "unknown"
            } else {
                requested.as_str()
            };
            let toast = Toast::error(format!("Channel #{shown} does not exist"));
            if let Some(payload) = to_payload(&toast) {
                self.transport.send_to(conn_id, events::TOAST, payload).await;
            }
            return;
        }

        let Some(session) = self.sessions.get(conn_id).await else {
            debug!(conn_id = %conn_id, "join from unregistered connection, dropping");
            return;
        };

        self.transport.unsubscribe(conn_id, &session.channel).await;
        if self.sessions.set_channel(conn_id, &requested).await.is_err() {
            debug!(conn_id = %conn_id, "session gone mid-switch, dropping");
            return;
        }
        self.transport.subscribe(conn_id, &requested).await;

        match self.channels.history(&requested).await {
            Ok(history) => {
                if let Some(payload) = to_payload(&history) {
                    self.transport
                        .send_to(conn_id, events::CHANNEL_HISTORY, payload)
                        .await;
                }
            },
            Err(e) => warn!(conn_id = %conn_id, error = %e, "history fetch failed after switch"),
        }
        debug!(conn_id = %conn_id, channel = %requested, "channel switched");
    }

    /// The connection sent a chat message.
    pub async fn on_message_send(&self, conn_id: &str, raw_text: &str) {
        let Some(session) = self.sessions.get(conn_id).await else {
            debug!(conn_id = %conn_id, "message from unregistered connection, dropping");
            return;
        };

        let text = sanitize::message_text(raw_text);
        if text.is_empty() {
            return;
        }

        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            channel: session.channel.clone(),
            author: session.username.clone(),
            text,
            timestamp: chrono::Utc::now(),
        };

        let Some(guard) = self.send_guards.get(&session.channel) else {
            warn!(conn_id = %conn_id, channel = %session.channel, "session points at unconfigured channel");
            return;
        };
        let _guard = guard.lock().await;
        if let Err(e) = self.channels.append(&session.channel, message.clone()).await {
            warn!(conn_id = %conn_id, error = %e, "message append failed");
            return;
        }
        if let Some(payload) = to_payload(&message) {
            self.transport
                .broadcast_to_group(&session.channel, events::MESSAGE_NEW, payload)
                .await;
        }
    }

    /// The transport reported connection loss. Idempotent: a duplicate signal
    /// changes nothing and broadcasts nothing.
    pub async fn on_disconnect(&self, conn_id: &str) {
        if !self.sessions.unregister(conn_id).await {
            return;
        }
        info!(conn_id = %conn_id, "session disconnected");
        self.broadcast_presence().await;
    }

    async fn broadcast_presence(&self) {
        let users = self.sessions.snapshot_usernames().await;
        let update = PresenceUpdate {
            count: users.len(),
            users,
        };
        if let Some(payload) = to_payload(&update) {
            self.transport
                .broadcast_to_all(events::PRESENCE_UPDATE, payload)
                .await;
        }
    }
}

fn to_payload<T: serde::Serialize>(value: &T) -> Option<serde_json::Value> {
    match serde_json::to_value(value) {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("failed to serialize outbound payload: {e}");
            None
        },
    }
}

use std::collections::{HashMap, HashSet};

use {
    async_trait::async_trait,
    serde_json::Value,
    tokio::sync::{RwLock, mpsc},
    tracing::{debug, warn},
};

use {parlor_broker::Transport, parlor_protocol::EventFrame};

// ── Connected client ─────────────────────────────────────────────────────────

/// A WebSocket client currently connected to the gateway.
#[derive(Debug)]
pub struct ConnectedClient {
    pub conn_id: String,
    /// Channel feeding this client's write-loop task.
    sender: mpsc::UnboundedSender<String>,
}

impl ConnectedClient {
    pub fn new(conn_id: impl Into<String>, sender: mpsc::UnboundedSender<String>) -> Self {
        Self {
            conn_id: conn_id.into(),
            sender,
        }
    }

    /// Queue a serialized frame for this client. Returns false when the
    /// write loop is gone.
    fn send(&self, frame: &str) -> bool {
        self.sender.send(frame.to_string()).is_ok()
    }
}

// ── Client hub ───────────────────────────────────────────────────────────────

/// Connected clients and channel broadcast groups: the gateway-side
/// implementation of the broker's transport.
///
/// Group membership is plain bookkeeping here; which connection belongs in
/// which group is decided entirely by the broker.
#[derive(Default)]
pub struct ClientHub {
    inner: RwLock<HubInner>,
}

#[derive(Default)]
struct HubInner {
    clients: HashMap<String, ConnectedClient>,
    groups: HashMap<String, HashSet<String>>,
}

impl ClientHub {
    pub async fn register_client(&self, client: ConnectedClient) {
        self.inner
            .write()
            .await
            .clients
            .insert(client.conn_id.clone(), client);
    }

    /// Drop a client and every group membership it holds. Idempotent.
    pub async fn remove_client(&self, conn_id: &str) -> bool {
        let mut inner = self.inner.write().await;
        for members in inner.groups.values_mut() {
            members.remove(conn_id);
        }
        inner.clients.remove(conn_id).is_some()
    }

    pub async fn client_count(&self) -> usize {
        self.inner.read().await.clients.len()
    }

    fn encode(event: &str, payload: Value) -> Option<String> {
        match serde_json::to_string(&EventFrame::new(event, payload)) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!(event = %event, "failed to serialize outbound frame: {e}");
                None
            },
        }
    }
}

#[async_trait]
impl Transport for ClientHub {
    async fn send_to(&self, conn_id: &str, event: &str, payload: Value) {
        let Some(json) = Self::encode(event, payload) else {
            return;
        };
        let inner = self.inner.read().await;
        if let Some(client) = inner.clients.get(conn_id)
            && !client.send(&json)
        {
            debug!(conn_id = %conn_id, "client write loop closed, dropping frame");
        }
    }

    async fn broadcast_to_group(&self, channel: &str, event: &str, payload: Value) {
        let Some(json) = Self::encode(event, payload) else {
            return;
        };
        let inner = self.inner.read().await;
        let Some(members) = inner.groups.get(channel) else {
            return;
        };
        debug!(channel = %channel, event = %event, members = members.len(), "group broadcast");
        for conn_id in members {
            if let Some(client) = inner.clients.get(conn_id) {
                client.send(&json);
            }
        }
    }

    async fn broadcast_to_all(&self, event: &str, payload: Value) {
        let Some(json) = Self::encode(event, payload) else {
            return;
        };
        let inner = self.inner.read().await;
        debug!(event = %event, clients = inner.clients.len(), "global broadcast");
        for client in inner.clients.values() {
            client.send(&json);
        }
    }

    async fn subscribe(&self, conn_id: &str, channel: &str) {
        self.inner
            .write()
            .await
            .groups
            .entry(channel.to_string())
            .or_default()
            .insert(conn_id.to_string());
    }

    async fn unsubscribe(&self, conn_id: &str, channel: &str) {
        if let Some(members) = self.inner.write().await.groups.get_mut(channel) {
            members.remove(conn_id);
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, serde_json::json};

    fn client(conn_id: &str) -> (ConnectedClient, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ConnectedClient::new(conn_id, tx), rx)
    }

    fn parse(frame: &str) -> EventFrame {
        serde_json::from_str(frame).unwrap()
    }

    #[tokio::test]
    async fn send_to_delivers_an_event_frame() {
        let hub = ClientHub::default();
        let (c, mut rx) = client("a");
        hub.register_client(c).await;

        hub.send_to("a", "toast", json!({"type": "error", "message": "no"}))
            .await;

        let frame = parse(&rx.recv().await.unwrap());
        assert_eq!(frame.event, "toast");
        assert_eq!(frame.payload["message"], "no");
    }

    #[tokio::test]
    async fn send_to_unknown_connection_is_a_noop() {
        let hub = ClientHub::default();
        hub.send_to("ghost", "toast", json!({})).await;
    }

    #[tokio::test]
    async fn group_broadcast_honors_membership() {
        let hub = ClientHub::default();
        let (a, mut rx_a) = client("a");
        let (b, mut rx_b) = client("b");
        hub.register_client(a).await;
        hub.register_client(b).await;
        hub.subscribe("a", "general").await;
        hub.subscribe("b", "random").await;

        hub.broadcast_to_group("general", "message:new", json!({"text": "hi"}))
            .await;

        assert_eq!(parse(&rx_a.recv().await.unwrap()).event, "message:new");
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_leaves_the_group() {
        let hub = ClientHub::default();
        let (a, mut rx_a) = client("a");
        hub.register_client(a).await;
        hub.subscribe("a", "general").await;
        hub.unsubscribe("a", "general").await;

        hub.broadcast_to_group("general", "message:new", json!({})).await;
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_to_all_reaches_every_client() {
        let hub = ClientHub::default();
        let (a, mut rx_a) = client("a");
        let (b, mut rx_b) = client("b");
        hub.register_client(a).await;
        hub.register_client(b).await;

        hub.broadcast_to_all("presence:update", json!({"count": 2}))
            .await;

        assert_eq!(parse(&rx_a.recv().await.unwrap()).payload["count"], 2);
        assert_eq!(parse(&rx_b.recv().await.unwrap()).payload["count"], 2);
    }

    #[tokio::test]
    async fn remove_client_strips_group_memberships() {
        let hub = ClientHub::default();
        let (a, _rx_a) = client("a");
        hub.register_client(a).await;
        hub.subscribe("a", "general").await;

        assert!(hub.remove_client("a").await);
        assert!(!hub.remove_client("a").await);
        assert_eq!(hub.client_count().await, 0);

        // No delivery attempt, and no panic, for the departed member.
        hub.broadcast_to_group("general", "message:new", json!({})).await;
    }
}

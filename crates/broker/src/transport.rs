use {async_trait::async_trait, serde_json::Value};

/// Delivery interface the broker drives, implemented by the real-time
/// transport layer (the gateway's client hub in production, a scripted fake
/// in tests).
///
/// All methods are best-effort pushes: a send to a closed or unknown
/// connection is a no-op, never an error. Group membership lives entirely on
/// the transport side; the broker only names groups by channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Push one event to a single connection.
    async fn send_to(&self, conn_id: &str, event: &str, payload: Value);

    /// Push one event to every connection subscribed to a channel.
    async fn broadcast_to_group(&self, channel: &str, event: &str, payload: Value);

    /// Push one event to every connection.
    async fn broadcast_to_all(&self, event: &str, payload: Value);

    /// Add a connection to a channel's broadcast group.
    async fn subscribe(&self, conn_id: &str, channel: &str);

    /// Remove a connection from a channel's broadcast group.
    async fn unsubscribe(&self, conn_id: &str, channel: &str);
}

use std::collections::HashMap;

use {rand::Rng, tokio::sync::RwLock};

use parlor_protocol::sanitize;

use crate::error::{Error, Result};

/// Server-side record of one live connection.
#[derive(Debug, Clone)]
pub struct Session {
    pub conn_id: String,
    pub username: String,
    /// The one channel this session is currently subscribed to.
    pub channel: String,
    seq: u64,
}

/// All currently connected sessions, keyed by connection id.
///
/// Every mutation takes the write lock, so a presence snapshot can never
/// observe a half-applied register/unregister/switch.
pub struct SessionRegistry {
    default_channel: String,
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    next_seq: u64,
}

impl SessionRegistry {
    pub fn new(default_channel: impl Into<String>) -> Self {
        Self {
            default_channel: default_channel.into(),
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Store a session for a new connection and return its resolved username.
    /// Empty usernames (after trimming) get a generated guest name.
    pub async fn register(&self, conn_id: &str, raw_username: &str) -> String {
        let username = resolve_username(raw_username);
        let mut inner = self.inner.write().await;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.sessions.insert(
            conn_id.to_string(),
            Session {
                conn_id: conn_id.to_string(),
                username: username.clone(),
                channel: self.default_channel.clone(),
                seq,
            },
        );
        username
    }

    /// Remove a session. Idempotent; returns whether one was actually
    /// removed, so duplicate disconnect signals broadcast nothing.
    pub async fn unregister(&self, conn_id: &str) -> bool {
        self.inner.write().await.sessions.remove(conn_id).is_some()
    }

    /// Point a session at a different channel. The channel's existence is the
    /// broker's concern, not the registry's.
    pub async fn set_channel(&self, conn_id: &str, channel: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let session = inner
            .sessions
            .get_mut(conn_id)
            .ok_or_else(|| Error::unknown_session(conn_id))?;
        session.channel = channel.to_string();
        Ok(())
    }

    pub async fn get(&self, conn_id: &str) -> Option<Session> {
        self.inner.read().await.sessions.get(conn_id).cloned()
    }

    /// Usernames of all connected sessions, in registration order. The
    /// presence count is this vector's length; it is never stored separately.
    pub async fn snapshot_usernames(&self) -> Vec<String> {
        let inner = self.inner.read().await;
        let mut sessions: Vec<&Session> = inner.sessions.values().collect();
        sessions.sort_by_key(|s| s.seq);
        sessions.into_iter().map(|s| s.username.clone()).collect()
    }
}

fn resolve_username(raw: &str) -> String {
    let cleaned = sanitize::username(raw);
    if cleaned.is_empty() {
        format!("guest-{}", rand::rng().random_range(0..1000))
    } else {
        cleaned
    }
}

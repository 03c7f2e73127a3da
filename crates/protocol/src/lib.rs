//! Parlor wire protocol definitions.
//!
//! All communication uses JSON text frames over a WebSocket.
//!
//! Frame types:
//! - `ClientFrame` — client → server event
//! - `EventFrame`  — server → client push
//!
//! Every exchange is a one-way push; there are no request/response pairs and
//! no delivery acknowledgements.

use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Hard ceiling on a single inbound frame. Chat messages are short; anything
/// larger is dropped before parsing.
pub const MAX_FRAME_BYTES: usize = 16_384; // 16 KB

/// Maximum message text length, in characters, after trimming.
pub const MAX_TEXT_CHARS: usize = 500;

/// Maximum username length, in characters, after trimming.
pub const MAX_USERNAME_CHARS: usize = 24;

// ── Event names ──────────────────────────────────────────────────────────────

pub mod events {
    // Client → server.
    pub const CHANNEL_JOIN: &str = "channel:join";
    pub const MESSAGE_SEND: &str = "message:send";

    // Server → client.
    pub const BOOTSTRAP: &str = "bootstrap";
    pub const CHANNEL_HISTORY: &str = "channel:history";
    pub const MESSAGE_NEW: &str = "message:new";
    pub const PRESENCE_UPDATE: &str = "presence:update";
    pub const TOAST: &str = "toast";
}

// ── Frames ───────────────────────────────────────────────────────────────────

/// Client → server event frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientFrame {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

/// Server → client push frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    pub payload: serde_json::Value,
}

impl EventFrame {
    pub fn new(event: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Payload of `message:send`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendParams {
    #[serde(default)]
    pub text: String,
}

// ── Payloads ─────────────────────────────────────────────────────────────────

/// A single chat message as stored and as pushed in `message:new`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub channel: String,
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// One channel with its client-visible history slice. Element of `bootstrap`,
/// full payload of `channel:history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelHistory {
    pub name: String,
    pub messages: Vec<ChatMessage>,
}

/// Payload of `bootstrap`, sent once per connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bootstrap {
    pub username: String,
    pub channels: Vec<ChannelHistory>,
}

/// Payload of `presence:update`, pushed to every connection on membership
/// change. `count` always equals `users.len()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceUpdate {
    pub count: usize,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Error,
    Info,
}

/// Payload of `toast`: a transient user-visible notice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toast {
    pub r#type: ToastKind,
    pub message: String,
}

impl Toast {
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            r#type: ToastKind::Error,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            r#type: ToastKind::Info,
            message: message.into(),
        }
    }
}

/// Row of the read-only `GET /api/channels` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub name: String,
    #[serde(rename = "messageCount")]
    pub message_count: usize,
}

// ── Sanitization ─────────────────────────────────────────────────────────────

/// Input cleaning shared by the broker and the session registry. All inbound
/// free-form strings pass through here before touching any store.
pub mod sanitize {
    use super::{MAX_TEXT_CHARS, MAX_USERNAME_CHARS};

    /// Trim and cap message text. May return an empty string; the caller
    /// decides whether that means "drop".
    #[must_use]
    pub fn message_text(raw: &str) -> String {
        truncate_chars(raw.trim(), MAX_TEXT_CHARS)
    }

    /// Trim, cap, and case-normalize a channel name.
    #[must_use]
    pub fn channel_name(raw: &str) -> String {
        truncate_chars(raw.trim(), MAX_TEXT_CHARS).to_lowercase()
    }

    /// Trim and cap a username. Empty output means the caller must
    /// substitute a generated name.
    #[must_use]
    pub fn username(raw: &str) -> String {
        truncate_chars(raw.trim(), MAX_USERNAME_CHARS)
    }

    /// Truncate to at most `max` characters on a char boundary.
    fn truncate_chars(s: &str, max: usize) -> String {
        match s.char_indices().nth(max) {
            Some((idx, _)) => s[..idx].to_string(),
            None => s.to_string(),
        }
    }
}

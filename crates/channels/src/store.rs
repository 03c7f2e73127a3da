use std::collections::{HashMap, VecDeque};

use tokio::sync::Mutex;

use parlor_protocol::{ChannelHistory, ChannelSummary, ChatMessage, sanitize};

use crate::error::{Error, Result};

/// In-memory store for the fixed channel set.
///
/// The set of channels is immutable after construction, so name lookups need
/// no synchronization; only each channel's history sits behind its own lock.
/// Two channels never contend with each other.
pub struct ChannelStore {
    channels: Vec<Channel>,
    by_name: HashMap<String, usize>,
    retention_cap: usize,
    visible_window: usize,
}

struct Channel {
    name: String,
    history: Mutex<VecDeque<ChatMessage>>,
}

impl ChannelStore {
    /// Build the store from configured channel names. Names are trimmed and
    /// case-normalized; duplicates collapse to the first occurrence.
    pub fn new<I, S>(names: I, retention_cap: usize, visible_window: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut channels = Vec::new();
        let mut by_name = HashMap::new();
        for raw in names {
            let name = sanitize::channel_name(raw.as_ref());
            if name.is_empty() || by_name.contains_key(&name) {
                continue;
            }
            by_name.insert(name.clone(), channels.len());
            channels.push(Channel {
                name,
                history: Mutex::new(VecDeque::new()),
            });
        }
        Self {
            channels,
            by_name,
            retention_cap,
            visible_window,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Configured channel names, in configuration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.name.as_str())
    }

    /// Every channel with its client-visible history slice, in configuration
    /// order. Sent once per connection in the bootstrap payload.
    pub async fn list(&self) -> Vec<ChannelHistory> {
        let mut out = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let history = channel.history.lock().await;
            out.push(ChannelHistory {
                name: channel.name.clone(),
                messages: Self::window(&history, self.visible_window),
            });
        }
        out
    }

    /// One channel's client-visible history slice.
    pub async fn history(&self, name: &str) -> Result<ChannelHistory> {
        let channel = self.channel(name)?;
        let history = channel.history.lock().await;
        Ok(ChannelHistory {
            name: channel.name.clone(),
            messages: Self::window(&history, self.visible_window),
        })
    }

    /// Append a message to a channel's history, evicting the oldest entry
    /// once the retention cap is exceeded.
    pub async fn append(&self, name: &str, message: ChatMessage) -> Result<()> {
        let channel = self.channel(name)?;
        let mut history = channel.history.lock().await;
        history.push_back(message);
        if history.len() > self.retention_cap {
            history.pop_front();
        }
        Ok(())
    }

    /// Per-channel message counts for the read-only listing endpoint.
    pub async fn summaries(&self) -> Vec<ChannelSummary> {
        let mut out = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let history = channel.history.lock().await;
            out.push(ChannelSummary {
                name: channel.name.clone(),
                message_count: history.len(),
            });
        }
        out
    }

    fn channel(&self, name: &str) -> Result<&Channel> {
        self.by_name
            .get(name)
            .map(|&idx| &self.channels[idx])
            .ok_or_else(|| Error::unknown_channel(name))
    }

    fn window(history: &VecDeque<ChatMessage>, visible: usize) -> Vec<ChatMessage> {
        history
            .iter()
            .skip(history.len().saturating_sub(visible))
            .cloned()
            .collect()
    }
}

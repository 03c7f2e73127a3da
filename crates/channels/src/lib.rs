//! Fixed channel set with bounded in-memory message history.
//!
//! Channels are created once at startup from configuration and never added or
//! removed afterwards. Each channel keeps a rolling window of recent messages:
//! appends past the retention cap evict the oldest entry. Listings expose a
//! separate, smaller client-visible window.

pub mod error;
pub mod store;

pub use {
    error::{Error, Result},
    store::ChannelStore,
};

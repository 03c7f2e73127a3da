//! Gateway: the HTTP/WebSocket shell around the chat broker.
//!
//! Lifecycle:
//! 1. Load + validate config
//! 2. Build the stores, the broker, and the client hub
//! 3. Bind and serve: `/health`, `/ws`, `/api/channels`
//!
//! The hub owns the connection side of the world (write loops, broadcast
//! groups) and is the broker's `Transport`; all protocol decisions live in
//! `parlor-broker`.

pub mod config;
pub mod hub;
pub mod server;
pub mod ws;

//! Registry of currently connected sessions.
//!
//! A session is the server-side record of one live connection: its resolved
//! username and the single channel it is subscribed to. The registry is the
//! only owner of session state; presence is always derived from a snapshot,
//! never maintained separately.

pub mod error;
pub mod registry;

pub use {
    error::{Error, Result},
    registry::{Session, SessionRegistry},
};

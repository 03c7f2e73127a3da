/// Crate-wide result type for session operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed session errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection id has no registered session. Benign during
    /// disconnect races; callers drop the triggering event.
    #[error("unknown session: {conn_id}")]
    UnknownSession { conn_id: String },
}

impl Error {
    #[must_use]
    pub fn unknown_session(conn_id: impl std::fmt::Display) -> Self {
        Self::UnknownSession {
            conn_id: conn_id.to_string(),
        }
    }
}

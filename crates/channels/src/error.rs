/// Crate-wide result type for channel operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Typed channel errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A requested channel name is not configured.
    #[error("unknown channel: {channel}")]
    UnknownChannel { channel: String },
}

impl Error {
    #[must_use]
    pub fn unknown_channel(channel: impl std::fmt::Display) -> Self {
        Self::UnknownChannel {
            channel: channel.to_string(),
        }
    }
}

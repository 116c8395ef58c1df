//! Sender Error Types
//!
//! Only [`MediaSender::try_send`](crate::MediaSender::try_send) returns these;
//! the public boolean surface logs them instead.

use derive_more::{Display, Error};

/// A sender error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sender operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    /// Neither a channel id nor a room the directory knows.
    #[display("unknown destination: {_0}")]
    UnknownDestination(#[error(not(source))] String),
    #[display("could not acquire media")]
    Acquire,
    /// Every item of a send failed.
    #[display("nothing to send")]
    NothingToSend,
    #[display("cache error")]
    Cache,
    #[display("storage error")]
    Storage,
    #[display("handoff to the messaging client failed")]
    Dispatch,
    #[display("could not bring {_0} to the foreground")]
    Launch(#[error(not(source))] String),
    /// Delayed work needs a running Tokio runtime.
    #[display("no async runtime available")]
    Runtime,
}

impl ErrorKind {
    /// Whether sending the same payload again could work.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Acquire | Self::Dispatch | Self::Storage)
    }
}

//! Errors raised while turning one input into a local file.

use derive_more::{Display, Error};
use std::path::PathBuf;
use std::time::Duration;

/// An acquisition error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for acquisition operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Why an item could not be acquired.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The input could not be recognised as any kind of source. Only empty
    /// text gets here; everything else is at least a guess at a local path.
    #[display("input is empty")]
    Classification,
    /// Malformed base64 or `data:` URL payload.
    #[display("could not decode inline payload")]
    Decode,
    /// Local file does not exist (or is not a regular file).
    #[display("no such local file: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Explicit file name contains reserved characters.
    #[display("invalid file name: {_0}")]
    InvalidName(#[error(not(source))] String),
    /// Download failed.
    #[display("could not download {_0}")]
    Transport(#[error(not(source))] String),
    #[display("cache error")]
    Cache,
    #[display("storage error")]
    Storage,
    /// Media index notification failed. Logged by callers, never propagated.
    #[display("media index notification failed")]
    MediaIndex,
    #[display("acquisition timed out after {_0:?}")]
    Timeout(#[error(not(source))] Duration),
}

impl ErrorKind {
    /// Transfer and disk failures may go away on a second attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_) | Self::Storage | Self::Cache)
    }
}

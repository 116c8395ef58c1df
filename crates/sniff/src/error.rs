//! Sniffing Error Types
//!
//! Detection itself never fails (an inconclusive sniff is `None`), so the
//! only errors here come from setting up the HTTP machinery used for remote
//! sniffing.

use derive_more::{Display, Error};

/// A sniffing error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for sniffing operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The HTTP client used for ranged fetches could not be constructed.
    #[display("failed to build HTTP client")]
    Client,
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        false
    }
}

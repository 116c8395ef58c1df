//! Cache errors. Failures of the underlying directory are attached as
//! children of [`ErrorKind::Storage`].

use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or writing the cache directory failed.
    #[display("cache storage error")]
    Storage,
    /// The index document could not be parsed. Never returned from
    /// [`Repository::load`](crate::Repository::load), which recovers by
    /// starting over with an empty index; kept for logging.
    #[display("cache index is corrupt")]
    IndexCorruption,
    /// A value that cannot belong to a well-formed cache.
    #[display("invalid cache data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage)
    }
}

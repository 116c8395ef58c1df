//! Storage errors.

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("no such file: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Roots must be absolute directories.
    #[display("unusable storage root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// Files are only imported from absolute locations.
    #[display("import source is not absolute: {}", _0.display())]
    RelativeSource(#[error(not(source))] PathBuf),
    #[display("invalid file name: {_0:?}")]
    InvalidFileName(#[error(not(source))] String),
    #[display("I/O error: {_0}")]
    Io(std::io::Error),
}

impl ErrorKind {
    pub(crate) fn from_io(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            _ => Self::Io(err),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}

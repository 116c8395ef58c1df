//! Flat media directories.
//!
//! Both the cache and the scratch directory for transient files are a single
//! level of files addressed by bare file name. Nothing here ever walks into a
//! subdirectory.

pub mod backend;
pub mod error;
mod models;
mod name;

pub use crate::backend::{ByteStream, StorageBackend};
pub use crate::models::StoredFile;
pub use crate::name::{sanitize_file_name, validate_file_name};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageBackend + Send + Sync>;

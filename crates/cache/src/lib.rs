//! Content-addressed media cache.
//!
//! Every cached file is keyed by a [`Digest`] of where it came from (the URL
//! of a download, or the bytes of an inline payload) and stored as
//! `<digest>.<ext>` next to a single JSON index document. The index is not
//! updated piecemeal: callers [`load`](Repository::load) it, mutate it in
//! memory, and [`persist`](Repository::persist) it once, which lets a batch of
//! acquisitions share a single read and a single write.
//!
//! # Architecture
//! - [`CacheIndex`] / [`CacheEntry`]: the persisted document,
//!   `{ "v": 1, "items": { "<digest>": { file, mime, ext, lastUsed, size } } }`.
//! - [`Repository`]: owns the cache directory and does all I/O (load, save,
//!   materialize, evict, clear).
//! - [`MetaUpdate`]: an entry produced without touching the index, for
//!   concurrent acquisitions that merge their results afterwards.

mod digest;
pub mod error;
mod index;
mod repo;

pub use crate::digest::Digest;
pub use crate::index::{CacheEntry, CacheIndex, INDEX_FILE, INDEX_VERSION, MetaUpdate};
pub use crate::repo::{CacheSource, ClearTarget, DEFAULT_MAX_ENTRIES, Repository};

/// Milliseconds since the Unix epoch, as stored in [`CacheEntry::last_used`].
pub fn now_millis() -> i64 {
    let nanos = time::OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

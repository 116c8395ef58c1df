//! Storage backends.
//!
//! Files handed to the messaging client must be real paths on the device, so
//! the only implementation is [`LocalBackend`].

mod local;

pub use self::local::LocalBackend;
use crate::StoredFile;
use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub type StoredFileStream<'a> = Pin<Box<dyn Stream<Item = Result<StoredFile>> + Send + 'a>>;

/// Chunked body of a download (or any other producer of bytes).
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + 'static>>;

/// A single directory of files, addressed by bare file name.
///
/// Every name goes through [`validate_file_name`](crate::validate_file_name)
/// before touching the filesystem, so no operation can reach outside the
/// directory.
///
/// ```
/// use parcel_storage::{backend::StorageBackend, error::Result};
///
/// async fn cached_size(backend: &dyn StorageBackend) -> Result<u64> {
///     if backend.exists("0f3a9c.png").await? {
///         Ok(backend.read("0f3a9c.png").await?.len() as u64)
///     } else {
///         Ok(0)
///     }
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str;

    /// Absolute location of `name`, suitable for handing to another process.
    fn local_path(&self, name: &str) -> Result<PathBuf>;

    /// Every complete file in the directory. Writes still in flight are not
    /// listed.
    fn list_stream(&self) -> StoredFileStream<'_>;

    async fn list(&self) -> Result<Vec<StoredFile>> {
        self.list_stream().try_collect().await
    }

    async fn exists(&self, name: &str) -> Result<bool>;

    /// Whole file. Fails with [`NotFound`](crate::error::ErrorKind::NotFound)
    /// if it is missing.
    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// At most the first `limit` bytes, for signature sniffing.
    async fn read_head(&self, name: &str, limit: usize) -> Result<Vec<u8>>;

    /// Replace `name` with `data`. Readers never observe a half-written file.
    async fn write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Drain `stream` into `name`, returning the number of bytes written.
    ///
    /// Nothing appears under `name` unless the stream ends cleanly; a failed
    /// transfer leaves any previous file in place.
    ///
    /// ```no_run
    /// use bytes::Bytes;
    /// use parcel_storage::ByteStream;
    /// # use parcel_storage::{backend::StorageBackend, error::Result};
    /// # async fn example(backend: &dyn StorageBackend) -> Result<()> {
    /// let chunks: ByteStream = Box::pin(futures::stream::iter([
    ///     Ok::<_, std::io::Error>(Bytes::from_static(b"GIF89a")),
    ///     Ok(Bytes::from_static(b"...")),
    /// ]));
    /// assert_eq!(backend.write_stream("anim.gif", chunks, 16384).await?, 9);
    /// # Ok(())
    /// # }
    /// ```
    async fn write_stream(&self, name: &str, stream: ByteStream, buffer_size: usize) -> Result<u64>;

    /// Copy an absolute `source` from anywhere on the device into `name`,
    /// returning the number of bytes copied.
    async fn import(&self, source: &Path, name: &str) -> Result<u64>;

    async fn delete(&self, name: &str) -> Result<()>;

    /// Rename within the directory, replacing any file already called `to`.
    async fn rename(&self, from: &str, to: &str) -> Result<()>;
}

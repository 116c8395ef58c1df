use crate::backend::{ByteStream, StoredFileStream};
use crate::error::{ErrorKind, Result};
use crate::{StorageBackend, StoredFile, validate_file_name};
use async_stream::stream;
use async_trait::async_trait;
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{self, DirEntry};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};

const PARTIAL_SUFFIX: &str = ".part";

static STAGED: AtomicU64 = AtomicU64::new(0);

fn is_partial(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(PARTIAL_SUFFIX)
}

/// Hidden sibling that a write lands in before being renamed over its
/// target. Removed on drop unless committed.
struct Staged {
    temp: PathBuf,
    target: PathBuf,
    committed: bool,
}

impl Staged {
    fn beside(target: PathBuf, name: &str) -> Self {
        let seq = STAGED.fetch_add(1, Ordering::Relaxed);
        let temp = target.with_file_name(format!(".{name}.{}.{seq}{PARTIAL_SUFFIX}", std::process::id()));
        Self { temp, target, committed: false }
    }

    async fn fill(&self, mut stream: ByteStream, buffer_size: usize) -> Result<u64> {
        let file = fs::File::create(&self.temp).await.map_err(|err| ErrorKind::from_io(err, &self.temp))?;
        let mut writer = BufWriter::with_capacity(buffer_size.max(1), file);
        let mut written = 0;
        while let Some(chunk) = stream.try_next().await.map_err(ErrorKind::Io)? {
            writer.write_all(&chunk).await.map_err(ErrorKind::Io)?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(ErrorKind::Io)?;
        Ok(written)
    }

    async fn commit(mut self) -> Result<()> {
        fs::rename(&self.temp, &self.target).await.map_err(|err| ErrorKind::from_io(err, &self.target))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if !self.committed {
            let _ = std::fs::remove_file(&self.temp);
        }
    }
}

/// A directory on the local filesystem.
///
/// ```no_run
/// use parcel_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = LocalBackend::new("cache", "/sdcard/botData/.cache")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LocalBackend {
    name: String,
    root: PathBuf,
}

impl LocalBackend {
    /// Use the absolute directory `root`, creating it if needed.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        // Runs once at startup; blocking is fine.
        if let Err(err) = std::fs::create_dir_all(&root) {
            tracing::warn!(root = %root.display(), %err, "could not create storage root");
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf> {
        Ok(self.root.join(validate_file_name(name)?))
    }

    async fn stored_file(entry: DirEntry) -> Result<Option<StoredFile>> {
        let metadata = entry.metadata().await.map_err(|err| ErrorKind::from_io(err, entry.path()))?;
        if !metadata.is_file() {
            return Ok(None);
        }
        let Ok(name) = entry.file_name().into_string() else {
            tracing::debug!(path = %entry.path().display(), "skipping file with a non UTF-8 name");
            return Ok(None);
        };
        if is_partial(&name) {
            return Ok(None);
        }
        Ok(Some(StoredFile { name, size: metadata.len() }))
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_path(&self, name: &str) -> Result<PathBuf> {
        self.path_of(name)
    }

    fn list_stream(&self) -> StoredFileStream<'_> {
        Box::pin(stream! {
            match fs::read_dir(&self.root).await {
                // A root deleted from under us is simply empty.
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {},
                Err(err) => yield Err(exn::Exn::from(ErrorKind::Io(err))),
                Ok(mut entries) => loop {
                    match entries.next_entry().await {
                        Ok(Some(entry)) => match Self::stored_file(entry).await {
                            Ok(Some(file)) => yield Ok(file),
                            Ok(None) => {},
                            Err(err) => yield Err(err),
                        },
                        Ok(None) => break,
                        Err(err) => {
                            yield Err(exn::Exn::from(ErrorKind::Io(err)));
                            break;
                        },
                    }
                },
            }
        })
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let path = self.path_of(name)?;
        Ok(fs::try_exists(&path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        Ok(fs::read(&path).await.map_err(|err| ErrorKind::from_io(err, &path))?)
    }

    async fn read_head(&self, name: &str, limit: usize) -> Result<Vec<u8>> {
        let path = self.path_of(name)?;
        let file = fs::File::open(&path).await.map_err(|err| ErrorKind::from_io(err, &path))?;
        let mut head = Vec::with_capacity(limit);
        file.take(limit as u64).read_to_end(&mut head).await.map_err(ErrorKind::Io)?;
        Ok(head)
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let staged = Staged::beside(self.path_of(name)?, name);
        fs::write(&staged.temp, data).await.map_err(|err| ErrorKind::from_io(err, &staged.temp))?;
        staged.commit().await
    }

    async fn write_stream(&self, name: &str, stream: ByteStream, buffer_size: usize) -> Result<u64> {
        let staged = Staged::beside(self.path_of(name)?, name);
        let written = staged.fill(stream, buffer_size).await?;
        staged.commit().await?;
        Ok(written)
    }

    async fn import(&self, source: &Path, name: &str) -> Result<u64> {
        if !source.is_absolute() {
            exn::bail!(ErrorKind::RelativeSource(source.to_path_buf()));
        }
        let staged = Staged::beside(self.path_of(name)?, name);
        let copied = fs::copy(source, &staged.temp).await.map_err(|err| ErrorKind::from_io(err, source))?;
        staged.commit().await?;
        Ok(copied)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let path = self.path_of(name)?;
        Ok(fs::remove_file(&path).await.map_err(|err| ErrorKind::from_io(err, &path))?)
    }

    async fn rename(&self, from: &str, to: &str) -> Result<()> {
        let from = self.path_of(from)?;
        let to = self.path_of(to)?;
        Ok(fs::rename(&from, &to).await.map_err(|err| ErrorKind::from_io(err, &from))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::TempDir;

    fn backend() -> (TempDir, LocalBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("test", dir.path()).unwrap();
        (dir, backend)
    }

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        let items: Vec<std::io::Result<Bytes>> = parts.iter().map(|part| Ok(Bytes::from_static(part))).collect();
        Box::pin(futures::stream::iter(items))
    }

    fn names_on_disk(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_new() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(".cache");
        LocalBackend::new("cache", &root).unwrap();
        assert!(root.is_dir());

        let err = LocalBackend::new("cache", "relative/.cache").unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidRoot(_)));

        let file = dir.path().join("index.json");
        std::fs::write(&file, b"{}").unwrap();
        assert!(LocalBackend::new("cache", &file).is_err());
    }

    #[test]
    fn test_local_path() {
        let (dir, backend) = backend();
        assert_eq!(backend.local_path("clip.mp4").unwrap(), dir.path().join("clip.mp4"));
        assert!(backend.local_path("../clip.mp4").is_err());
        assert!(backend.local_path("tmp/clip.mp4").is_err());
    }

    #[tokio::test]
    async fn test_write_replaces_atomically() {
        let (dir, backend) = backend();
        backend.write("index.json", b"{\"v\":1,\"items\":{}}").await.unwrap();
        backend.write("index.json", b"{}").await.unwrap();
        assert_eq!(backend.read("index.json").await.unwrap(), b"{}");
        assert_eq!(names_on_disk(&dir), ["index.json"]);
    }

    #[tokio::test]
    async fn test_write_stream() {
        let (_dir, backend) = backend();
        let written = backend.write_stream("anim.gif", chunks(&[b"GIF89a", b"frame", b"data"]), 4).await.unwrap();
        assert_eq!(written, 15);
        assert_eq!(backend.read("anim.gif").await.unwrap(), b"GIF89aframedata");
    }

    #[tokio::test]
    async fn test_failed_stream_keeps_previous_file() {
        let (dir, backend) = backend();
        backend.write("clip.mp4", b"original").await.unwrap();
        let broken: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::other("connection reset")),
        ]));
        let err = backend.write_stream("clip.mp4", broken, 16).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Io(_)));
        assert_eq!(backend.read("clip.mp4").await.unwrap(), b"original");
        assert_eq!(names_on_disk(&dir), ["clip.mp4"]);
    }

    #[tokio::test]
    async fn test_import() {
        let elsewhere = tempfile::tempdir().unwrap();
        let source = elsewhere.path().join("song.mp3");
        std::fs::write(&source, b"ID3 tagged").unwrap();

        let (_dir, backend) = backend();
        assert_eq!(backend.import(&source, "renamed.mp3").await.unwrap(), 10);
        assert_eq!(backend.read("renamed.mp3").await.unwrap(), b"ID3 tagged");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_import_errors() {
        let (dir, backend) = backend();
        let missing = dir.path().join("missing.png");
        let err = backend.import(&missing, "copy.png").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(path) if path == &missing));

        let err = backend.import(Path::new("relative.png"), "copy.png").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::RelativeSource(_)));
        assert!(!backend.exists("copy.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_read_head() {
        let (_dir, backend) = backend();
        backend.write("file.bin", b"0123456789ABCDEF").await.unwrap();
        assert_eq!(backend.read_head("file.bin", 5).await.unwrap(), b"01234");
        assert_eq!(backend.read_head("file.bin", 100).await.unwrap(), b"0123456789ABCDEF");
        let err = backend.read_head("missing.bin", 5).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_and_rename() {
        let (_dir, backend) = backend();
        backend.write("abc.jpg", b"data").await.unwrap();
        backend.rename("abc.jpg", "abc.png").await.unwrap();
        assert!(!backend.exists("abc.jpg").await.unwrap());
        assert_eq!(backend.read("abc.png").await.unwrap(), b"data");

        backend.delete("abc.png").await.unwrap();
        let err = backend.delete("abc.png").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_skips_partial_writes_and_directories() {
        let (dir, backend) = backend();
        backend.write("done.png", b"data").await.unwrap();
        std::fs::write(dir.path().join(".clip.mp4.1.0.part"), b"half").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested/inner.png"), b"data").unwrap();

        let files = backend.list().await.unwrap();
        assert_eq!(files, vec![StoredFile { name: "done.png".to_string(), size: 4 }]);
    }

    #[tokio::test]
    async fn test_list_missing_root() {
        let (dir, backend) = backend();
        std::fs::remove_dir(dir.path()).unwrap();
        assert!(backend.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_names() {
        let (_dir, backend) = backend();
        assert!(backend.read("../etc/passwd").await.is_err());
        assert!(backend.write("a/b.png", b"data").await.is_err());
        assert!(backend.delete("..").await.is_err());
        assert!(backend.write_stream("", chunks(&[b"x"]), 1).await.is_err());
    }
}

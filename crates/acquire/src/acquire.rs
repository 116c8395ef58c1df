use crate::context::Context;
use crate::error::{ErrorKind, Result};
use crate::source::{Input, Source, classify, decode_base64, decode_data_url};
use exn::{OptionExt, ResultExt};
use futures::TryStreamExt;
use parcel_cache::{CacheEntry, CacheIndex, CacheSource, Digest, MetaUpdate, now_millis};
use parcel_sniff::{DEFAULT_EXTENSION, detect_from_bytes, extension_for_mime, extension_from_path, mime_for};
use parcel_storage::{BackendHandle, ByteStream, validate_file_name};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::instrument;

/// Default per-item acquisition timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// One input plus the name it should be delivered under, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub input: Input,
    pub file_name: Option<String>,
}

impl Request {
    pub fn new(input: impl Into<Input>) -> Self {
        Self { input: input.into(), file_name: None }
    }

    /// Deliver under `name`. A name without an extension gets the detected
    /// one appended.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }
}

/// A file ready to hand off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquisition {
    pub local_path: PathBuf,
    pub mime: String,
    /// The file was written for this send and should be cleaned up after
    /// delivery. Cache files and in-place media are never transient.
    pub downloaded: bool,
    /// Cache record to merge later, for acquisitions run in
    /// [`IndexMode::Deferred`].
    pub meta_update: Option<MetaUpdate>,
}

/// How an acquisition reaches the cache index.
pub enum IndexMode<'a> {
    /// Load the index, update it and save it for this one acquisition.
    Standalone,
    /// Update an index owned by the caller, who saves it once at the end.
    Shared(&'a mut CacheIndex),
    /// Read a snapshot only; changes come back as [`Acquisition::meta_update`]
    /// for the caller to merge. For acquisitions running concurrently.
    Deferred(Arc<CacheIndex>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireOptions {
    pub timeout: Duration,
    pub use_cache: bool,
    /// Position in a batch. Keeps transient names of concurrent items apart.
    pub slot: Option<usize>,
}

impl Default for AcquireOptions {
    fn default() -> Self {
        Self { timeout: DEFAULT_TIMEOUT, use_cache: true, slot: None }
    }
}

/// Where a cache miss gets its content from.
enum Fetch<'a> {
    Bytes { bytes: &'a [u8], ext: &'static str },
    Download(&'a str),
}

/// Turns requests into local files.
#[derive(Clone)]
pub struct Acquirer {
    ctx: Context,
}

impl Acquirer {
    pub fn new(ctx: Context) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Acquire one request, writing transient files into `destination`.
    ///
    /// The whole acquisition, download included, must finish within
    /// `options.timeout`.
    #[instrument(skip_all, fields(slot = ?options.slot, use_cache = options.use_cache))]
    pub async fn acquire(
        &self,
        request: Request,
        destination: &BackendHandle,
        options: AcquireOptions,
        mode: IndexMode<'_>,
    ) -> Result<Acquisition> {
        match tokio::time::timeout(options.timeout, self.dispatch(request, destination, options, mode)).await {
            Ok(result) => result,
            Err(_) => exn::bail!(ErrorKind::Timeout(options.timeout)),
        }
    }

    async fn dispatch(
        &self,
        request: Request,
        destination: &BackendHandle,
        options: AcquireOptions,
        mode: IndexMode<'_>,
    ) -> Result<Acquisition> {
        let Request { input, file_name } = request;
        if let Some(name) = &file_name {
            validate_file_name(name).or_raise(|| ErrorKind::InvalidName(name.clone()))?;
        }
        let file_name = file_name.as_deref();

        let source = classify(input, &self.ctx.managed_roots)?;
        tracing::debug!(kind = source.kind(), "classified input");
        match source {
            Source::RemoteUrl(url) => self.acquire_remote(&url, file_name, destination, options, mode).await,
            Source::LocalPath(path) => self.acquire_local(path, file_name, destination).await,
            Source::Bytes(bytes) => self.acquire_bytes(bytes, None, file_name, destination, options, mode).await,
            Source::DataUrl { mime, payload, base64 } => {
                let bytes = decode_data_url(&payload, base64)?;
                self.acquire_bytes(bytes, mime.as_deref(), file_name, destination, options, mode).await
            },
            Source::Base64Text { payload } => {
                let bytes = decode_base64(&payload).ok_or_raise(|| ErrorKind::Decode)?;
                self.acquire_bytes(bytes, None, file_name, destination, options, mode).await
            },
        }
    }

    // =========================================================================
    // Per-source strategies
    // =========================================================================

    /// Content decides the extension; an asserted MIME type only breaks ties
    /// when the content is unrecognisable.
    async fn acquire_bytes(
        &self,
        bytes: Vec<u8>,
        asserted_mime: Option<&str>,
        file_name: Option<&str>,
        destination: &BackendHandle,
        options: AcquireOptions,
        mode: IndexMode<'_>,
    ) -> Result<Acquisition> {
        let ext = detect_from_bytes(&bytes)
            .or_else(|| asserted_mime.and_then(extension_for_mime))
            .unwrap_or(DEFAULT_EXTENSION);

        if options.use_cache {
            let digest = Digest::for_bytes(&bytes);
            let (entry, meta_update) = self.cached(digest, Fetch::Bytes { bytes: &bytes, ext }, mode).await?;
            return self.deliver_cached(entry, meta_update, file_name, destination).await;
        }

        let name = transient_name(file_name, ext, options.slot);
        destination.write(&name, &bytes).await.or_raise(|| ErrorKind::Storage)?;
        self.finish(destination, &name, ext).await
    }

    async fn acquire_remote(
        &self,
        url: &str,
        file_name: Option<&str>,
        destination: &BackendHandle,
        options: AcquireOptions,
        mode: IndexMode<'_>,
    ) -> Result<Acquisition> {
        if options.use_cache {
            let (entry, meta_update) = self.cached(Digest::for_url(url), Fetch::Download(url), mode).await?;
            return self.deliver_cached(entry, meta_update, file_name, destination).await;
        }

        let ext = self.ctx.sniffer.extension_for_reference(url).await;
        let name = transient_name(file_name, ext, options.slot);
        let stream = self.download(url).await?;
        let size = destination
            .write_stream(&name, stream, self.ctx.buffer_size)
            .await
            .or_raise(|| ErrorKind::Transport(url.to_string()))?;
        tracing::info!(%name, size, "downloaded");
        self.finish(destination, &name, ext).await
    }

    /// Files under a managed root are sent in place unless a name was asked
    /// for; anything else is copied into `destination`.
    async fn acquire_local(
        &self,
        path: PathBuf,
        file_name: Option<&str>,
        destination: &BackendHandle,
    ) -> Result<Acquisition> {
        let path = std::path::absolute(&path).or_raise(|| ErrorKind::NotFound(path.clone()))?;
        let metadata = tokio::fs::metadata(&path).await.or_raise(|| ErrorKind::NotFound(path.clone()))?;
        if !metadata.is_file() {
            exn::bail!(ErrorKind::NotFound(path));
        }
        let ext = self.local_extension(&path).await;

        if file_name.is_none() && self.ctx.is_managed(&path) {
            tracing::debug!(path = %path.display(), "sending managed file in place");
            self.ctx.notify_media_index(&path).await;
            return Ok(Acquisition { local_path: path, mime: mime_for(ext).to_string(), downloaded: false, meta_update: None });
        }

        let name = match file_name {
            Some(name) => with_extension(name, ext),
            None => path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_raise(|| ErrorKind::InvalidName(path.display().to_string()))?
                .to_string(),
        };
        destination.import(&path, &name).await.or_raise(|| ErrorKind::Storage)?;
        self.finish(destination, &name, ext).await
    }

    // =========================================================================
    // Cache
    // =========================================================================

    async fn cached(
        &self,
        digest: Digest,
        fetch: Fetch<'_>,
        mode: IndexMode<'_>,
    ) -> Result<(CacheEntry, Option<MetaUpdate>)> {
        let cache = &self.ctx.cache;
        match mode {
            IndexMode::Standalone => {
                let mut index = cache.load().await.or_raise(|| ErrorKind::Cache)?;
                let entry = self.lookup_or_fetch(&mut index, digest, fetch).await?;
                cache.persist(&mut index).await.or_raise(|| ErrorKind::Cache)?;
                Ok((entry, None))
            },
            IndexMode::Shared(index) => Ok((self.lookup_or_fetch(index, digest, fetch).await?, None)),
            IndexMode::Deferred(snapshot) => {
                let entry = match cache.get(&snapshot, &digest).await.or_raise(|| ErrorKind::Cache)? {
                    Some(mut entry) => {
                        entry.last_used = now_millis();
                        entry
                    },
                    None => {
                        let (source, ext) = self.open(fetch).await?;
                        cache.materialize(&digest, source, ext).await.or_raise(|| ErrorKind::Cache)?
                    },
                };
                let update = MetaUpdate { digest, entry: entry.clone() };
                Ok((entry, Some(update)))
            },
        }
    }

    /// A hit is touched and returned before any network or decode work.
    async fn lookup_or_fetch(&self, index: &mut CacheIndex, digest: Digest, fetch: Fetch<'_>) -> Result<CacheEntry> {
        let cache = &self.ctx.cache;
        if let Some(mut entry) = cache.get(index, &digest).await.or_raise(|| ErrorKind::Cache)? {
            entry.last_used = now_millis();
            index.touch(&digest, entry.last_used);
            return Ok(entry);
        }
        let (source, ext) = self.open(fetch).await?;
        cache.put(index, digest, source, ext).await.or_raise(|| ErrorKind::Cache)
    }

    /// Start producing content for a miss, with the best extension guess.
    async fn open<'a>(&self, fetch: Fetch<'a>) -> Result<(CacheSource<'a>, &'static str)> {
        match fetch {
            Fetch::Bytes { bytes, ext } => Ok((CacheSource::Bytes(bytes), ext)),
            Fetch::Download(url) => {
                let ext = self.ctx.sniffer.extension_for_reference(url).await;
                Ok((CacheSource::Stream(self.download(url).await?), ext))
            },
        }
    }

    /// Hand out the cache file itself, or a named copy of it.
    async fn deliver_cached(
        &self,
        entry: CacheEntry,
        meta_update: Option<MetaUpdate>,
        file_name: Option<&str>,
        destination: &BackendHandle,
    ) -> Result<Acquisition> {
        let cached = self.ctx.cache.local_path(&entry).or_raise(|| ErrorKind::Cache)?;
        let acquisition = match file_name {
            None => Acquisition { local_path: cached, mime: entry.mime, downloaded: false, meta_update },
            Some(name) => {
                let name = with_extension(name, &entry.ext);
                destination.import(&cached, &name).await.or_raise(|| ErrorKind::Storage)?;
                let local_path = destination.local_path(&name).or_raise(|| ErrorKind::Storage)?;
                Acquisition { local_path, mime: entry.mime, downloaded: true, meta_update }
            },
        };
        self.ctx.notify_media_index(&acquisition.local_path).await;
        Ok(acquisition)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn download(&self, url: &str) -> Result<ByteStream> {
        let response = self
            .ctx
            .client
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .or_raise(|| ErrorKind::Transport(url.to_string()))?;
        Ok(Box::pin(response.bytes_stream().map_err(std::io::Error::other)))
    }

    /// Trusted extension from the path, else the file's own head.
    async fn local_extension(&self, path: &Path) -> &'static str {
        if let Some(ext) = path.to_str().and_then(extension_from_path) {
            return ext;
        }
        match read_head(path, self.ctx.sniffer.window()).await {
            Ok(head) => detect_from_bytes(&head).unwrap_or(DEFAULT_EXTENSION),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "could not sniff local file");
                DEFAULT_EXTENSION
            },
        }
    }

    /// Wrap up a transient file written to `destination`.
    async fn finish(&self, destination: &BackendHandle, name: &str, ext: &str) -> Result<Acquisition> {
        let local_path = destination.local_path(name).or_raise(|| ErrorKind::Storage)?;
        self.ctx.notify_media_index(&local_path).await;
        Ok(Acquisition { local_path, mime: mime_for(ext).to_string(), downloaded: true, meta_update: None })
    }
}

async fn read_head(path: &Path, bytes: usize) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut head = Vec::with_capacity(bytes);
    file.take(bytes as u64).read_to_end(&mut head).await?;
    Ok(head)
}

/// `photo` becomes `photo.png`; `photo.jpeg` stays as it is.
fn with_extension(name: &str, ext: &str) -> String {
    if Path::new(name).extension().is_some() { name.to_string() } else { format!("{name}.{ext}") }
}

/// Name for a transient file: the requested name, or a timestamp with the
/// batch slot appended.
fn transient_name(file_name: Option<&str>, ext: &str, slot: Option<usize>) -> String {
    match (file_name, slot) {
        (Some(name), _) => with_extension(name, ext),
        (None, Some(slot)) => format!("{}_{slot}.{ext}", now_millis()),
        (None, None) => format!("{}.{ext}", now_millis()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::MediaIndex;
    use crate::testing::{GIF, PNG, TestServer};
    use async_trait::async_trait;
    use parcel_cache::Repository;
    use parcel_storage::backend::LocalBackend;
    use rstest::rstest;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PathBuf>>);

    #[async_trait]
    impl MediaIndex for Recorder {
        async fn notify(&self, path: &Path) -> crate::error::Result<()> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        acquirer: Acquirer,
        destination: BackendHandle,
        notified: Arc<Recorder>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let cache = Repository::new(dir.path().join(".cache"), 10).unwrap();
            let notified = Arc::new(Recorder::default());
            let ctx = Context::new(cache, reqwest::Client::new())
                .with_managed_roots(vec![dir.path().join("media")])
                .with_media_index(notified.clone());
            let destination: BackendHandle = Arc::new(LocalBackend::new("tmp", dir.path().join("tmp")).unwrap());
            Self { dir, acquirer: Acquirer::new(ctx), destination, notified }
        }

        fn cache(&self) -> &Repository {
            &self.acquirer.context().cache
        }

        async fn acquire(&self, request: Request, use_cache: bool) -> Result<Acquisition> {
            let options = AcquireOptions { use_cache, ..AcquireOptions::default() };
            self.acquirer.acquire(request, &self.destination, options, IndexMode::Standalone).await
        }
    }

    fn png_data_url() -> String {
        format!("data:image/png;base64,{}", base64::Engine::encode(&base64::engine::general_purpose::STANDARD, PNG))
    }

    #[tokio::test]
    async fn test_bytes_served_from_cache() {
        let fx = Fixture::new();
        let acquisition = fx.acquire(Request::new(PNG), true).await.unwrap();

        assert!(!acquisition.downloaded);
        assert_eq!(acquisition.mime, "image/png");
        assert_eq!(acquisition.local_path, fx.cache().root().join(Digest::for_bytes(PNG).file_name("png")));
        assert_eq!(std::fs::read(&acquisition.local_path).unwrap(), PNG);
        assert_eq!(fx.cache().load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_bytes_twice_write_once() {
        let fx = Fixture::new();
        let first = fx.acquire(Request::new(PNG), true).await.unwrap();
        let written = std::fs::metadata(&first.local_path).unwrap().modified().unwrap();
        let second = fx.acquire(Request::new(PNG), true).await.unwrap();

        assert_eq!(first.local_path, second.local_path);
        assert_eq!(std::fs::metadata(&second.local_path).unwrap().modified().unwrap(), written);
        assert_eq!(fx.cache().load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_named_copy_of_cache_file_is_transient() {
        let fx = Fixture::new();
        let acquisition = fx.acquire(Request::new(png_data_url()).named("photo"), true).await.unwrap();

        assert!(acquisition.downloaded);
        assert_eq!(acquisition.local_path, fx.dir.path().join("tmp/photo.png"));
        assert_eq!(std::fs::read(&acquisition.local_path).unwrap(), PNG);
        // The cache still holds the original.
        assert_eq!(fx.cache().load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_uncached_bytes_go_straight_to_destination() {
        let fx = Fixture::new();
        let acquisition = fx.acquire(Request::new(format!("base64:{}", "R0lGODlhAQABAAAAADs=")), false).await.unwrap();

        assert!(acquisition.downloaded);
        assert_eq!(acquisition.mime, "image/gif");
        assert!(acquisition.local_path.starts_with(fx.dir.path().join("tmp")));
        assert_eq!(acquisition.local_path.extension().unwrap(), "gif");
        assert!(!fx.cache().index_path().exists());
    }

    #[rstest]
    // Unrecognisable content: the asserted type wins.
    #[case("data:text/plain,hello%20world", "text/plain")]
    // Recognisable content: the asserted type is ignored.
    #[case("data:text/plain;base64,R0lGODlhAQABAAAAADs=", "image/gif")]
    // Nothing to go on at all.
    #[case("base64:aGVsbG8=", "image/jpeg")]
    #[tokio::test]
    async fn test_inline_type_resolution(#[case] input: &str, #[case] mime: &str) {
        let fx = Fixture::new();
        let acquisition = fx.acquire(Request::new(input), false).await.unwrap();
        assert_eq!(acquisition.mime, mime);
    }

    #[tokio::test]
    async fn test_malformed_base64() {
        let fx = Fixture::new();
        let err = fx.acquire(Request::new("data:image/png;base64,!!!!"), true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Decode));
    }

    #[tokio::test]
    async fn test_remote_downloaded_once() {
        let server = TestServer::start("200 OK", PNG).await;
        let fx = Fixture::new();
        let url = server.url("images/logo.png");

        let first = fx.acquire(Request::new(url.as_str()), true).await.unwrap();
        let second = fx.acquire(Request::new(url.as_str()), true).await.unwrap();

        assert_eq!(server.downloads(), 1);
        assert_eq!(first.local_path, second.local_path);
        assert_eq!(first.local_path, fx.cache().root().join(Digest::for_url(&url).file_name("png")));
        assert_eq!(std::fs::read(&second.local_path).unwrap(), PNG);
    }

    #[tokio::test]
    async fn test_remote_without_extension_is_sniffed() {
        let server = TestServer::start("200 OK", GIF).await;
        let fx = Fixture::new();
        let acquisition = fx.acquire(Request::new(server.url("view.php?id=7")), true).await.unwrap();

        assert_eq!(acquisition.mime, "image/gif");
        assert_eq!(server.sniffs(), 1);
        assert_eq!(server.downloads(), 1);
    }

    #[tokio::test]
    async fn test_remote_hit_skips_sniffing() {
        let server = TestServer::start("200 OK", GIF).await;
        let fx = Fixture::new();
        let url = server.url("view.php?id=7");
        fx.acquire(Request::new(url.as_str()), true).await.unwrap();
        fx.acquire(Request::new(url.as_str()), true).await.unwrap();
        assert_eq!(server.sniffs(), 1);
        assert_eq!(server.downloads(), 1);
    }

    #[tokio::test]
    async fn test_remote_wrong_extension_corrected() {
        let server = TestServer::start("200 OK", GIF).await;
        let fx = Fixture::new();
        let acquisition = fx.acquire(Request::new(server.url("pretend.png")), true).await.unwrap();
        assert_eq!(acquisition.mime, "image/gif");
        assert_eq!(acquisition.local_path.extension().unwrap(), "gif");
    }

    #[tokio::test]
    async fn test_remote_uncached() {
        let server = TestServer::start("200 OK", PNG).await;
        let fx = Fixture::new();
        let acquisition = fx.acquire(Request::new(server.url("a.png")).named("logo"), false).await.unwrap();

        assert!(acquisition.downloaded);
        assert_eq!(acquisition.local_path, fx.dir.path().join("tmp/logo.png"));
        assert_eq!(std::fs::read(&acquisition.local_path).unwrap(), PNG);
        assert!(!fx.cache().index_path().exists());
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    #[tokio::test]
    async fn test_remote_error_status(#[case] use_cache: bool) {
        let server = TestServer::start("404 Not Found", b"nope").await;
        let fx = Fixture::new();
        let err = fx.acquire(Request::new(server.url("gone.png")), use_cache).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Transport(_)));
        assert_eq!(fx.cache().load().await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = TestServer::start_with_delay("200 OK", PNG, Duration::from_secs(5)).await;
        let fx = Fixture::new();
        let options = AcquireOptions { timeout: Duration::from_millis(100), ..AcquireOptions::default() };
        let err = fx
            .acquirer
            .acquire(Request::new(server.url("slow.png")), &fx.destination, options, IndexMode::Standalone)
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Timeout(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_managed_local_file_sent_in_place() {
        let fx = Fixture::new();
        let path = fx.dir.path().join("media/DCIM/cat.jpg");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let acquisition = fx.acquire(Request::new(path.to_str().unwrap()), true).await.unwrap();
        assert_eq!(acquisition.local_path, path);
        assert!(!acquisition.downloaded);
        assert_eq!(acquisition.mime, "image/jpeg");
        assert_eq!(*fx.notified.0.lock().unwrap(), vec![path]);
    }

    #[tokio::test]
    async fn test_managed_local_file_with_name_is_copied() {
        let fx = Fixture::new();
        let path = fx.dir.path().join("media/cat.jpg");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"meow").unwrap();

        let acquisition = fx.acquire(Request::new(path.to_str().unwrap()).named("kitty"), true).await.unwrap();
        assert_eq!(acquisition.local_path, fx.dir.path().join("tmp/kitty.jpg"));
        assert!(acquisition.downloaded);
    }

    #[tokio::test]
    async fn test_unmanaged_local_file_keeps_base_name() {
        let fx = Fixture::new();
        let path = fx.dir.path().join("elsewhere/report");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"%PDF-1.7 body").unwrap();

        let acquisition = fx.acquire(Request::new(path.to_str().unwrap()), true).await.unwrap();
        assert_eq!(acquisition.local_path, fx.dir.path().join("tmp/report"));
        assert_eq!(acquisition.mime, "application/pdf");
        assert!(acquisition.downloaded);
        assert_eq!(std::fs::read(&acquisition.local_path).unwrap(), b"%PDF-1.7 body");
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let fx = Fixture::new();
        let missing = fx.dir.path().join("nope.png");
        let err = fx.acquire(Request::new(missing.to_str().unwrap()), true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(path) if *path == missing));
    }

    #[rstest]
    #[case("a/b")]
    #[case("..")]
    #[case("what?")]
    #[tokio::test]
    async fn test_invalid_name(#[case] name: &str) {
        let fx = Fixture::new();
        let err = fx.acquire(Request::new(PNG).named(name), true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidName(_)));
    }

    #[tokio::test]
    async fn test_shared_index_is_not_saved() {
        let fx = Fixture::new();
        let mut index = CacheIndex::default();
        let options = AcquireOptions::default();
        fx.acquirer.acquire(Request::new(PNG), &fx.destination, options, IndexMode::Shared(&mut index)).await.unwrap();

        assert_eq!(index.len(), 1);
        assert!(!fx.cache().index_path().exists());
    }

    #[tokio::test]
    async fn test_deferred_miss_and_hit() {
        let fx = Fixture::new();
        let options = AcquireOptions::default();

        let snapshot = Arc::new(CacheIndex::default());
        let miss = fx
            .acquirer
            .acquire(Request::new(PNG), &fx.destination, options, IndexMode::Deferred(snapshot))
            .await
            .unwrap();
        let update = miss.meta_update.clone().unwrap();
        assert_eq!(update.digest, Digest::for_bytes(PNG));
        assert!(!fx.cache().index_path().exists());

        let mut index = CacheIndex::default();
        index.apply(update.clone());
        let hit = fx
            .acquirer
            .acquire(Request::new(PNG), &fx.destination, options, IndexMode::Deferred(Arc::new(index)))
            .await
            .unwrap();
        let touched = hit.meta_update.unwrap();
        assert_eq!(hit.local_path, miss.local_path);
        assert_eq!(touched.entry.file, update.entry.file);
        assert!(touched.entry.last_used >= update.entry.last_used);
    }

    #[test]
    fn test_transient_name() {
        assert_eq!(transient_name(Some("photo"), "png", Some(3)), "photo.png");
        assert_eq!(transient_name(Some("photo.jpeg"), "png", None), "photo.jpeg");

        let plain = transient_name(None, "png", None);
        assert!(plain.strip_suffix(".png").unwrap().parse::<i64>().is_ok());

        let slotted = transient_name(None, "png", Some(3));
        let (timestamp, slot) = slotted.strip_suffix(".png").unwrap().split_once('_').unwrap();
        assert!(timestamp.parse::<i64>().is_ok());
        assert_eq!(slot, "3");
    }
}

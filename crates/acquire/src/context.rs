use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use parcel_cache::Repository;
use parcel_sniff::{DEFAULT_SNIFF_WINDOW, RangeSniffer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;
const DEFAULT_RANGE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tells the platform's media indexer about new files so that galleries and
/// other apps can see them.
#[async_trait]
pub trait MediaIndex: Send + Sync {
    async fn notify(&self, path: &Path) -> Result<()>;
}

/// Media index that does nothing, for hosts without one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMediaIndex;

#[async_trait]
impl MediaIndex for NoopMediaIndex {
    async fn notify(&self, path: &Path) -> Result<()> {
        tracing::trace!(path = %path.display(), "media index notification skipped");
        Ok(())
    }
}

/// Everything an acquisition needs besides its input.
#[derive(Clone)]
pub struct Context {
    pub cache: Repository,
    pub client: reqwest::Client,
    pub sniffer: RangeSniffer,
    /// Storage prefixes whose files can be sent in place.
    pub managed_roots: Vec<PathBuf>,
    /// Write buffer size for uncached downloads.
    pub buffer_size: usize,
    pub media_index: Arc<dyn MediaIndex>,
}

impl Context {
    /// A context with default limits sharing `client` between downloads and
    /// ranged sniffing.
    pub fn new(cache: Repository, client: reqwest::Client) -> Self {
        let sniffer = RangeSniffer::with_client(client.clone(), DEFAULT_SNIFF_WINDOW, DEFAULT_RANGE_TIMEOUT);
        Self {
            cache,
            client,
            sniffer,
            managed_roots: Vec::new(),
            buffer_size: DEFAULT_BUFFER_SIZE,
            media_index: Arc::new(NoopMediaIndex),
        }
    }

    /// Build an HTTP client with `connect_timeout` and wrap it in a context.
    pub fn with_default_client(cache: Repository, connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .or_raise(|| ErrorKind::Transport("client setup".to_string()))?;
        Ok(Self::new(cache, client))
    }

    pub fn with_sniffer(mut self, sniffer: RangeSniffer) -> Self {
        self.sniffer = sniffer;
        self
    }

    pub fn with_managed_roots(mut self, roots: Vec<PathBuf>) -> Self {
        self.managed_roots = roots;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    pub fn with_media_index(mut self, media_index: Arc<dyn MediaIndex>) -> Self {
        self.media_index = media_index;
        self
    }

    /// Whether `path` lies under one of the managed storage roots.
    pub fn is_managed(&self, path: &Path) -> bool {
        self.managed_roots.iter().any(|root| path.starts_with(root))
    }

    /// Best-effort media index notification. Skipped if the file is not
    /// there; failures are logged and swallowed.
    pub async fn notify_media_index(&self, path: &Path) {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return;
        }
        if let Err(err) = self.media_index.notify(path).await {
            tracing::warn!(path = %path.display(), error = ?err, "media index notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<PathBuf>>);

    #[async_trait]
    impl MediaIndex for Recorder {
        async fn notify(&self, path: &Path) -> Result<()> {
            self.0.lock().unwrap().push(path.to_path_buf());
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl MediaIndex for Failing {
        async fn notify(&self, _path: &Path) -> Result<()> {
            exn::bail!(ErrorKind::MediaIndex)
        }
    }

    fn context(dir: &tempfile::TempDir) -> Context {
        let cache = Repository::new(dir.path().join(".cache"), 10).unwrap();
        Context::new(cache, reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_notify_only_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = Arc::new(Recorder::default());
        let ctx = context(&dir).with_media_index(recorder.clone());

        let present = dir.path().join("present.jpg");
        std::fs::write(&present, b"x").unwrap();
        ctx.notify_media_index(&present).await;
        ctx.notify_media_index(&dir.path().join("absent.jpg")).await;

        assert_eq!(*recorder.0.lock().unwrap(), vec![present]);
    }

    #[tokio::test]
    async fn test_notify_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir).with_media_index(Arc::new(Failing));
        let present = dir.path().join("present.jpg");
        std::fs::write(&present, b"x").unwrap();
        ctx.notify_media_index(&present).await;
    }

    #[test]
    fn test_is_managed() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir).with_managed_roots(vec![PathBuf::from("/sdcard")]);
        assert!(ctx.is_managed(Path::new("/sdcard/DCIM/a.jpg")));
        assert!(!ctx.is_managed(Path::new("/sdcardx/a.jpg")));
        assert!(!ctx.is_managed(Path::new("/tmp/a.jpg")));
    }
}

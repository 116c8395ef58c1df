//! Cache directory management.
//!
//! The repository owns every byte under the cache directory: the index
//! document and one file per entry. It never holds an index itself; callers
//! pass one in, which is what lets a batch share a single load and save.

use crate::error::{ErrorKind, Result};
use crate::{CacheEntry, CacheIndex, Digest, INDEX_FILE, INDEX_VERSION, MetaUpdate, now_millis};
use exn::ResultExt;
use parcel_sniff::{DEFAULT_EXTENSION, DEFAULT_SNIFF_WINDOW, detect_signature, mime_for};
use parcel_storage::backend::LocalBackend;
use parcel_storage::error::ErrorKind as StorageErrorKind;
use parcel_storage::{ByteStream, StorageBackend};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Maximum number of entries kept after eviction, unless configured otherwise.
pub const DEFAULT_MAX_ENTRIES: usize = 200;
const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;

/// Where the content of a new cache entry comes from.
pub enum CacheSource<'a> {
    /// An in-memory payload (decoded base64, raw bytes).
    Bytes(&'a [u8]),
    /// A chunked body, typically an HTTP download. Only consumed on a miss.
    Stream(ByteStream),
}

/// What [`Repository::clear`] should remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearTarget {
    /// Every cache file (the index document is reset, not deleted).
    All,
    /// One entry, named by digest or cache file name (`"abc123.png"`).
    One(String),
    /// Several entries, as for [`One`](Self::One).
    Many(Vec<String>),
}

/// Content-addressed store rooted at a single directory.
#[derive(Clone)]
pub struct Repository {
    backend: LocalBackend,
    max_entries: usize,
    buffer_size: usize,
    sniff_window: usize,
}

impl Repository {
    /// Open (creating if needed) the cache directory at `root`, which must be
    /// absolute.
    pub fn new(root: impl AsRef<Path>, max_entries: usize) -> Result<Self> {
        let backend = LocalBackend::new("cache", root).or_raise(|| ErrorKind::Storage)?;
        Ok(Self {
            backend,
            max_entries: max_entries.max(1),
            buffer_size: DEFAULT_BUFFER_SIZE,
            sniff_window: DEFAULT_SNIFF_WINDOW,
        })
    }

    /// Size of the write buffer used when streaming downloads to disk.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Number of leading bytes inspected when correcting extensions.
    pub fn with_sniff_window(mut self, sniff_window: usize) -> Self {
        self.sniff_window = sniff_window.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        self.backend.root()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn index_path(&self) -> PathBuf {
        self.root().join(INDEX_FILE)
    }

    /// Absolute path of an entry's backing file.
    pub fn local_path(&self, entry: &CacheEntry) -> Result<PathBuf> {
        self.backend.local_path(&entry.file).or_raise(|| ErrorKind::InvalidData("cache file name"))
    }

    // =========================================================================
    // Index document
    // =========================================================================

    /// Load the index document.
    ///
    /// A missing document is an empty cache. A document that cannot be parsed
    /// (or carries an unknown schema version) is logged and replaced by an
    /// empty index; the files it described become orphans that
    /// [`clear`](Self::clear) will still remove.
    #[instrument(skip(self), fields(cache = %self.root().display()))]
    pub async fn load(&self) -> Result<CacheIndex> {
        let raw = match self.backend.read(INDEX_FILE).await {
            Ok(raw) => raw,
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => return Ok(CacheIndex::default()),
            Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
        };
        let parsed: Result<CacheIndex> = serde_json::from_slice(&raw).or_raise(|| ErrorKind::IndexCorruption);
        match parsed {
            Ok(index) if index.v == INDEX_VERSION => Ok(index),
            Ok(index) => {
                tracing::warn!(version = index.v, "unsupported cache index version; starting with an empty index");
                Ok(CacheIndex::default())
            },
            Err(err) => {
                tracing::warn!(error = ?err, "cache index is corrupt; starting with an empty index");
                Ok(CacheIndex::default())
            },
        }
    }

    /// Write the index document (atomically replacing the previous one).
    pub async fn save(&self, index: &CacheIndex) -> Result<()> {
        let raw = serde_json::to_vec(index).or_raise(|| ErrorKind::InvalidData("cache index"))?;
        self.backend.write(INDEX_FILE, &raw).await.or_raise(|| ErrorKind::Storage)
    }

    /// Evict down to the entry limit, then save.
    pub async fn persist(&self, index: &mut CacheIndex) -> Result<()> {
        self.evict(index).await;
        self.save(index).await
    }

    /// Load, apply deferred updates, evict and save, all in one pass.
    #[instrument(skip_all, fields(updates = updates.len()))]
    pub async fn merge(&self, updates: Vec<MetaUpdate>) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let mut index = self.load().await?;
        for update in updates {
            index.apply(update);
        }
        self.persist(&mut index).await
    }

    // =========================================================================
    // Entries
    // =========================================================================

    /// Look up an entry whose backing file still exists.
    ///
    /// An entry whose file has disappeared is a miss, not an error.
    pub async fn get(&self, index: &CacheIndex, digest: &Digest) -> Result<Option<CacheEntry>> {
        let Some(entry) = index.entry(digest) else {
            tracing::debug!(%digest, "cache miss");
            return Ok(None);
        };
        if self.backend.exists(&entry.file).await.unwrap_or(false) {
            tracing::debug!(%digest, file = %entry.file, "cache hit");
            Ok(Some(entry.clone()))
        } else {
            tracing::debug!(%digest, file = %entry.file, "cache entry is stale; backing file is gone");
            Ok(None)
        }
    }

    /// Mark an entry as used now.
    pub fn touch(&self, index: &mut CacheIndex, digest: &Digest) -> bool {
        index.touch(digest, now_millis())
    }

    /// Return the entry for `digest`, creating its file from `source` first if
    /// the entry is missing or stale.
    ///
    /// A hit is touched and returned without consuming `source`. A miss
    /// replaces any previous record for the digest; if the new file name
    /// differs (the extension changed), the old file is left in place until
    /// eviction or [`clear`](Self::clear) removes it.
    #[instrument(skip(self, index, source), fields(%digest))]
    pub async fn put(
        &self,
        index: &mut CacheIndex,
        digest: Digest,
        source: CacheSource<'_>,
        ext_hint: &str,
    ) -> Result<CacheEntry> {
        if let Some(mut entry) = self.get(index, &digest).await? {
            entry.last_used = now_millis();
            index.touch(&digest, entry.last_used);
            return Ok(entry);
        }
        let entry = self.materialize(&digest, source, ext_hint).await?;
        if let Some(previous) = index.insert(digest, entry.clone())
            && previous.file != entry.file
        {
            tracing::debug!(old = %previous.file, new = %entry.file, "replaced cache record under a new file name");
        }
        Ok(entry)
    }

    /// Write the file for `digest` without touching any index, returning the
    /// entry that describes it.
    ///
    /// The extension hint is only a guess (usually from a URL). Once the file
    /// is on disk its head is sniffed, and if the content clearly belongs to a
    /// different format the file is renamed to match.
    #[instrument(skip(self, source), fields(%digest))]
    pub async fn materialize(&self, digest: &Digest, source: CacheSource<'_>, ext_hint: &str) -> Result<CacheEntry> {
        let mut ext = normalize_extension(ext_hint);
        let mut file = digest.file_name(&ext);
        let size = match source {
            CacheSource::Bytes(bytes) => {
                self.backend.write(&file, bytes).await.or_raise(|| ErrorKind::Storage)?;
                bytes.len() as u64
            },
            CacheSource::Stream(stream) => self
                .backend
                .write_stream(&file, stream, self.buffer_size)
                .await
                .or_raise(|| ErrorKind::Storage)?,
        };

        let head = self.backend.read_head(&file, self.sniff_window).await.or_raise(|| ErrorKind::Storage)?;
        if let Some(signature) = detect_signature(&head)
            && !signature.extensions.contains(&ext.as_str())
        {
            let corrected = digest.file_name(signature.extension());
            self.backend.rename(&file, &corrected).await.or_raise(|| ErrorKind::Storage)?;
            tracing::debug!(from = %ext, to = signature.extension(), "corrected cache file extension from content");
            ext = signature.extension().to_string();
            file = corrected;
        }

        tracing::info!(%file, size, "cached");
        Ok(CacheEntry { mime: mime_for(&ext).to_string(), file, ext, last_used: now_millis(), size })
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Drop least-recently-used entries until the index is within the entry
    /// limit, returning how many were dropped.
    ///
    /// Records are removed even if deleting their files fails; those failures
    /// are logged and the files become orphans.
    pub async fn evict(&self, index: &mut CacheIndex) -> usize {
        let excess = index.len().saturating_sub(self.max_entries);
        if excess == 0 {
            return 0;
        }
        let doomed: BTreeSet<Digest> = index.lru_order().into_iter().take(excess).cloned().collect();
        let files = doomed.iter().filter_map(|digest| index.remove(digest)).map(|entry| entry.file).collect();
        self.delete_files(&doomed, files).await;
        tracing::info!(evicted = excess, remaining = index.len(), "evicted least recently used cache entries");
        excess
    }

    /// Remove cache entries and their files, returning the number of files
    /// deleted. Unknown entries are ignored.
    #[instrument(skip(self))]
    pub async fn clear(&self, target: ClearTarget) -> Result<usize> {
        match target {
            ClearTarget::All => self.clear_all().await,
            ClearTarget::One(name) => self.clear_named(std::slice::from_ref(&name)).await,
            ClearTarget::Many(names) => self.clear_named(&names).await,
        }
    }

    async fn clear_all(&self) -> Result<usize> {
        let files = self.backend.list().await.or_raise(|| ErrorKind::Storage)?;
        let mut deleted = 0;
        for file in files.iter().filter(|file| file.name != INDEX_FILE) {
            match self.backend.delete(&file.name).await {
                Ok(()) => deleted += 1,
                Err(err) => tracing::warn!(file = %file.name, error = ?err, "failed to delete cache file"),
            }
        }
        self.save(&CacheIndex::default()).await?;
        tracing::info!(deleted, "cleared cache");
        Ok(deleted)
    }

    async fn clear_named(&self, names: &[String]) -> Result<usize> {
        let mut index = self.load().await?;
        let mut digests = BTreeSet::new();
        let mut files = Vec::new();
        for name in names {
            let Some(digest) = Digest::from_file_name(name) else {
                tracing::debug!(%name, "ignoring cache clear target without a digest");
                continue;
            };
            if let Some(entry) = index.remove(&digest) {
                files.push(entry.file);
            }
            digests.insert(digest);
        }
        let deleted = self.delete_files(&digests, files).await;
        self.save(&index).await?;
        tracing::info!(targets = digests.len(), deleted, "cleared cache entries");
        Ok(deleted)
    }

    /// Delete the given files plus any other file in the cache directory named
    /// after one of `digests` (left behind by extension corrections).
    async fn delete_files(&self, digests: &BTreeSet<Digest>, known: Vec<String>) -> usize {
        let mut targets: BTreeSet<String> = known.into_iter().collect();
        match self.backend.list().await {
            Ok(listing) => {
                let siblings = listing
                    .iter()
                    .map(|stored| stored.name.as_str())
                    .filter(|name| *name != INDEX_FILE)
                    .filter(|name| Digest::from_file_name(name).is_some_and(|digest| digests.contains(&digest)));
                targets.extend(siblings.map(str::to_string));
            },
            Err(err) => tracing::warn!(error = ?err, "failed to list cache directory; deleting recorded files only"),
        }

        let mut deleted = 0;
        for file in targets {
            match self.backend.delete(&file).await {
                Ok(()) => deleted += 1,
                Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {},
                Err(err) => tracing::warn!(%file, error = ?err, "failed to delete cache file"),
            }
        }
        deleted
    }
}

/// Lower-case, dot-free extension safe to use in a file name.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return DEFAULT_EXTENSION.to_string();
    }
    ext
}

use crate::Digest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Schema version written to (and expected in) the index document.
pub const INDEX_VERSION: u32 = 1;
/// File name of the index document inside the cache directory.
pub const INDEX_FILE: &str = "index.json";

/// One cached file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// File name relative to the cache directory (`<digest>.<ext>`).
    pub file: String,
    pub mime: String,
    pub ext: String,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "lastUsed")]
    pub last_used: i64,
    pub size: u64,
}

/// An entry created outside of any loaded index, to be merged in later.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaUpdate {
    pub digest: Digest,
    pub entry: CacheEntry,
}

/// The persisted cache index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheIndex {
    pub v: u32,
    #[serde(default)]
    pub items: BTreeMap<Digest, CacheEntry>,
}

impl Default for CacheIndex {
    fn default() -> Self {
        Self { v: INDEX_VERSION, items: BTreeMap::new() }
    }
}

impl CacheIndex {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn entry(&self, digest: &Digest) -> Option<&CacheEntry> {
        self.items.get(digest)
    }

    /// Record `entry` under `digest`, returning whatever it replaced.
    pub fn insert(&mut self, digest: Digest, entry: CacheEntry) -> Option<CacheEntry> {
        self.items.insert(digest, entry)
    }

    pub fn remove(&mut self, digest: &Digest) -> Option<CacheEntry> {
        self.items.remove(digest)
    }

    /// Mark an entry as used at `at` (milliseconds). Returns `false` if the
    /// digest is unknown.
    pub fn touch(&mut self, digest: &Digest, at: i64) -> bool {
        match self.items.get_mut(digest) {
            Some(entry) => {
                entry.last_used = at;
                true
            },
            None => false,
        }
    }

    /// Apply a deferred update. The update always wins: it describes a file
    /// that was just written.
    pub fn apply(&mut self, update: MetaUpdate) -> Option<CacheEntry> {
        self.insert(update.digest, update.entry)
    }

    /// Digests from least to most recently used. Entries used at the same
    /// millisecond are ordered by digest.
    pub fn lru_order(&self) -> Vec<&Digest> {
        let mut order: Vec<(&Digest, i64)> = self.items.iter().map(|(d, e)| (d, e.last_used)).collect();
        order.sort_by(|(a_digest, a_used), (b_digest, b_used)| a_used.cmp(b_used).then_with(|| a_digest.cmp(b_digest)));
        order.into_iter().map(|(digest, _)| digest).collect()
    }
}

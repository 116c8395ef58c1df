use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Hash-domain prefix for remote references.
const URL_DOMAIN: &[u8] = b"URL|";
/// Hash-domain prefix for inline payloads.
const BYTES_DOMAIN: &[u8] = b"BIN|";

/// Cache key: hex-encoded BLAKE3 of a domain prefix followed by the source.
///
/// The prefixes keep the two namespaces apart, so a payload whose bytes
/// happen to spell out a URL never collides with that URL's download.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    fn hash(domain: &[u8], payload: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(domain);
        hasher.update(payload);
        Self(hasher.finalize().to_hex().to_string())
    }

    /// Digest of a remote reference (the URL string as given).
    pub fn for_url(url: &str) -> Self {
        Self::hash(URL_DOMAIN, url.as_bytes())
    }

    /// Digest of an inline payload.
    pub fn for_bytes(bytes: &[u8]) -> Self {
        Self::hash(BYTES_DOMAIN, bytes)
    }

    /// Recover a digest from a cache file name or path, e.g.
    /// `"/sdcard/botData/.cache/abc123.png"` → `abc123`.
    ///
    /// Returns `None` when nothing is left after stripping directories and
    /// the extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let base = Path::new(name).file_name()?.to_str()?;
        let stem = base.split_once('.').map_or(base, |(stem, _)| stem);
        (!stem.is_empty()).then(|| Self(stem.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the cache file holding this digest's content.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{ext}", self.0)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

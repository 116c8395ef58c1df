//! Layered configuration.
//!
//! Values are resolved, lowest priority first, from:
//!
//! 1. built-in defaults ([`Config::default`]),
//! 2. an optional TOML, YAML or JSON file,
//! 3. environment variables prefixed with `PARCEL_`, using `__` to reach
//!    nested keys (`PARCEL_CACHE__MAX_ENTRIES=50`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix of environment variables that override configuration values.
pub const ENV_PREFIX: &str = "PARCEL_";
/// Name of the cache directory inside the media root.
pub const CACHE_DIR_NAME: &str = ".cache";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Entries kept after eviction.
    pub max_entries: usize,
    /// Whether sends go through the cache unless told otherwise.
    pub enabled_by_default: bool,
}
impl Default for CacheConfig {
    fn default() -> Self {
        Self { max_entries: 200, enabled_by_default: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Per-item acquisition timeout.
    pub timeout_ms: u64,
    /// Leading bytes read for signature sniffing.
    pub sniff_window: usize,
    /// Write buffer size for downloads and copies.
    pub buffer_size: usize,
    pub range_connect_timeout_ms: u64,
    pub range_read_timeout_ms: u64,
}
impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            sniff_window: 256,
            buffer_size: 16 * 1024,
            range_connect_timeout_ms: 5_000,
            range_read_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Shared storage prefixes. Strings starting with one of these are local
    /// paths, and files below them are sent in place.
    pub managed_roots: Vec<PathBuf>,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { managed_roots: vec![PathBuf::from("/sdcard"), PathBuf::from("/storage/emulated/0")] }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Package of the messaging client that receives the handoff.
    pub package: String,
    /// Package brought back to the foreground after a send when the caller
    /// names none (usually the host app itself).
    pub host_package: Option<String>,
    /// Delay before transient files are deleted.
    pub cleanup_delay_secs: u64,
    /// Default delay before bringing the host app back to the foreground.
    pub foreground_delay_ms: u64,
}
impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            package: "com.kakao.talk".to_string(),
            host_package: None,
            cleanup_delay_secs: 60,
            foreground_delay_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the bot's media directory; the cache lives in `.cache` below it.
    pub media_root: PathBuf,
    /// Where transient files are written. Defaults to `<media_root>/tmp`.
    pub temp_dir: Option<PathBuf>,
    pub cache: CacheConfig,
    pub transfer: TransferConfig,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
    /// Room name to channel id, for destinations given by name.
    pub rooms: BTreeMap<String, u64>,
}
impl Default for Config {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from("/sdcard/botData"),
            temp_dir: None,
            cache: CacheConfig::default(),
            transfer: TransferConfig::default(),
            storage: StorageConfig::default(),
            delivery: DeliveryConfig::default(),
            rooms: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Location of the user's configuration file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "parcel").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Assemble the provider stack without extracting it.
    ///
    /// An explicit `path` must exist; otherwise the [default
    /// path](Self::default_path) is used if present.
    pub fn figment(path: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.exists()),
        };
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "loading configuration file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(&file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(&file)),
                Some("json") => figment.merge(Json::file(&file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file)),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate a configuration from any figment.
    pub fn from_figment(figment: &Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()?;
        Ok(config)
    }

    /// Load defaults, the configuration file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_figment(&Self::figment(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.max_entries == 0 {
            exn::bail!(ErrorKind::Invalid("cache.max_entries must be at least 1"));
        }
        if self.transfer.sniff_window == 0 {
            exn::bail!(ErrorKind::Invalid("transfer.sniff_window must be at least 1"));
        }
        if self.transfer.buffer_size == 0 {
            exn::bail!(ErrorKind::Invalid("transfer.buffer_size must be at least 1"));
        }
        if !self.media_root.is_absolute() {
            exn::bail!(ErrorKind::Invalid("media_root must be an absolute path"));
        }
        if self.temp_dir.as_ref().is_some_and(|dir| !dir.is_absolute()) {
            exn::bail!(ErrorKind::Invalid("temp_dir must be an absolute path"));
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.media_root.join(CACHE_DIR_NAME)
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(|| self.media_root.join("tmp"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.transfer.timeout_ms)
    }

    pub fn range_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer.range_connect_timeout_ms)
    }

    pub fn range_read_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer.range_read_timeout_ms)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.delivery.cleanup_delay_secs)
    }

    pub fn foreground_delay(&self) -> Duration {
        Duration::from_millis(self.delivery.foreground_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn write(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn from_file(path: &Path) -> Result<Config> {
        // Leave the environment out so tests don't depend on the caller's shell.
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let figment = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => figment.merge(Toml::file(path)),
            Some("json") => figment.merge(Json::file(path)),
            _ => figment.merge(Yaml::file(path)),
        };
        Config::from_figment(&figment)
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.cache_dir(), Path::new("/sdcard/botData/.cache"));
        assert_eq!(config.temp_dir(), Path::new("/sdcard/botData/tmp"));
        assert_eq!(config.cache.max_entries, 200);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.transfer.sniff_window, 256);
        assert_eq!(config.transfer.buffer_size, 16384);
        assert_eq!(config.cleanup_delay(), Duration::from_secs(60));
        assert_eq!(config.foreground_delay(), Duration::from_millis(5000));
    }

    #[test]
    fn test_toml_overrides_nested_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "config.toml",
            r#"
                media_root = "/data/bot"
                temp_dir = "/data/scratch"

                [cache]
                max_entries = 5

                [rooms]
                "Family" = 18230000000001
            "#,
        );
        let config = from_file(&path).unwrap();
        assert_eq!(config.cache_dir(), Path::new("/data/bot/.cache"));
        assert_eq!(config.temp_dir(), Path::new("/data/scratch"));
        assert_eq!(config.cache.max_entries, 5);
        // Untouched siblings keep their defaults
        assert!(config.cache.enabled_by_default);
        assert_eq!(config.rooms.get("Family"), Some(&18230000000001));
    }

    #[test]
    fn test_json_and_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let json = write(&dir, "config.json", r#"{"transfer": {"timeout_ms": 1000}}"#);
        assert_eq!(from_file(&json).unwrap().timeout(), Duration::from_secs(1));
        let yaml = write(&dir, "config.yaml", "delivery:\n  package: org.example.chat\n");
        assert_eq!(from_file(&yaml).unwrap().delivery.package, "org.example.chat");
    }

    #[rstest]
    #[case("[cache]\nmax_entries = 0")]
    #[case("[transfer]\nsniff_window = 0")]
    #[case("[transfer]\nbuffer_size = 0")]
    #[case("media_root = \"relative/root\"")]
    #[case("temp_dir = \"tmp\"")]
    fn test_invalid_values(#[case] contents: &str) {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.toml", contents);
        let err = from_file(&path).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid(_)));
    }

    #[test]
    fn test_explicit_missing_file() {
        let err = Config::figment(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "config.ini", "media_root=/x");
        let err = Config::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }
}

//! Best-effort TTL cache for upstream API responses.
//!
//! Entries are stored as JSON `{ "payload": ..., "timestamp": <epoch millis> }`
//! under a key built by [`cache_key`]. An entry is valid while
//! `now - timestamp < ttl` (one hour by default); expired or unreadable entries are
//! evicted on read and reported as absent.
//!
//! **Write failures never reach the caller.** A full disk or a read-only cache
//! directory degrades to "no caching" with a warning, nothing more.
//!
//! **No transactional read-then-write.** Two concurrent loads for the same key may
//! both miss and both write. Entries are idempotent snapshots, so last write wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Clock;

/// Default time-to-live for every cached upstream response
pub const DEFAULT_TTL_MINUTES: i64 = 60;

/// Raw key-value persistence behind [`TtlCache`]
pub trait CacheStore: Send + Sync {
    /// Stored value for `key`, `None` when absent or unreadable
    fn read(&self, key: &str) -> Option<String>;

    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; missing keys are not an error
    fn evict(&self, key: &str);
}

/// Build a cache key from a source tag and an identity (username, repo, model id).
///
/// The identity is escaped so the key is safe as a file name and distinct
/// identities never collide: bytes outside `[A-Za-z0-9.-]` become `_XX` (hex),
/// and `_` itself is always escaped. `source` is expected to be a fixed
/// identifier without `.`.
pub fn cache_key(source: &str, identity: &str) -> String {
    let mut key = String::with_capacity(source.len() + identity.len() + 1);
    key.push_str(source);
    key.push('.');
    for byte in identity.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
            key.push(byte as char);
        } else {
            key.push_str(&format!("_{:02x}", byte));
        }
    }
    key
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    payload: T,
    timestamp: i64,
}

/// Typed cache with a fixed time-to-live over an injected store and clock
pub struct TtlCache<'a> {
    store: &'a dyn CacheStore,
    clock: &'a dyn Clock,
    ttl: Duration,
}

impl<'a> TtlCache<'a> {
    pub fn new(store: &'a dyn CacheStore, clock: &'a dyn Clock) -> Self {
        Self::with_ttl(store, clock, Duration::minutes(DEFAULT_TTL_MINUTES))
    }

    pub fn with_ttl(store: &'a dyn CacheStore, clock: &'a dyn Clock, ttl: Duration) -> Self {
        Self { store, clock, ttl }
    }

    /// Fresh payload for `key`, or `None` (absent, expired, or malformed)
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.read(key)?;

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("discarding malformed cache entry {key}: {e}");
                self.store.evict(key);
                return None;
            }
        };

        let age_ms = self.clock.now_millis().saturating_sub(entry.timestamp);
        if age_ms < self.ttl.num_milliseconds() {
            debug!("cache hit for {key} (age {}s)", age_ms / 1000);
            Some(entry.payload)
        } else {
            debug!("cache entry {key} expired");
            self.store.evict(key);
            None
        }
    }

    /// Store `payload` under `key`, stamped with the current time.
    ///
    /// Failures are logged and swallowed.
    pub fn set<T: Serialize>(&self, key: &str, payload: &T) {
        let entry = CacheEntry {
            payload,
            timestamp: self.clock.now_millis(),
        };
        let json = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                warn!("failed to serialize cache entry {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.store.write(key, &json) {
            warn!("failed to write cache entry {key} (continuing without cache): {e:#}");
        }
    }
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}

impl CacheStore for MemoryStore {
    fn read(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn evict(&self, key: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }
}

/// One zstd-compressed JSON file per key under a cache directory
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json.zst"))
    }
}

impl CacheStore for FileStore {
    fn read(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }
        match load_compressed(&path) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("failed to load cache entry (proceeding cold): {e:#}");
                self.evict(key);
                None
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create directory: {}", self.dir.display()))?;
        let path = self.entry_path(key);
        let compressed =
            zstd::encode_all(value.as_bytes(), 3).context("failed to compress cache entry")?;
        std::fs::write(&path, &compressed)
            .with_context(|| format!("failed to write cache entry: {}", path.display()))
    }

    fn evict(&self, key: &str) {
        let path = self.entry_path(key);
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("failed to evict cache entry {}: {e}", path.display());
            }
        }
    }
}

fn load_compressed(path: &Path) -> Result<String> {
    let compressed = std::fs::read(path)
        .with_context(|| format!("failed to read cache entry: {}", path.display()))?;
    let bytes = zstd::decode_all(compressed.as_slice())
        .with_context(|| format!("failed to decompress cache entry: {}", path.display()))?;
    String::from_utf8(bytes).context("cache entry is not valid UTF-8")
}

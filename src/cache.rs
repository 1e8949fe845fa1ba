/// Durable TTL cache for proxied insights responses.
///
/// A single service object constructed at startup with an injected file
/// path and default TTL. The store is reloaded from disk at process start
/// (dropping expired and corrupted entries) and persisted on every write.
/// Concurrent access serializes through one async mutex guarding the
/// read-modify-write of the backing map.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::Mutex;

/// One cached value with its absolute expiry (unix seconds) and a SHA-256
/// checksum guarding against on-disk tampering or corruption.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    expiry: i64,
    checksum: String,
}

impl CacheEntry {
    fn new(value: Value, expiry: i64) -> Self {
        let checksum = compute_checksum(&value);
        Self {
            value,
            expiry,
            checksum,
        }
    }

    /// Entries past their expiry are treated as absent on read.
    fn is_fresh(&self, now: i64) -> bool {
        now < self.expiry
    }

    fn is_valid(&self) -> bool {
        compute_checksum(&self.value) == self.checksum
    }
}

fn compute_checksum(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

pub struct FileCache {
    path: PathBuf,
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl FileCache {
    /// Loads the cache from `path`, dropping entries that are expired or
    /// fail checksum validation. A missing or unreadable file starts an
    /// empty cache rather than failing startup.
    pub async fn load(path: impl Into<PathBuf>, default_ttl: Duration) -> Self {
        let path = path.into();
        let mut entries: HashMap<String, CacheEntry> = HashMap::new();

        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => match serde_json::from_str::<HashMap<String, CacheEntry>>(&raw) {
                Ok(stored) => {
                    let now = Utc::now().timestamp();
                    let total = stored.len();
                    for (key, entry) in stored {
                        if !entry.is_fresh(now) {
                            continue;
                        }
                        if !entry.is_valid() {
                            tracing::warn!(
                                "Dropping cache entry with checksum mismatch: {}",
                                key
                            );
                            continue;
                        }
                        entries.insert(key, entry);
                    }
                    tracing::info!(
                        "Cache loaded from {}: {} of {} entries kept",
                        path.display(),
                        entries.len(),
                        total
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        "Cache file {} is not valid JSON, starting empty: {}",
                        path.display(),
                        e
                    );
                }
            },
            Err(_) => {
                tracing::info!("No cache file at {}, starting empty", path.display());
            }
        }

        Self {
            path,
            default_ttl,
            entries: Mutex::new(entries),
        }
    }

    /// Returns the cached value for `key`, evicting it first when expired.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let mut entries = self.entries.lock().await;
        let now = Utc::now().timestamp();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Caches `value` under `key` for the default TTL.
    pub async fn set(&self, key: &str, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    /// Caches `value` under `key`, expiring `ttl` after now, and persists
    /// the store. Persistence failures are logged, not propagated: the
    /// in-memory entry stays usable for this process.
    pub async fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration) {
        let expiry = Utc::now().timestamp() + ttl.as_secs() as i64;
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), CacheEntry::new(value, expiry));

        match serde_json::to_string_pretty(&*entries) {
            Ok(serialized) => {
                if let Err(e) = tokio::fs::write(&self.path, serialized).await {
                    tracing::error!("Failed to persist cache to {}: {}", self.path.display(), e);
                }
            }
            Err(e) => {
                tracing::error!("Failed to serialize cache: {}", e);
            }
        }
    }
}

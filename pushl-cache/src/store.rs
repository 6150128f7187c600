use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::warn;

use crate::error::Result;
use crate::record::CacheRecord;

/// Number of lock stripes guarding concurrent writes. Keeps writes to
/// distinct keys from serializing behind one global lock while avoiding
/// an unbounded map of per-key mutexes.
const STRIPES: usize = 64;

/// Persists `CacheRecord`s as one self-describing file per URL under a
/// configured directory, or degrades to a pure no-op store when no
/// directory is configured.
///
/// Concurrent `put`s for the same key are serialized via a striped lock
/// set (spec §9: "a per-key lock... rather than a single global lock,
/// to avoid serializing all cache writes"). Reads never block on a
/// write lock that belongs to a different stripe.
pub struct CacheStore {
    dir: Option<PathBuf>,
    stripes: Vec<Arc<Mutex<()>>>,
}

impl CacheStore {
    /// A store backed by a directory on disk. The directory is created
    /// if it does not exist.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir: Some(dir),
            stripes: (0..STRIPES).map(|_| Arc::new(Mutex::new(()))).collect(),
        })
    }

    /// A store with no backing directory: `get` always misses, `put` is
    /// a no-op. Used when `ProcessingConfig.cache_dir` is absent.
    pub fn disabled() -> Self {
        Self {
            dir: None,
            stripes: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.dir.is_some()
    }

    /// Look up the cached record for a normalized URL. Corrupt or
    /// unknown-version files are treated as a miss rather than an error,
    /// per spec §4.1 / §6.
    pub async fn get(&self, url: &str) -> Option<CacheRecord> {
        let dir = self.dir.as_ref()?;
        let path = record_path(dir, url);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(url, error = %e, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_slice::<CacheRecord>(&bytes) {
            Ok(record) if record.version == crate::record::RECORD_VERSION => Some(record),
            Ok(record) => {
                warn!(url, version = record.version, "cache record from unknown version, treating as miss");
                None
            }
            Err(e) => {
                warn!(url, error = %e, "corrupt cache record, treating as miss");
                None
            }
        }
    }

    /// Store a record for a normalized URL. Writes to a temporary
    /// sibling file and renames atomically so a crash mid-write never
    /// leaves a partially-written record behind.
    pub async fn put(&self, url: &str, record: &CacheRecord) -> Result<()> {
        let Some(dir) = self.dir.as_ref() else {
            return Ok(());
        };
        let stripe = self.stripes[stripe_index(url)].clone();
        let _guard = stripe.lock().await;

        let path = record_path(dir, url);
        let tmp_path = path.with_extension("tmp");
        let bytes = serde_json::to_vec(record)?;
        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &path).await?;
        Ok(())
    }
}

fn stripe_index(url: &str) -> usize {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    (digest[0] as usize) % STRIPES
}

fn record_path(dir: &Path, url: &str) -> PathBuf {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    let hex = hex_encode(&hasher.finalize());
    dir.join(format!("{hex}.json"))
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_store_is_always_a_miss() {
        let store = CacheStore::disabled();
        assert!(!store.is_enabled());
        let record = CacheRecord::new(200, "https://a.example/".into());
        store.put("https://a.example/", &record).await.unwrap();
        assert!(store.get("https://a.example/").await.is_none());
    }

    #[tokio::test]
    async fn round_trips_a_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).await.unwrap();
        let mut record = CacheRecord::new(200, "https://a.example/post".into());
        record.etag = Some("\"abc\"".into());
        record.links.insert("https://b.example/page".into());

        store.put("https://a.example/post", &record).await.unwrap();
        let fetched = store.get("https://a.example/post").await.unwrap();
        assert_eq!(fetched.etag.as_deref(), Some("\"abc\""));
        assert_eq!(fetched.links.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_record_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).await.unwrap();
        let path = record_path(dir.path(), "https://a.example/");
        tokio::fs::write(&path, b"not json").await.unwrap();
        assert!(store.get("https://a.example/").await.is_none());
    }

    #[tokio::test]
    async fn unknown_version_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).await.unwrap();
        let mut record = CacheRecord::new(200, "https://a.example/".into());
        record.version = 9999;
        let path = record_path(dir.path(), "https://a.example/");
        tokio::fs::write(&path, serde_json::to_vec(&record).unwrap())
            .await
            .unwrap();
        assert!(store.get("https://a.example/").await.is_none());
    }
}

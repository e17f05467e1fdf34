//! On-disk summary cache keyed by path and content hash.
//!
//! Each entry is a JSON file named after `sha256(path \0 content_hash)`.
//! Reads take no lock; writes for one key are serialized and land through a
//! temporary file renamed into place, so a reader sees either the old entry
//! or the new one.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::classifier::content_hash;
use crate::error::{Result, SoundingError};

// Largest TTL chrono can represent in seconds.
const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

/// A persisted summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Relative path of the summarized file.
    pub path: String,
    /// Content hash the summary was produced from.
    pub content_hash: String,
    /// Cleaned summary text.
    pub summary: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

/// Keyed store of summaries shared by every summarization worker.
#[derive(Debug)]
pub struct SummaryCache {
    dir: PathBuf,
    ttl: Duration,
    writers: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SummaryCache {
    /// Open a cache rooted at `dir`; entries older than `ttl_secs` are ignored.
    pub fn new(dir: impl Into<PathBuf>, ttl_secs: u64) -> Self {
        Self {
            dir: dir.into(),
            ttl: Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64),
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Directory holding the entries.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name stem for a `(path, hash)` pair.
    pub fn key(path: &str, hash: &str) -> String {
        let mut material = Vec::with_capacity(path.len() + hash.len() + 1);
        material.extend_from_slice(path.as_bytes());
        material.push(0);
        material.extend_from_slice(hash.as_bytes());
        content_hash(&material)
    }

    /// Look up a fresh entry for `(path, hash)`.
    ///
    /// Missing, expired, and unparseable entries all read as `None`.
    pub async fn get(&self, path: &str, hash: &str) -> Result<Option<CacheEntry>> {
        let location = self.entry_path(&Self::key(path, hash));
        let bytes = match tokio::fs::read(&location).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(SoundingError::Io(err)),
        };
        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(err) => {
                warn!("ignoring corrupt cache entry {}: {err}", location.display());
                return Ok(None);
            }
        };
        if entry.path != path || entry.content_hash != hash {
            return Ok(None);
        }
        if Utc::now() - entry.created_at > self.ttl {
            debug!("cache entry for {path} expired");
            return Ok(None);
        }
        Ok(Some(entry))
    }

    /// Store a summary, replacing any previous entry for the same key.
    pub async fn put(&self, path: &str, hash: &str, summary: &str) -> Result<CacheEntry> {
        let entry = CacheEntry {
            path: path.to_string(),
            content_hash: hash.to_string(),
            summary: summary.to_string(),
            created_at: Utc::now(),
        };
        self.write(&entry).await?;
        Ok(entry)
    }

    /// Persist `entry` under its key.
    pub async fn write(&self, entry: &CacheEntry) -> Result<()> {
        let key = Self::key(&entry.path, &entry.content_hash);
        let writer = self.writer_for(&key);
        let result = {
            let _guard = writer.lock().await;
            self.persist(&key, entry).await
        };
        self.release_writer(&key, writer);
        result
    }

    async fn persist(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let payload = serde_json::to_vec_pretty(entry)?;
        let staging = self
            .dir
            .join(format!("{key}.{}.tmp", uuid::Uuid::new_v4()));
        tokio::fs::write(&staging, payload).await?;
        if let Err(err) = tokio::fs::rename(&staging, self.entry_path(key)).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(SoundingError::Io(err));
        }
        Ok(())
    }

    /// Delete every entry, returning how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(SoundingError::Io(err)),
        };
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn writer_for(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut writers = match self.writers.lock() {
            Ok(writers) => writers,
            Err(poisoned) => poisoned.into_inner(),
        };
        writers.entry(key.to_string()).or_default().clone()
    }

    /// Drop the per-key lock once no other writer holds or awaits it.
    fn release_writer(&self, key: &str, writer: Arc<tokio::sync::Mutex<()>>) {
        let mut writers = match self.writers.lock() {
            Ok(writers) => writers,
            Err(poisoned) => poisoned.into_inner(),
        };
        // One reference in the map plus ours.
        if Arc::strong_count(&writer) <= 2 {
            writers.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked_writers(&self) -> usize {
        match self.writers.lock() {
            Ok(writers) => writers.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CacheEntry, SummaryCache};
    use chrono::{Duration, Utc};
    use std::path::PathBuf;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = temp_cache_dir();
        let cache = SummaryCache::new(&dir, 3600);

        assert_eq!(cache.get("src/a.rs", "h1").await.expect("get"), None);
        cache.put("src/a.rs", "h1", "Parses input.").await.expect("put");

        let entry = cache.get("src/a.rs", "h1").await.expect("get").expect("hit");
        assert_eq!(entry.summary, "Parses input.");
        assert_eq!(cache.get("src/a.rs", "h2").await.expect("get"), None);
        assert_eq!(cache.get("src/b.rs", "h1").await.expect("get"), None);

        cleanup(&dir);
    }

    #[tokio::test]
    async fn expired_entries_read_as_absent() {
        let dir = temp_cache_dir();
        let cache = SummaryCache::new(&dir, 60);
        cache
            .write(&CacheEntry {
                path: "a.py".to_string(),
                content_hash: "h".to_string(),
                summary: "old".to_string(),
                created_at: Utc::now() - Duration::seconds(120),
            })
            .await
            .expect("write");

        assert_eq!(cache.get("a.py", "h").await.expect("get"), None);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn corrupt_entries_read_as_absent() {
        let dir = temp_cache_dir();
        std::fs::create_dir_all(&dir).expect("create dir");
        let key = SummaryCache::key("a.py", "h");
        std::fs::write(dir.join(format!("{key}.json")), "{not json").expect("write");

        let cache = SummaryCache::new(&dir, 60);
        assert_eq!(cache.get("a.py", "h").await.expect("get"), None);
        cleanup(&dir);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writes_to_one_key_leave_a_valid_entry() {
        let dir = temp_cache_dir();
        let cache = Arc::new(SummaryCache::new(&dir, 3600));
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            tasks.spawn(async move {
                cache
                    .put("src/a.rs", "h", &format!("summary {i}"))
                    .await
                    .expect("put");
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.expect("join");
        }

        let entry = cache.get("src/a.rs", "h").await.expect("get").expect("hit");
        assert!(entry.summary.starts_with("summary "));
        assert_eq!(cache.tracked_writers(), 0);
        let leftovers = std::fs::read_dir(&dir)
            .expect("read dir")
            .filter(|entry| {
                entry
                    .as_ref()
                    .map(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(leftovers, 0);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn clear_removes_entries() {
        let dir = temp_cache_dir();
        let cache = SummaryCache::new(&dir, 3600);
        cache.put("a", "1", "x").await.expect("put");
        cache.put("b", "2", "y").await.expect("put");

        assert_eq!(cache.clear().await.expect("clear"), 2);
        assert_eq!(cache.get("a", "1").await.expect("get"), None);
        cleanup(&dir);
    }

    #[tokio::test]
    async fn writer_locks_are_released_after_each_write() {
        let dir = temp_cache_dir();
        let cache = SummaryCache::new(&dir, 3600);
        for i in 0..50 {
            cache
                .put(&format!("src/{i}.rs"), "h", "x")
                .await
                .expect("put");
        }

        assert_eq!(cache.tracked_writers(), 0);
        cleanup(&dir);
    }

    #[test]
    fn key_separates_path_and_hash() {
        assert_ne!(SummaryCache::key("ab", "c"), SummaryCache::key("a", "bc"));
        assert_eq!(SummaryCache::key("a", "b").len(), 64);
    }

    fn temp_cache_dir() -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let id = COUNTER.fetch_add(1, Ordering::Relaxed);
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("system time")
            .as_nanos();
        std::env::temp_dir().join(format!("sounding_cache_test_{nanos}_{id}"))
    }

    fn cleanup(dir: &PathBuf) {
        let _ = std::fs::remove_dir_all(dir);
    }
}

//! A single named cache generation with file-based storage

use crate::error::{CacheError, Result};
use crate::types::{CacheEntry, CacheIndex, CacheStats, ResponseSnapshot};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

pub(crate) const INDEX_FILE: &str = "index.json";

/// A cache generation: request URL -> response snapshot
pub struct Cache {
    /// Generation name (the version tag)
    name: String,
    /// Directory holding response bodies and the index
    dir: PathBuf,
    /// In-memory metadata for cached entries, keyed by hashed URL
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Serialises index writes so the last write reflects the latest state
    index_lock: Mutex<()>,
    /// Serialises puts so replace, evict and insert happen as one step
    write_lock: Mutex<()>,
    /// Maximum total body size in bytes
    max_size: u64,
    current_size: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Cache {
    /// Open the generation stored in `dir`, creating it if needed
    pub(crate) async fn open(name: &str, dir: PathBuf, max_size: u64) -> Result<Self> {
        fs::create_dir_all(&dir).await?;

        let index_path = dir.join(INDEX_FILE);
        let entries = match fs::read(&index_path).await {
            Ok(raw) => serde_json::from_slice::<CacheIndex>(&raw)?.entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        let current_size = entries.values().map(|e| e.size).sum();

        let cache = Self {
            name: name.to_string(),
            dir,
            entries: RwLock::new(entries),
            index_lock: Mutex::new(()),
            write_lock: Mutex::new(()),
            max_size,
            current_size: AtomicU64::new(current_size),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        };
        cache.write_index().await?;

        info!(cache = %cache.name, dir = ?cache.dir, "Cache opened");
        Ok(cache)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn dir(&self) -> &Path {
        &self.dir
    }

    /// Generate an entry key from a request URL
    pub fn cache_key(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Look up the response stored for `url`
    pub async fn match_url(&self, url: &str) -> Option<ResponseSnapshot> {
        let key = Self::cache_key(url);

        let entry = {
            let entries = self.entries.read().await;
            entries.get(&key).cloned()
        };

        if let Some(entry) = entry {
            match fs::read(self.dir.join(&entry.file)).await {
                Ok(body) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = %self.name, url, "Cache hit");
                    return Some(ResponseSnapshot {
                        status: entry.status,
                        headers: entry.headers,
                        body,
                    });
                }
                Err(e) => {
                    warn!(cache = %self.name, url, error = %e, "Failed to read cached body, removing entry");
                    self.remove(&key).await;
                    if let Err(e) = self.write_index().await {
                        warn!(cache = %self.name, error = %e, "Failed to persist cache index");
                    }
                }
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// True when an entry exists for `url`
    pub async fn contains(&self, url: &str) -> bool {
        let key = Self::cache_key(url);
        self.entries.read().await.contains_key(&key)
    }

    /// Store a response under `url`, replacing any previous entry
    ///
    /// Fails with [`CacheError::TooLarge`] when the body alone exceeds the
    /// cache limit; nothing is evicted in that case.
    pub async fn put(&self, url: &str, response: &ResponseSnapshot) -> Result<()> {
        let key = Self::cache_key(url);
        let size = response.body.len() as u64;

        if size > self.max_size {
            warn!(cache = %self.name, url, size, max = self.max_size, "Response too large to cache");
            return Err(CacheError::TooLarge {
                size,
                max: self.max_size,
            });
        }

        {
            let _write = self.write_lock.lock().await;

            // A replaced entry must not count towards eviction
            self.remove(&key).await;
            self.evict_if_needed(size).await;

            fs::write(self.dir.join(&key), &response.body).await?;

            let entry = CacheEntry {
                url: url.to_string(),
                file: key.clone(),
                status: response.status,
                headers: response.headers.clone(),
                size,
                created_at: Utc::now(),
            };

            let mut entries = self.entries.write().await;
            if let Some(previous) = entries.insert(key, entry) {
                self.current_size.fetch_sub(previous.size, Ordering::Relaxed);
            }
            self.current_size.fetch_add(size, Ordering::Relaxed);
        }

        self.write_index().await?;
        debug!(cache = %self.name, url, size, "Cached response");
        Ok(())
    }

    /// Delete the entry for `url`; returns whether one existed
    pub async fn delete(&self, url: &str) -> Result<bool> {
        let removed = self.remove(&Self::cache_key(url)).await;
        if removed {
            self.write_index().await?;
        }
        Ok(removed)
    }

    /// URLs of every cached entry, oldest first
    pub async fn keys(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        let mut list: Vec<&CacheEntry> = entries.values().collect();
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.url.cmp(&b.url)));
        list.into_iter().map(|e| e.url.clone()).collect()
    }

    /// Evict oldest entries until there's enough room for new_size bytes
    async fn evict_if_needed(&self, new_size: u64) {
        let current = self.current_size.load(Ordering::Relaxed);

        if current + new_size <= self.max_size {
            return;
        }

        let target_size = self.max_size.saturating_sub(new_size);

        loop {
            let current = self.current_size.load(Ordering::Relaxed);
            if current <= target_size {
                break;
            }

            let oldest_key = {
                let entries = self.entries.read().await;
                entries
                    .iter()
                    .min_by_key(|(_, e)| e.created_at)
                    .map(|(k, _)| k.clone())
            };

            if let Some(key) = oldest_key {
                self.remove(&key).await;
                debug!(cache = %self.name, key = %key, "Evicted oldest cache entry");
            } else {
                break;
            }
        }
    }

    async fn remove(&self, key: &str) -> bool {
        let entry = {
            let mut entries = self.entries.write().await;
            entries.remove(key)
        };

        match entry {
            Some(entry) => {
                self.current_size.fetch_sub(entry.size, Ordering::Relaxed);
                let _ = fs::remove_file(self.dir.join(&entry.file)).await;
                true
            }
            None => false,
        }
    }

    async fn write_index(&self) -> Result<()> {
        let _guard = self.index_lock.lock().await;

        let index = CacheIndex {
            name: self.name.clone(),
            entries: self.entries.read().await.clone(),
        };
        let raw = serde_json::to_vec(&index)?;

        let tmp = self.dir.join(format!("{}.tmp", INDEX_FILE));
        fs::write(&tmp, raw).await?;
        fs::rename(&tmp, self.dir.join(INDEX_FILE)).await?;
        Ok(())
    }

    /// Get current cache statistics
    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        CacheStats {
            entries: entries.len(),
            total_size: self.current_size.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn html(body: &[u8]) -> ResponseSnapshot {
        ResponseSnapshot::new(
            200,
            vec![
                ("content-type".to_string(), "text/html".to_string()),
                ("etag".to_string(), "\"abc\"".to_string()),
            ],
            body.to_vec(),
        )
    }

    #[test]
    fn test_cache_key_generation() {
        let key1 = Cache::cache_key("http://localhost:8080/");
        let key2 = Cache::cache_key("http://localhost:8080/");
        let key3 = Cache::cache_key("http://localhost:8080/auth/login");

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);

        // Keys are hex strings (64 chars for SHA256)
        assert_eq!(key1.len(), 64);
        assert!(key1.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_put_then_match_is_bit_identical() {
        let dir = tempdir().unwrap();
        let cache = Cache::open("v1", dir.path().join("v1"), 1024 * 1024)
            .await
            .unwrap();

        let body: Vec<u8> = (0u8..=255).collect();
        let stored = ResponseSnapshot::new(
            203,
            vec![
                ("content-type".to_string(), "application/octet-stream".to_string()),
                ("x-custom".to_string(), "a".to_string()),
                ("x-custom".to_string(), "b".to_string()),
            ],
            body,
        );

        cache.put("https://cdn.example.com/lib.js", &stored).await.unwrap();
        let found = cache.match_url("https://cdn.example.com/lib.js").await;

        assert_eq!(found, Some(stored));
    }

    #[tokio::test]
    async fn test_match_miss() {
        let dir = tempdir().unwrap();
        let cache = Cache::open("v1", dir.path().join("v1"), 1024).await.unwrap();

        assert!(cache.match_url("http://localhost/none").await.is_none());
        assert_eq!(cache.stats().await.misses, 1);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_entry() {
        let dir = tempdir().unwrap();
        let cache = Cache::open("v1", dir.path().join("v1"), 1024).await.unwrap();

        cache.put("http://localhost/", &html(b"old")).await.unwrap();
        cache.put("http://localhost/", &html(b"newer")).await.unwrap();

        let found = cache.match_url("http://localhost/").await.unwrap();
        assert_eq!(found.body, b"newer");

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.total_size, 5);
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let dir = tempdir().unwrap();
        let cache = Cache::open("v1", dir.path().join("v1"), 1024).await.unwrap();

        cache.put("http://localhost/a", &html(b"a")).await.unwrap();
        assert!(cache.delete("http://localhost/a").await.unwrap());
        assert!(!cache.delete("http://localhost/a").await.unwrap());
        assert!(!cache.contains("http://localhost/a").await);
    }

    #[tokio::test]
    async fn test_entries_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("v1");

        {
            let cache = Cache::open("v1", path.clone(), 1024).await.unwrap();
            cache.put("http://localhost/", &html(b"shell")).await.unwrap();
        }

        let reopened = Cache::open("v1", path, 1024).await.unwrap();
        assert_eq!(reopened.keys().await, vec!["http://localhost/".to_string()]);
        assert_eq!(reopened.stats().await.total_size, 5);
        assert_eq!(
            reopened.match_url("http://localhost/").await.unwrap().body,
            b"shell"
        );
    }

    #[tokio::test]
    async fn test_missing_body_file_drops_entry() {
        let dir = tempdir().unwrap();
        let cache = Cache::open("v1", dir.path().join("v1"), 1024).await.unwrap();

        cache.put("http://localhost/x", &html(b"x")).await.unwrap();
        let file = cache.dir().join(Cache::cache_key("http://localhost/x"));
        std::fs::remove_file(file).unwrap();

        assert!(cache.match_url("http://localhost/x").await.is_none());
        assert!(!cache.contains("http://localhost/x").await);
    }

    #[tokio::test]
    async fn test_cache_eviction() {
        let dir = tempdir().unwrap();
        // Small cache: only 20 bytes
        let cache = Cache::open("v1", dir.path().join("v1"), 20).await.unwrap();

        cache.put("http://localhost/1", &html(b"0123456789")).await.unwrap();
        cache.put("http://localhost/2", &html(b"abcdefghij")).await.unwrap();

        assert!(cache.contains("http://localhost/1").await);
        assert!(cache.contains("http://localhost/2").await);

        // Third entry forces the oldest out
        cache.put("http://localhost/3", &html(b"ABCDEFGHIJ")).await.unwrap();

        assert!(cache.contains("http://localhost/3").await);
        let stats = cache.stats().await;
        assert!(stats.total_size <= 20);
    }

    #[tokio::test]
    async fn test_concurrent_puts_to_one_url_keep_size_accurate() {
        let dir = tempdir().unwrap();
        let cache = std::sync::Arc::new(
            Cache::open("v1", dir.path().join("v1"), 1024 * 1024)
                .await
                .unwrap(),
        );
        cache.put("http://localhost/keep", &html(b"shell")).await.unwrap();

        let body = vec![7u8; 1000];
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..64 {
            let cache = cache.clone();
            let response = html(&body);
            tasks.spawn(async move { cache.put("http://localhost/app.js", &response).await });
        }
        while let Some(joined) = tasks.join_next().await {
            joined.unwrap().unwrap();
        }

        let stats = cache.stats().await;
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_size, 1005);
        assert!(cache.contains("http://localhost/keep").await);
        assert_eq!(
            cache.match_url("http://localhost/app.js").await.unwrap().body,
            body
        );
    }

    #[tokio::test]
    async fn test_oversized_body_is_rejected_without_eviction() {
        let dir = tempdir().unwrap();
        let cache = Cache::open("v1", dir.path().join("v1"), 10).await.unwrap();

        cache.put("http://localhost/small", &html(b"tiny")).await.unwrap();
        let err = cache
            .put("http://localhost/huge", &html(&[0u8; 50]))
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::TooLarge { size: 50, max: 10 }));
        assert!(!cache.contains("http://localhost/huge").await);
        assert!(cache.contains("http://localhost/small").await);
        assert_eq!(cache.stats().await.total_size, 4);
    }
}

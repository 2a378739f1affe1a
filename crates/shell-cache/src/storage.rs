//! Storage of every cache generation under one root directory

use crate::cache::{Cache, INDEX_FILE};
use crate::error::{CacheError, Result};
use crate::types::{CacheIndex, GenerationStats, ResponseSnapshot};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// All cache generations known to one worker scope
pub struct CacheStorage {
    root: PathBuf,
    /// Size limit applied to each generation
    max_size: u64,
    caches: RwLock<BTreeMap<String, Arc<Cache>>>,
}

impl CacheStorage {
    pub fn new(root: PathBuf, max_size: u64) -> Self {
        Self {
            root,
            max_size,
            caches: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create the root directory and load every generation found in it
    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;

        let mut dir = fs::read_dir(&self.root).await?;
        let mut loaded = BTreeMap::new();

        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }

            let index_path = item.path().join(INDEX_FILE);
            let raw = match fs::read(&index_path).await {
                Ok(raw) => raw,
                Err(_) => {
                    debug!(dir = ?item.path(), "Skipping directory without cache index");
                    continue;
                }
            };

            let name = match serde_json::from_slice::<CacheIndex>(&raw) {
                Ok(index) => index.name,
                Err(e) => {
                    warn!(dir = ?item.path(), error = %e, "Skipping unreadable cache index");
                    continue;
                }
            };

            let cache = Cache::open(&name, item.path(), self.max_size).await?;
            loaded.insert(name, Arc::new(cache));
        }

        info!(root = ?self.root, generations = loaded.len(), "Cache storage initialized");
        *self.caches.write().await = loaded;
        Ok(())
    }

    fn generation_dir(&self, name: &str) -> PathBuf {
        self.root.join(Cache::cache_key(name))
    }

    /// Open the named generation, creating it if it doesn't exist
    pub async fn open(&self, name: &str) -> Result<Arc<Cache>> {
        if let Some(cache) = self.caches.read().await.get(name) {
            return Ok(cache.clone());
        }

        let mut caches = self.caches.write().await;
        // Another task may have created it while we waited for the lock
        if let Some(cache) = caches.get(name) {
            return Ok(cache.clone());
        }

        let cache = Arc::new(Cache::open(name, self.generation_dir(name), self.max_size).await?);
        caches.insert(name.to_string(), cache.clone());
        Ok(cache)
    }

    pub async fn has(&self, name: &str) -> bool {
        self.caches.read().await.contains_key(name)
    }

    /// Names of every generation, sorted
    pub async fn keys(&self) -> Vec<String> {
        self.caches.read().await.keys().cloned().collect()
    }

    /// Delete a generation and its files; returns whether it existed
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.caches.write().await.remove(name);

        let Some(cache) = removed else {
            return Ok(false);
        };

        match fs::remove_dir_all(cache.dir()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::from(e)),
        }

        info!(cache = %name, "Deleted cache generation");
        Ok(true)
    }

    /// Look up `url` across every generation
    pub async fn match_url(&self, url: &str) -> Option<ResponseSnapshot> {
        let caches: Vec<Arc<Cache>> = self.caches.read().await.values().cloned().collect();

        for cache in caches {
            if let Some(found) = cache.match_url(url).await {
                return Some(found);
            }
        }
        None
    }

    pub async fn stats(&self) -> Vec<GenerationStats> {
        let caches: Vec<Arc<Cache>> = self.caches.read().await.values().cloned().collect();

        let mut out = Vec::with_capacity(caches.len());
        for cache in caches {
            out.push(GenerationStats {
                name: cache.name().to_string(),
                stats: cache.stats().await,
            });
        }
        out
    }
}

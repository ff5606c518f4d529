use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};

use super::{error::CacheResult, traits::Cache};
use crate::config::MemoryCacheConfig;

struct CacheEntry {
    data: Vec<u8>,
    expires_at: Option<Instant>,
    last_accessed: Instant,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let expires_at = if !ttl.is_zero() {
            Some(Instant::now() + ttl)
        } else {
            None
        };
        Self {
            data,
            expires_at,
            last_accessed: Instant::now(),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Instant::now() > exp)
    }

    fn touch(&mut self) {
        self.last_accessed = Instant::now();
    }
}

/// In-memory session store using DashMap for concurrent access.
///
/// # Multi-Node Deployments
///
/// Each node keeps its own sessions, so a token issued by one node is
/// unknown to the others and a logout only affects the local node. Use the
/// Redis store when more than one gateway serves the same clients.
pub struct MemoryCache {
    data: Arc<DashMap<String, CacheEntry>>,
    max_entries: usize,
    eviction_batch_size: usize,
}

impl MemoryCache {
    pub fn new(config: &MemoryCacheConfig) -> Self {
        Self {
            data: Arc::new(DashMap::new()),
            max_entries: config.max_entries,
            eviction_batch_size: config.eviction_batch_size.max(1),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn evict_if_needed(&self) {
        if self.data.len() < self.max_entries {
            return;
        }

        // First pass: remove all expired entries
        self.data.retain(|_, entry| !entry.is_expired());

        let current_len = self.data.len();
        if current_len < self.max_entries {
            return;
        }

        let target_size = self.max_entries.saturating_sub(self.eviction_batch_size);
        let to_evict = current_len.saturating_sub(target_size);

        if to_evict == 0 {
            return;
        }

        // Oldest access first
        let mut entries: Vec<_> = self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.last_accessed))
            .collect();
        entries.sort_by_key(|(_, last_accessed)| *last_accessed);

        for (key, _) in entries.into_iter().take(to_evict) {
            self.data.remove(&key);
        }
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        if let Some(mut entry) = self.data.get_mut(key) {
            if entry.is_expired() {
                drop(entry);
                self.data.remove(key);
                return Ok(None);
            }

            entry.touch();
            Ok(Some(entry.data.clone()))
        } else {
            Ok(None)
        }
    }

    async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
        self.evict_if_needed();

        self.data
            .insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));

        Ok(())
    }

    async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
        self.evict_if_needed();

        match self.data.entry(key.to_string()) {
            Entry::Occupied(mut e) => {
                if e.get().is_expired() {
                    e.insert(CacheEntry::new(value.to_vec(), ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(e) => {
                e.insert(CacheEntry::new(value.to_vec(), ttl));
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        Ok(self
            .data
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;

    fn test_config(max_entries: usize) -> MemoryCacheConfig {
        MemoryCacheConfig {
            max_entries,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_get_set_bytes() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("session:access:a", b"value1", Duration::from_secs(60))
            .await
            .unwrap();
        let result = cache.get_bytes("session:access:a").await.unwrap();
        assert_eq!(result, Some(b"value1".to_vec()));

        let result = cache.get_bytes("nonexistent").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_delete_reports_presence() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("key1", b"value1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.delete("key1").await.unwrap());
        assert!(cache.get_bytes("key1").await.unwrap().is_none());
        assert!(!cache.delete("key1").await.unwrap());
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("short", b"v", Duration::from_millis(200))
            .await
            .unwrap();
        assert!(cache.get_bytes("short").await.unwrap().is_some());

        sleep(Duration::from_millis(300)).await;
        assert!(cache.get_bytes("short").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_of_expired_entry_is_not_a_hit() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_bytes("short", b"v", Duration::from_millis(50))
            .await
            .unwrap();
        sleep(Duration::from_millis(120)).await;

        assert!(!cache.delete("short").await.unwrap());
    }

    #[tokio::test]
    async fn test_set_nx() {
        let cache = MemoryCache::new(&test_config(100));

        assert!(
            cache
                .set_nx("lock", b"1", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert!(
            !cache
                .set_nx("lock", b"2", Duration::from_secs(60))
                .await
                .unwrap()
        );
        assert_eq!(cache.get_bytes("lock").await.unwrap(), Some(b"1".to_vec()));
    }

    #[tokio::test]
    async fn test_set_nx_replaces_expired() {
        let cache = MemoryCache::new(&test_config(100));

        cache
            .set_nx("lock", b"1", Duration::from_millis(50))
            .await
            .unwrap();
        sleep(Duration::from_millis(120)).await;

        assert!(
            cache
                .set_nx("lock", b"2", Duration::from_secs(60))
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_lru_eviction() {
        let cache = MemoryCache::new(&MemoryCacheConfig {
            max_entries: 3,
            eviction_batch_size: 1,
        });

        for key in ["a", "b", "c"] {
            cache
                .set_bytes(key, b"v", Duration::from_secs(60))
                .await
                .unwrap();
            sleep(Duration::from_millis(5)).await;
        }

        // Touch "a" so "b" becomes the oldest
        cache.get_bytes("a").await.unwrap();
        sleep(Duration::from_millis(5)).await;

        cache
            .set_bytes("d", b"v", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(cache.get_bytes("a").await.unwrap().is_some());
        assert!(cache.get_bytes("b").await.unwrap().is_none());
        assert!(cache.get_bytes("d").await.unwrap().is_some());
        assert_eq!(cache.len(), 3);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        use crate::cache::CacheExt;

        #[derive(serde::Serialize, serde::Deserialize, PartialEq, Debug)]
        struct Record {
            name: String,
        }

        let cache = MemoryCache::new(&test_config(100));
        let record = Record {
            name: "alice".into(),
        };
        cache
            .set_json("r", &record, Duration::from_secs(60))
            .await
            .unwrap();
        let loaded: Option<Record> = cache.get_json("r").await.unwrap();
        assert_eq!(loaded, Some(record));
    }
}

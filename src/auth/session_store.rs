//! Session records in the TTL key-value store.
//!
//! A session is written twice, once under its access id and once under its
//! refresh id, each with the lifetime of the matching token. Revocation
//! deletes both keys. The refresh-side record is what rotation consumes.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    cache::{Cache, CacheError, CacheExt, CacheResult},
    observability::metrics,
};

/// Key layout for session records.
struct SessionKeys;

impl SessionKeys {
    /// session:access:{access_id}
    fn access(id: Uuid) -> String {
        format!("session:access:{id}")
    }

    /// session:refresh:{refresh_id}
    fn refresh(id: Uuid) -> String {
        format!("session:refresh:{id}")
    }

    /// session:rotate:{refresh_id}, held while a refresh token is rotated
    fn rotation_lock(id: Uuid) -> String {
        format!("session:rotate:{id}")
    }
}

/// The server-side half of a token pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_id: Uuid,
    pub refresh_id: Uuid,
    pub subject_id: i64,
    pub subject_uuid: Uuid,
    pub username: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn ttl_until(expires_at: DateTime<Utc>) -> Duration {
        // A zero TTL means "never expires" to the store, so clamp to 1s
        (expires_at - Utc::now())
            .to_std()
            .unwrap_or_default()
            .max(Duration::from_secs(1))
    }
}

/// Session persistence with a per-call deadline.
#[derive(Clone)]
pub struct SessionStore {
    cache: Arc<dyn Cache>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(cache: Arc<dyn Cache>, timeout: Duration) -> Self {
        Self { cache, timeout }
    }

    /// Run one store call under the deadline and record its outcome.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> CacheResult<T>
    where
        F: Future<Output = CacheResult<T>>,
    {
        let result = match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout),
        };
        let outcome = match &result {
            Ok(_) => "ok",
            Err(CacheError::Timeout) => "timeout",
            Err(_) => "error",
        };
        metrics::record_cache_operation(self.cache.kind(), operation, outcome);
        if let Err(e) = &result {
            tracing::warn!(operation, error = %e, "Session store call failed");
        }
        result
    }

    /// Persist both keys. If the second write fails the first is removed so
    /// no half-session is left behind.
    pub async fn save(&self, session: &Session) -> CacheResult<()> {
        let access_key = SessionKeys::access(session.access_id);
        let refresh_key = SessionKeys::refresh(session.refresh_id);

        self.call(
            "set",
            self.cache.set_json(
                &access_key,
                session,
                Session::ttl_until(session.access_expires_at),
            ),
        )
        .await?;

        if let Err(e) = self
            .call(
                "set",
                self.cache.set_json(
                    &refresh_key,
                    session,
                    Session::ttl_until(session.refresh_expires_at),
                ),
            )
            .await
        {
            let _ = self.call("delete", self.cache.delete(&access_key)).await;
            return Err(e);
        }

        Ok(())
    }

    pub async fn get_by_access(&self, access_id: Uuid) -> CacheResult<Option<Session>> {
        self.call("get", self.cache.get_json(&SessionKeys::access(access_id)))
            .await
    }

    pub async fn get_by_refresh(&self, refresh_id: Uuid) -> CacheResult<Option<Session>> {
        self.call("get", self.cache.get_json(&SessionKeys::refresh(refresh_id)))
            .await
    }

    /// Delete both keys of a session. Returns true if either key was live.
    pub async fn delete(&self, session: &Session) -> CacheResult<bool> {
        let access = self
            .call(
                "delete",
                self.cache.delete(&SessionKeys::access(session.access_id)),
            )
            .await?;
        let refresh = self
            .call(
                "delete",
                self.cache.delete(&SessionKeys::refresh(session.refresh_id)),
            )
            .await?;
        Ok(access || refresh)
    }

    /// Take the rotation lock for a refresh id. False means another rotation
    /// holds it.
    pub async fn lock_refresh(&self, refresh_id: Uuid, ttl: Duration) -> CacheResult<bool> {
        self.call(
            "set_nx",
            self.cache
                .set_nx(&SessionKeys::rotation_lock(refresh_id), b"1", ttl),
        )
        .await
    }

    pub async fn unlock_refresh(&self, refresh_id: Uuid) -> CacheResult<()> {
        self.call(
            "delete",
            self.cache.delete(&SessionKeys::rotation_lock(refresh_id)),
        )
        .await
        .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    use super::*;
    use crate::{cache::MemoryCache, config::MemoryCacheConfig};

    fn store() -> SessionStore {
        SessionStore::new(
            Arc::new(MemoryCache::new(&MemoryCacheConfig::default())),
            Duration::from_secs(1),
        )
    }

    fn session() -> Session {
        let now = Utc::now();
        Session {
            access_id: Uuid::new_v4(),
            refresh_id: Uuid::new_v4(),
            subject_id: 1,
            subject_uuid: Uuid::new_v4(),
            username: "alice".into(),
            access_expires_at: now + ChronoDuration::minutes(15),
            refresh_expires_at: now + ChronoDuration::hours(1),
            created_at: now,
        }
    }

    #[tokio::test]
    async fn test_save_and_lookup_both_sides() {
        let store = store();
        let s = session();
        store.save(&s).await.unwrap();

        assert_eq!(store.get_by_access(s.access_id).await.unwrap(), Some(s.clone()));
        assert_eq!(store.get_by_refresh(s.refresh_id).await.unwrap(), Some(s.clone()));
        assert!(store.get_by_access(s.refresh_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_removes_both_keys() {
        let store = store();
        let s = session();
        store.save(&s).await.unwrap();

        assert!(store.delete(&s).await.unwrap());
        assert!(store.get_by_access(s.access_id).await.unwrap().is_none());
        assert!(store.get_by_refresh(s.refresh_id).await.unwrap().is_none());
        assert!(!store.delete(&s).await.unwrap());
    }

    #[tokio::test]
    async fn test_rotation_lock_is_exclusive() {
        let store = store();
        let id = Uuid::new_v4();
        let ttl = Duration::from_secs(10);

        assert!(store.lock_refresh(id, ttl).await.unwrap());
        assert!(!store.lock_refresh(id, ttl).await.unwrap());
        store.unlock_refresh(id).await.unwrap();
        assert!(store.lock_refresh(id, ttl).await.unwrap());
    }

    /// Accepts the first write, then fails every later one.
    struct FlakyCache {
        inner: MemoryCache,
        writes: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Cache for FlakyCache {
        fn kind(&self) -> &'static str {
            "flaky"
        }

        async fn get_bytes(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
            self.inner.get_bytes(key).await
        }

        async fn set_bytes(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<()> {
            let n = self
                .writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            if n >= 1 {
                return Err(CacheError::Internal("write refused".into()));
            }
            self.inner.set_bytes(key, value, ttl).await
        }

        async fn set_nx(&self, key: &str, value: &[u8], ttl: Duration) -> CacheResult<bool> {
            self.inner.set_nx(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> CacheResult<bool> {
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_failed_second_write_rolls_back_first() {
        let store = SessionStore::new(
            Arc::new(FlakyCache {
                inner: MemoryCache::new(&MemoryCacheConfig::default()),
                writes: Default::default(),
            }),
            Duration::from_secs(1),
        );
        let s = session();

        assert!(store.save(&s).await.is_err());
        assert!(store.get_by_access(s.access_id).await.unwrap().is_none());
    }

    /// Never answers.
    struct StalledCache;

    #[async_trait]
    impl Cache for StalledCache {
        fn kind(&self) -> &'static str {
            "stalled"
        }

        async fn get_bytes(&self, _key: &str) -> CacheResult<Option<Vec<u8>>> {
            std::future::pending().await
        }

        async fn set_bytes(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<()> {
            std::future::pending().await
        }

        async fn set_nx(&self, _key: &str, _value: &[u8], _ttl: Duration) -> CacheResult<bool> {
            std::future::pending().await
        }

        async fn delete(&self, _key: &str) -> CacheResult<bool> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_calls_time_out() {
        let store = SessionStore::new(Arc::new(StalledCache), Duration::from_millis(20));
        assert!(matches!(
            store.get_by_access(Uuid::new_v4()).await,
            Err(CacheError::Timeout)
        ));
    }
}

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::kv::KeyValueStore;
use crate::util::{Clock, SystemClock};

/// Default TTL for picker results (24 hours)
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Key namespace for picker cache entries in the shared store.
pub const PICKER_CACHE_PREFIX: &str = "gif_cache_";

/// Stored representation of a cached value.
#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry<T> {
    /// Milliseconds since the Unix epoch at write time.
    stored_at: i64,
    value: T,
}

/// Key/value cache with a fixed time-to-live, layered on a [`KeyValueStore`].
///
/// There is no sweeper: an entry older than the TTL is deleted the next time
/// it is read. Store failures and undecodable entries never reach the caller;
/// a failed read is a miss and a failed write is logged and dropped.
pub struct TtlCache {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
    ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>, ttl: Duration) -> Self {
        Self::with_clock(store, prefix, ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        prefix: impl Into<String>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            ttl_ms: i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX),
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.ttl_ms).unwrap_or(0))
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Returns the cached value if present, decodable and not older than the TTL.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let full_key = self.full_key(key);
        let raw = match self.store.get(&full_key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        let entry: CacheEntry<T> = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(key = %full_key, error = %e, "Discarding undecodable cache entry");
                self.remove_quietly(&full_key).await;
                return None;
            }
        };

        let age = self.clock.now_ms().saturating_sub(entry.stored_at);
        if age > self.ttl_ms {
            tracing::debug!(key = %full_key, age_ms = age, "Cache entry expired");
            self.remove_quietly(&full_key).await;
            return None;
        }

        Some(entry.value)
    }

    /// Stores `value` stamped with the current time, replacing any previous entry.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        let full_key = self.full_key(key);
        let entry = CacheEntry {
            stored_at: self.clock.now_ms(),
            value,
        };
        let raw = match serde_json::to_string(&entry) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(key = %full_key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(&full_key, &raw).await {
            tracing::warn!(key = %full_key, error = %e, "Cache write failed, continuing uncached");
        }
    }

    pub async fn invalidate(&self, key: &str) {
        let full_key = self.full_key(key);
        self.remove_quietly(&full_key).await;
    }

    async fn remove_quietly(&self, full_key: &str) {
        if let Err(e) = self.store.remove(full_key).await {
            tracing::warn!(key = %full_key, error = %e, "Failed to remove cache entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::util::ManualClock;

    fn cache_with_clock() -> (TtlCache, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_700_000_000_000));
        let cache = TtlCache::with_clock(
            store.clone(),
            PICKER_CACHE_PREFIX,
            Duration::from_secs(60),
            clock.clone(),
        );
        (cache, store, clock)
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let (cache, store, _clock) = cache_with_clock();
        cache.set("trending", &vec!["cats".to_string()]).await;

        let value: Option<Vec<String>> = cache.get("trending").await;
        assert_eq!(value, Some(vec!["cats".to_string()]));
        assert_eq!(store.keys().await, vec!["gif_cache_trending".to_string()]);
    }

    #[tokio::test]
    async fn test_entry_valid_at_exact_ttl() {
        let (cache, _store, clock) = cache_with_clock();
        cache.set("k", &1u32).await;
        clock.advance(Duration::from_secs(60));
        assert_eq!(cache.get::<u32>("k").await, Some(1));
    }

    #[tokio::test]
    async fn test_expired_entry_is_evicted_on_read() {
        let (cache, store, clock) = cache_with_clock();
        cache.set("k", &1u32).await;
        clock.advance(Duration::from_millis(60_001));

        assert_eq!(cache.get::<u32>("k").await, None);
        assert!(store.is_empty().await);
        // No resurrection on a second read
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let (cache, store, _clock) = cache_with_clock();
        store.set("gif_cache_k", "{not json").await.unwrap();
        assert_eq!(cache.get::<u32>("k").await, None);

        // Wrong shape is also a miss
        cache.set("shape", &"a string").await;
        assert_eq!(cache.get::<Vec<u32>>("shape").await, None);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let (cache, _store, _clock) = cache_with_clock();
        cache.set("k", &1u32).await;
        cache.invalidate("k").await;
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_quota_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::with_quota(8));
        let cache = TtlCache::new(store.clone(), PICKER_CACHE_PREFIX, DEFAULT_TTL);

        cache.set("big", &"x".repeat(100)).await;
        assert!(store.is_empty().await);
        assert_eq!(cache.get::<String>("big").await, None);
    }
}

//! Property tests for the TTL cache over the in-memory and SQLite stores.

use murmur::storage::{Database, KeyValueStore, MemoryStore, TtlCache, PICKER_CACHE_PREFIX};
use murmur::util::ManualClock;
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// A value is served exactly while its age is within the TTL.
    #[test]
    fn prop_hit_iff_within_ttl(ttl_ms in 1u64..10_000_000, age_ms in 0u64..20_000_000) {
        let hit = runtime().block_on(async {
            let clock = Arc::new(ManualClock::new(1_700_000_000_000));
            let cache = TtlCache::with_clock(
                Arc::new(MemoryStore::new()),
                PICKER_CACHE_PREFIX,
                Duration::from_millis(ttl_ms),
                clock.clone(),
            );
            cache.set("k", &vec!["a".to_string()]).await;
            clock.advance(Duration::from_millis(age_ms));
            cache.get::<Vec<String>>("k").await.is_some()
        });
        prop_assert_eq!(hit, age_ms <= ttl_ms);
    }

    /// Every stored key carries the prefix, whatever the caller's key is.
    #[test]
    fn prop_keys_are_namespaced(key in "[a-z0-9_]{1,24}") {
        let keys = runtime().block_on(async {
            let store = Arc::new(MemoryStore::new());
            let cache = TtlCache::new(store.clone(), PICKER_CACHE_PREFIX, Duration::from_secs(60));
            cache.set(&key, &1u32).await;
            store.keys().await
        });
        prop_assert_eq!(keys, vec![format!("{}{}", PICKER_CACHE_PREFIX, key)]);
    }
}

#[tokio::test]
async fn test_expired_entry_is_deleted_from_database() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    let clock = Arc::new(ManualClock::new(0));
    let cache = TtlCache::with_clock(
        db.clone(),
        PICKER_CACHE_PREFIX,
        Duration::from_secs(60),
        clock.clone(),
    );

    cache.set("trending", &vec![1, 2, 3]).await;
    assert_eq!(db.count_keys(PICKER_CACHE_PREFIX).await.unwrap(), 1);

    clock.advance(Duration::from_secs(61));
    assert!(cache.get::<Vec<i32>>("trending").await.is_none());
    assert_eq!(db.count_keys(PICKER_CACHE_PREFIX).await.unwrap(), 0);
}

#[tokio::test]
async fn test_corrupt_entry_is_a_miss() {
    let db = Arc::new(Database::open(":memory:").await.unwrap());
    db.set("gif_cache_trending", "{not json").await.unwrap();

    let cache = TtlCache::new(db.clone(), PICKER_CACHE_PREFIX, Duration::from_secs(60));
    assert!(cache.get::<Vec<i32>>("trending").await.is_none());
    assert!(db.get("gif_cache_trending").await.unwrap().is_none());
}

#[tokio::test]
async fn test_full_store_degrades_to_uncached() {
    let cache = TtlCache::new(
        Arc::new(MemoryStore::with_quota(16)),
        PICKER_CACHE_PREFIX,
        Duration::from_secs(60),
    );
    cache.set("search_x", &vec!["a long value that will not fit"]).await;
    assert!(cache.get::<Vec<String>>("search_x").await.is_none());
}

//! Property tests for the cache invariants in §8 of the design doc
//! (P1 capacity, P2 object bound, P3 LRU victim, P4 hit refresh, P5
//! uniqueness), following the teacher crate's existing use of `proptest`.

use bytes::Bytes;
use proptest::prelude::*;
use squidcache::cache::{MAX_CACHE_SIZE, MAX_OBJECT_SIZE};
use squidcache::ProxyCache;

fn body(size: usize) -> Bytes {
    Bytes::from(vec![b'a'; size])
}

proptest! {
    // P1: total cache size never exceeds MAX_CACHE_SIZE, however the
    // admission sequence is shaped.
    #[test]
    fn prop_capacity_never_exceeded(sizes in prop::collection::vec(1usize..MAX_OBJECT_SIZE, 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let cache = ProxyCache::new();
            for (i, size) in sizes.iter().enumerate() {
                let key = format!("/o{i}");
                cache.admit(&key, body(*size)).await;
            }
            prop_assert!(cache.current_size().await <= MAX_CACHE_SIZE);
            Ok(())
        })?;
    }

    // P2: no admitted entry ever exceeds MAX_OBJECT_SIZE; oversized bodies
    // are rejected outright rather than truncated.
    #[test]
    fn prop_oversized_bodies_never_admitted(extra in 1usize..10_000) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let cache = ProxyCache::new();
            let key = "/big";
            cache.admit(key, body(MAX_OBJECT_SIZE + extra)).await;
            prop_assert!(cache.lookup(key).await.is_none());
            prop_assert_eq!(cache.current_size().await, 0);
            Ok(())
        })?;
    }

    // P5: admitting the same key repeatedly never produces more than one
    // entry for it.
    #[test]
    fn prop_duplicate_admission_preserves_uniqueness(n in 1usize..20) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(async {
            let cache = ProxyCache::new();
            for _ in 0..n {
                cache.admit("/dup", body(100)).await;
            }
            prop_assert_eq!(cache.len().await, 1);
            Ok(())
        })?;
    }
}

// P3: forcing eviction removes the entry with the smallest pre-eviction
// last_access (here: the first one admitted, since none were touched).
#[tokio::test]
async fn prop_eviction_picks_true_lru_victim() {
    let cache = ProxyCache::new();
    let object_size = MAX_OBJECT_SIZE;
    let capacity = MAX_CACHE_SIZE / object_size;

    for i in 0..capacity {
        let key = format!("/o{i}");
        cache.admit(&key, body(object_size)).await;
    }

    // Force one more eviction.
    cache.admit("/on", body(object_size)).await;

    assert!(cache.lookup("/o0").await.is_none(), "oldest entry must be evicted");
    assert!(cache.lookup("/on").await.is_some());
    assert!(cache.current_size().await <= MAX_CACHE_SIZE);
}

// P4: a hit strictly increases last_access, making the touched entry
// ineligible as the next victim relative to peers it previously tied or
// trailed.
#[tokio::test]
async fn prop_hit_refresh_outranks_untouched_peers() {
    let cache = ProxyCache::new();
    let object_size = MAX_OBJECT_SIZE;
    let capacity = MAX_CACHE_SIZE / object_size;

    for i in 0..capacity {
        let key = format!("/o{i}");
        cache.admit(&key, body(object_size)).await;
    }

    // /o0 was the first admitted (smallest last_access). Touch it so it is
    // refreshed past every other entry, then force a single eviction.
    cache.lookup("/o0").await;
    cache.admit("/on", body(object_size)).await;

    assert!(cache.lookup("/o0").await.is_some(), "refreshed entry must survive");
    assert!(cache.lookup("/o1").await.is_none(), "next-oldest entry becomes the victim");
}

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use audit_engine::{ApiError, Clock, ResultCache};
use pretty_assertions::assert_eq;

fn manual_clock(start_ms: u64) -> (Clock, Arc<AtomicU64>) {
    let now = Arc::new(AtomicU64::new(start_ms));
    let handle = Arc::clone(&now);
    (Arc::new(move || handle.load(Ordering::SeqCst)), now)
}

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_load() {
    let cache: ResultCache<String> = ResultCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let call = || {
        let calls = Arc::clone(&calls);
        cache.with_cache("k", 60, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok::<_, ApiError>("value".to_string())
        })
    };

    let results = tokio::join!(call(), call(), call(), call(), call());
    let results = [results.0, results.1, results.2, results.3, results.4];

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result, Ok("value".to_string()));
    }
    assert_eq!(cache.get("k"), Some("value".to_string()));
}

#[tokio::test(start_paused = true)]
async fn coalesced_callers_share_the_rejection_and_it_is_not_cached() {
    let cache: ResultCache<u32> = ResultCache::new();
    let calls = Arc::new(AtomicUsize::new(0));

    let failing = || {
        let calls = Arc::clone(&calls);
        cache.with_cache("k", 60, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err::<u32, _>(ApiError::upstream(502, "boom"))
        })
    };
    let (a, b) = tokio::join!(failing(), failing());
    assert_eq!(a, Err(ApiError::upstream(502, "boom")));
    assert_eq!(a, b);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get("k"), None);

    let retried = cache.with_cache("k", 60, || async { Ok(7) }).await;
    assert_eq!(retried, Ok(7));
}

#[tokio::test]
async fn entries_expire_after_ttl() {
    let (clock, now) = manual_clock(1_000_000);
    let cache: ResultCache<u32> = ResultCache::with_clock(clock);
    let calls = Arc::new(AtomicUsize::new(0));

    let load = |value: u32| {
        let calls = Arc::clone(&calls);
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, ApiError>(value)
        }
    };

    assert_eq!(cache.with_cache("k", 10, load(1)).await, Ok(1));
    now.fetch_add(9_000, Ordering::SeqCst);
    assert_eq!(cache.with_cache("k", 10, load(2)).await, Ok(1));
    now.fetch_add(1_000, Ordering::SeqCst);
    assert_eq!(cache.with_cache("k", 10, load(3)).await, Ok(3));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn zero_ttl_still_lives_one_second() {
    let (clock, now) = manual_clock(5_000);
    let cache: ResultCache<u32> = ResultCache::with_clock(clock);

    cache.set("k", 1, 0);
    assert_eq!(cache.get("k"), Some(1));
    now.fetch_add(1_000, Ordering::SeqCst);
    assert_eq!(cache.get("k"), None);
}

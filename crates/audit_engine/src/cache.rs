use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use audit_logging::{audit_debug, audit_trace};
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::clock::{system_clock, Clock};
use crate::ApiError;

type Pending<T> = Shared<BoxFuture<'static, Result<T, ApiError>>>;

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at_secs: u64,
}

struct Inner<T> {
    store: Mutex<HashMap<String, CacheEntry<T>>>,
    inflight: Mutex<HashMap<String, Pending<T>>>,
    now_ms: Clock,
}

impl<T: Clone> Inner<T> {
    fn now_secs(&self) -> u64 {
        (self.now_ms)() / 1000
    }

    fn get(&self, key: &str) -> Option<T> {
        let now = self.now_secs();
        let mut store = self.store.lock().expect("lock cache store");
        match store.get(key) {
            Some(entry) if entry.expires_at_secs > now => Some(entry.value.clone()),
            Some(_) => {
                store.remove(key);
                audit_trace!("Cache entry expired key={}", key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: T, ttl_seconds: u64) {
        let expires_at_secs = self.now_secs() + ttl_seconds.max(1);
        self.store.lock().expect("lock cache store").insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at_secs,
            },
        );
    }
}

/// Process-wide TTL cache with in-flight coalescing.
///
/// Concurrent callers for the same missing key share one loader run and
/// receive the same value or the same error. Errors are never stored.
pub struct ResultCache<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for ResultCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ResultCache<T> {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(now_ms: Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(HashMap::new()),
                inflight: Mutex::new(HashMap::new()),
                now_ms,
            }),
        }
    }

    /// Unexpired value for `key`; an expired entry is evicted on the way.
    pub fn get(&self, key: &str) -> Option<T> {
        self.inner.get(key)
    }

    pub fn set(&self, key: &str, value: T, ttl_seconds: u64) {
        self.inner.set(key, value, ttl_seconds);
    }

    pub async fn with_cache<F, Fut>(
        &self,
        key: &str,
        ttl_seconds: u64,
        loader: F,
    ) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        if let Some(value) = self.inner.get(key) {
            audit_debug!("Cache hit key={}", key);
            return Ok(value);
        }

        let pending = {
            let mut inflight = self.inner.inflight.lock().expect("lock cache inflight");
            if let Some(existing) = inflight.get(key) {
                audit_debug!("Joining in-flight load key={}", key);
                existing.clone()
            } else if let Some(value) = self.inner.get(key) {
                // Another load finished between the first lookup and the lock.
                return Ok(value);
            } else {
                audit_debug!("Cache miss key={}", key);
                let inner = Arc::clone(&self.inner);
                let owned_key = key.to_string();
                let load = loader();
                let shared = async move {
                    let result = load.await;
                    if let Ok(value) = &result {
                        inner.set(&owned_key, value.clone(), ttl_seconds);
                    }
                    inner
                        .inflight
                        .lock()
                        .expect("lock cache inflight")
                        .remove(&owned_key);
                    result
                }
                .boxed()
                .shared();
                inflight.insert(key.to_string(), shared.clone());
                shared
            }
        };

        pending.await
    }
}

//! At-most-once execution cache for unsafe write endpoints.
//!
//! Clients retrying a write (an upload, an import) present an
//! `Idempotency-Key` header; the cache guarantees the underlying processor
//! runs exactly once per `(process, key)` and that every replay observes
//! the identical stored result.
//!
//! Entries are written once after the first successful execution and never
//! mutated. State is process-local with no eviction: unbounded growth over
//! a long process lifetime is a documented trade-off, and [`len`] exists so
//! it can be watched.
//!
//! [`len`]: IdempotencyCache::len

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Write-once cache with per-key execution serialization.
///
/// Two concurrent requests carrying the same key race to a per-key async
/// mutex: the loser waits, then observes the winner's stored result instead
/// of running the processor again.
pub struct IdempotencyCache<V> {
    entries: Mutex<HashMap<String, Arc<tokio::sync::Mutex<Option<V>>>>>,
}

impl<V> Default for IdempotencyCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> IdempotencyCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the client-supplied key syntax: `^[A-Za-z0-9_-]{1,255}$`.
    pub fn is_valid_key(key: &str) -> bool {
        !key.is_empty()
            && key.len() <= 255
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
    }

    /// Returns the stored result for `key`, running `compute` only when the
    /// key has never completed successfully.
    ///
    /// Errors from `compute` propagate and leave no entry behind, so a
    /// failed first attempt may be retried with the same key.
    pub async fn get_or_compute<F, Fut, E>(&self, key: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let slot = {
            let mut entries = self.entries.lock().unwrap();
            Arc::clone(entries.entry(key.to_string()).or_default())
        };

        let mut stored = slot.lock().await;
        if let Some(value) = stored.as_ref() {
            return Ok(value.clone());
        }

        let value = compute().await?;
        *stored = Some(value.clone());
        Ok(value)
    }

    /// True when a result has been stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(key)
            .is_some_and(|slot| slot.try_lock().map(|v| v.is_some()).unwrap_or(false))
    }

    /// Number of keys ever seen (including in-flight ones).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn first_call_computes_and_stores() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();

        let value: Result<u32, ()> = cache.get_or_compute("abc123", || async { Ok(41) }).await;
        assert_eq!(value.unwrap(), 41);
        assert!(cache.contains("abc123"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn replay_returns_stored_without_recomputing() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: Result<u32, ()> = cache
                .get_or_compute("k", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(7)
                })
                .await;
            assert_eq!(value.unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_compute_independently() {
        let cache: IdempotencyCache<&'static str> = IdempotencyCache::new();

        let a: Result<_, ()> = cache.get_or_compute("a", || async { Ok("first") }).await;
        let b: Result<_, ()> = cache.get_or_compute("b", || async { Ok("second") }).await;
        assert_eq!(a.unwrap(), "first");
        assert_eq!(b.unwrap(), "second");
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn failed_compute_is_not_cached() {
        let cache: IdempotencyCache<u32> = IdempotencyCache::new();

        let failed: Result<u32, &str> = cache.get_or_compute("k", || async { Err("io") }).await;
        assert!(failed.is_err());
        assert!(!cache.contains("k"));

        let retried: Result<u32, &str> = cache.get_or_compute("k", || async { Ok(1) }).await;
        assert_eq!(retried.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_same_key_runs_processor_once() {
        let cache: Arc<IdempotencyCache<u32>> = Arc::new(IdempotencyCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_compute("same", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        // Hold the slot across an await point so racers queue.
                        tokio::task::yield_now().await;
                        Ok::<u32, ()>(99)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 99);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn key_syntax_validation() {
        assert!(IdempotencyCache::<u32>::is_valid_key("abc123"));
        assert!(IdempotencyCache::<u32>::is_valid_key("A-b_9"));
        assert!(IdempotencyCache::<u32>::is_valid_key(&"x".repeat(255)));

        assert!(!IdempotencyCache::<u32>::is_valid_key(""));
        assert!(!IdempotencyCache::<u32>::is_valid_key("bad key"));
        assert!(!IdempotencyCache::<u32>::is_valid_key("emoji🔥"));
        assert!(!IdempotencyCache::<u32>::is_valid_key(&"x".repeat(256)));
    }
}

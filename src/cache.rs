//! # Expiring Cache
//!
//! Keyed cache of immutable, shared entries that carry their own expiry.
//!
//! Used for both Vault sessions and provider clients. Entries are published
//! once as `Arc<V>` and never mutated; an entry is only ever removed because it
//! expired, and replaced by building a new one on the next miss.
//!
//! Two locks keep concurrent callers honest:
//! - the entry map lock makes lookup-and-evict a single step, so a reader can
//!   never observe an entry another caller is in the middle of evicting
//! - a per-key async build lock makes construction single-flight, so N
//!   concurrent misses for the same key produce one build, not N. The lock
//!   is dropped once the last waiter is through.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Mutex as AsyncMutex;

/// Something that knows when it stops being usable
pub trait Expiring {
    fn is_expired_at(&self, now: DateTime<Utc>) -> bool;
}

/// Outcome of a cache lookup
#[derive(Debug)]
pub enum Lookup<V> {
    /// A live entry
    Hit(Arc<V>),
    /// An entry was present but expired; it has already been evicted
    Expired(Arc<V>),
    Miss,
}

pub struct ExpiringCache<V> {
    entries: Mutex<HashMap<String, Arc<V>>>,
    build_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<V> std::fmt::Debug for ExpiringCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExpiringCache")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl<V> Default for ExpiringCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            build_locks: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Expiring> ExpiringCache<V> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, evicting it if expired
    pub fn lookup(&self, key: &str) -> Lookup<V> {
        self.lookup_at(key, Utc::now())
    }

    pub(crate) fn lookup_at(&self, key: &str, now: DateTime<Utc>) -> Lookup<V> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            None => Lookup::Miss,
            Some(entry) if !entry.is_expired_at(now) => Lookup::Hit(Arc::clone(entry)),
            Some(_) => match entries.remove(key) {
                Some(evicted) => Lookup::Expired(evicted),
                None => Lookup::Miss,
            },
        }
    }

    /// Live entry for `key`, if any
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        match self.lookup(key) {
            Lookup::Hit(entry) => Some(entry),
            Lookup::Expired(_) | Lookup::Miss => None,
        }
    }

    /// Publish `value` under `key`, replacing whatever was there
    pub fn insert(&self, key: &str, value: V) -> Arc<V> {
        let entry = Arc::new(value);
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::clone(&entry));
        entry
    }

    /// Return the live entry for `key`, building it with `build` on a miss
    ///
    /// Builds for the same key are serialized; a caller that waited on another
    /// caller's build re-checks the map and returns that result instead of
    /// building again. A failed build publishes nothing.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, build: F) -> Result<Arc<V>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(entry) = self.get(key) {
            return Ok(entry);
        }

        let build_lock = self.build_lock(key);
        let guard = build_lock.lock().await;

        let result = match self.get(key) {
            Some(entry) => Ok(entry),
            None => build().await.map(|value| self.insert(key, value)),
        };

        self.prune_build_lock(key, &build_lock);
        drop(guard);
        result
    }

    fn build_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .build_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Drop the build lock for `key` unless another caller is queued on it
    fn prune_build_lock(&self, key: &str, build_lock: &Arc<AsyncMutex<()>>) {
        let mut locks = self
            .build_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one held by the caller
        if Arc::strong_count(build_lock) == 2 {
            locks.remove(key);
        }
    }
}

impl<V> ExpiringCache<V> {
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Entry {
        value: u32,
        expires_at: DateTime<Utc>,
    }

    impl Expiring for Entry {
        fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
            now >= self.expires_at
        }
    }

    fn fresh(value: u32) -> Entry {
        Entry {
            value,
            expires_at: Utc::now() + chrono::Duration::hours(1),
        }
    }

    fn stale(value: u32) -> Entry {
        Entry {
            value,
            expires_at: Utc::now() - chrono::Duration::seconds(1),
        }
    }

    #[test]
    fn test_lookup_hit_and_miss() {
        let cache = ExpiringCache::new();
        assert!(matches!(cache.lookup("a"), Lookup::Miss));
        cache.insert("a", fresh(1));
        match cache.lookup("a") {
            Lookup::Hit(entry) => assert_eq!(entry.value, 1),
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn test_expired_entry_is_evicted_on_lookup() {
        let cache = ExpiringCache::new();
        cache.insert("a", stale(1));
        assert!(matches!(cache.lookup("a"), Lookup::Expired(_)));
        assert!(cache.is_empty());
        assert!(matches!(cache.lookup("a"), Lookup::Miss));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let cache = ExpiringCache::new();
        let expires_at = Utc::now() + chrono::Duration::seconds(30);
        cache.insert("a", Entry { value: 1, expires_at });
        assert!(matches!(
            cache.lookup_at("a", expires_at - chrono::Duration::milliseconds(1)),
            Lookup::Hit(_)
        ));
        assert!(matches!(cache.lookup_at("a", expires_at), Lookup::Expired(_)));
    }

    #[tokio::test]
    async fn test_get_or_try_insert_with_replaces_expired() {
        let cache = ExpiringCache::new();
        cache.insert("a", stale(1));
        let entry = cache
            .get_or_try_insert_with("a", || async { Ok::<_, ()>(fresh(2)) })
            .await
            .unwrap();
        assert_eq!(entry.value, 2);
    }

    #[tokio::test]
    async fn test_failed_build_publishes_nothing() {
        let cache: ExpiringCache<Entry> = ExpiringCache::new();
        let result = cache
            .get_or_try_insert_with("a", || async { Err::<Entry, _>("boom") })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_misses_build_once() {
        let cache = Arc::new(ExpiringCache::new());
        let builds = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let builds = Arc::clone(&builds);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_insert_with("shared", || async {
                        builds.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<_, ()>(fresh(7))
                    })
                    .await
                    .unwrap()
                    .value
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 7);
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(cache.build_locks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_build_locks_do_not_accumulate() {
        let cache = ExpiringCache::new();
        for key in ["a", "b", "c"] {
            cache
                .get_or_try_insert_with(key, || async { Ok::<_, ()>(fresh(1)) })
                .await
                .unwrap();
        }
        let _ = cache
            .get_or_try_insert_with("d", || async { Err::<Entry, _>("boom") })
            .await;

        assert_eq!(cache.len(), 3);
        assert!(cache.build_locks.lock().unwrap().is_empty());
    }
}

//! TTL cache keyed by [`CacheKey`], on top of `moka`.
//!
//! Each entry carries its own TTL, applied through a [`moka::Expiry`]. A
//! bounded cache lets moka evict when `max_capacity` is reached.
//!
//! Entries also record their deadline on the tokio clock, so paused-clock
//! tests can step over a TTL with `tokio::time::advance`. A TTL too large to
//! represent means the entry never expires.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use moka::Expiry;
use tokio::time::Instant;
use tracing::debug;

use crate::keys::CacheKey;

/// TTLs above this are treated as "never expires".
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    ttl: Option<Duration>,
    deadline: Option<Instant>,
}

impl<V> Entry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        let ttl = (ttl <= MAX_TTL).then_some(ttl);
        Self {
            value,
            deadline: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }
}

struct EntryTtl;

impl<V> Expiry<CacheKey, Entry<V>> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &CacheKey,
        entry: &Entry<V>,
        _created_at: std::time::Instant,
    ) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &CacheKey,
        entry: &Entry<V>,
        _updated_at: std::time::Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

/// A TTL cache keyed by [`CacheKey`].
pub struct KeyedCache<V> {
    inner: Cache<CacheKey, Entry<V>>,
    capacity: Option<u64>,
}

impl<V: Clone + Send + Sync + 'static> KeyedCache<V> {
    /// Create an unbounded cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Cache::builder().expire_after(EntryTtl).build(),
            capacity: None,
        }
    }

    /// Create a cache holding at most `capacity` entries (minimum 1).
    #[must_use]
    pub fn bounded(capacity: usize) -> Self {
        let capacity = u64::try_from(capacity).unwrap_or(u64::MAX).max(1);
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .expire_after(EntryTtl)
                .build(),
            capacity: Some(capacity),
        }
    }

    /// Look up a live entry.
    ///
    /// Returns `None` when the key is absent or its TTL has elapsed.
    pub async fn get(&self, key: &CacheKey) -> Option<V> {
        let entry = self.inner.get(key).await?;
        if entry.is_expired() {
            self.inner.invalidate(key).await;
            debug!(key = %key, "cache entry expired");
            return None;
        }
        Some(entry.value)
    }

    /// Insert or overwrite an entry that lives for `ttl`.
    pub async fn set(&self, key: CacheKey, value: V, ttl: Duration) {
        self.inner.insert(key, Entry::new(value, ttl)).await;
    }

    /// Remove an entry. Returns whether one was present.
    pub async fn delete(&self, key: &CacheKey) -> bool {
        self.inner.remove(key).await.is_some()
    }

    /// Remove every entry in `namespace`. Returns how many were removed.
    pub async fn delete_namespace(&self, namespace: &str) -> usize {
        let keys: Vec<Arc<CacheKey>> = self
            .inner
            .iter()
            .filter(|(key, _)| key.namespace() == namespace)
            .map(|(key, _)| key)
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.inner.remove(key.as_ref()).await.is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every entry.
    pub async fn clear(&self) {
        let keys: Vec<Arc<CacheKey>> = self.inner.iter().map(|(key, _)| key).collect();
        for key in keys {
            self.inner.invalidate(key.as_ref()).await;
        }
    }

    /// Number of stored entries, after pending evictions have run.
    pub async fn len(&self) -> u64 {
        self.inner.run_pending_tasks().await;
        self.inner.entry_count()
    }

    /// Whether the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entry count without running pending maintenance; may lag behind.
    #[must_use]
    pub fn approximate_len(&self) -> u64 {
        self.inner.entry_count()
    }
}

impl<V: Clone + Send + Sync + 'static> Default for KeyedCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for KeyedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedCache")
            .field("capacity", &self.capacity)
            .field("entries", &self.inner.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{ns, CacheKey};
    use serde_json::json;

    fn key(id: &str) -> CacheKey {
        CacheKey::new(ns::ORDERS, "findById", &json!({ "id": id }))
    }

    #[tokio::test(start_paused = true)]
    async fn entry_lives_until_ttl_elapses() {
        let cache = KeyedCache::new();
        cache.set(key("a"), 1, Duration::from_secs(60)).await;

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&key("a")).await, Some(1));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&key("a")).await, None);
        assert!(cache.is_empty().await, "expired entry is purged on access");
    }

    #[tokio::test(start_paused = true)]
    async fn overwrite_refreshes_ttl() {
        let cache = KeyedCache::new();
        cache.set(key("a"), 1, Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        cache.set(key("a"), 2, Duration::from_secs(10)).await;
        tokio::time::advance(Duration::from_secs(8)).await;
        assert_eq!(cache.get(&key("a")).await, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_is_a_miss() {
        let cache = KeyedCache::new();
        cache.set(key("a"), 1, Duration::ZERO).await;
        assert_eq!(cache.get(&key("a")).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn unrepresentable_ttl_never_expires() {
        let cache = KeyedCache::new();
        cache.set(key("a"), 1, Duration::from_secs(u64::MAX / 60 * 60)).await;
        cache.set(key("b"), 2, Duration::MAX).await;

        tokio::time::advance(Duration::from_secs(365 * 24 * 60 * 60)).await;
        assert_eq!(cache.get(&key("a")).await, Some(1));
        assert_eq!(cache.get(&key("b")).await, Some(2));
    }

    #[tokio::test]
    async fn delete_and_namespace_invalidation() {
        let cache = KeyedCache::new();
        cache.set(key("a"), 1, Duration::from_secs(60)).await;
        cache.set(key("b"), 2, Duration::from_secs(60)).await;
        cache
            .set(
                CacheKey::new(ns::ADMIN, "adminEmails", &serde_json::Value::Null),
                3,
                Duration::from_secs(60),
            )
            .await;

        assert!(cache.delete(&key("a")).await);
        assert!(!cache.delete(&key("a")).await);
        assert_eq!(cache.delete_namespace(ns::ORDERS).await, 1);
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn bounded_cache_stays_within_capacity() {
        let cache = KeyedCache::bounded(2);
        for id in ["a", "b", "c", "d", "e"] {
            cache.set(key(id), id, Duration::from_secs(600)).await;
        }

        assert!(cache.len().await <= 2);
    }
}

//! Shared Store
//!
//! Serializes access to an [`ExpiringLruStore`] from many tasks.
//!
//! Every store operation is a read-then-write sequence (lazy purge, LRU
//! promotion, eviction), so reads need exclusive access too. A single
//! mutex guards each call; values are cloned out so no borrow outlives
//! the lock.

use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, MutexGuard};

use crate::cache::{CacheStats, Clock, ExpiringLruStore, Expiry, SystemClock};
use crate::config::Config;
use crate::error::Result;

/// Cloneable handle to a store behind one exclusive lock.
pub struct SharedStore<K, V, C = SystemClock> {
    inner: Arc<Mutex<ExpiringLruStore<K, V, C>>>,
}

impl<K, V, C> Clone for SharedStore<K, V, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> SharedStore<K, V, SystemClock>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a shared store from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        ExpiringLruStore::from_config(config).map(Self::new)
    }
}

impl<K, V, C> SharedStore<K, V, C>
where
    K: Hash + Eq + Clone,
    V: Clone,
    C: Clock,
{
    /// Wraps an existing store.
    pub fn new(store: ExpiringLruStore<K, V, C>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Locks the store for a multi-step operation.
    pub async fn lock(&self) -> MutexGuard<'_, ExpiringLruStore<K, V, C>> {
        self.inner.lock().await
    }

    /// Stores a value under the default TTL.
    pub async fn set(&self, key: K, value: V) {
        self.inner.lock().await.set(key, value);
    }

    /// Stores a value with an explicit lifetime.
    pub async fn set_with_ttl(&self, key: K, value: V, expiry: impl Into<Expiry>) {
        self.inner.lock().await.set_with_ttl(key, value, expiry);
    }

    /// Clones out a live value, promoting it.
    pub async fn get(&self, key: &K) -> Result<V> {
        self.inner.lock().await.get(key).cloned()
    }

    /// Clones out a live value with its deadline.
    pub async fn get_with_deadline(&self, key: &K) -> Result<(V, DateTime<Utc>)> {
        let mut store = self.inner.lock().await;
        store
            .get_with_deadline(key)
            .map(|(value, deadline)| (value.clone(), deadline))
    }

    /// Time left before `key` expires.
    pub async fn ttl(&self, key: &K) -> Result<TimeDelta> {
        self.inner.lock().await.ttl(key)
    }

    /// Absolute deadline of `key`.
    pub async fn deadline_of(&self, key: &K) -> Result<DateTime<Utc>> {
        self.inner.lock().await.deadline_of(key)
    }

    /// Extends the deadline of a live entry.
    pub async fn refresh(&self, key: &K, expiry: impl Into<Expiry>) -> Result<()> {
        self.inner.lock().await.refresh(key, expiry)
    }

    /// Checks for a live entry without promoting it.
    pub async fn contains(&self, key: &K) -> bool {
        self.inner.lock().await.contains(key)
    }

    /// Removes an entry and returns its value.
    pub async fn delete(&self, key: &K) -> Result<V> {
        self.inner.lock().await.delete(key)
    }

    /// Removes the least recently used live entry.
    pub async fn pop_lru(&self) -> Result<(K, V)> {
        self.inner.lock().await.pop_lru()
    }

    /// Removes the most recently used live entry.
    pub async fn pop_mru(&self) -> Result<(K, V)> {
        self.inner.lock().await.pop_mru()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    /// Live keys, least recently used first.
    pub async fn keys(&self) -> Vec<K> {
        self.inner.lock().await.keys().cloned().collect()
    }

    /// Live `(key, value, deadline)` triples, least recently used first.
    pub async fn items(&self) -> Vec<(K, V, DateTime<Utc>)> {
        let mut store = self.inner.lock().await;
        store
            .entries()
            .map(|entry| (entry.key.clone(), entry.value.clone(), entry.deadline))
            .collect()
    }

    /// Drops every entry.
    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    /// Changes the capacity bound.
    pub async fn set_capacity(&self, capacity: Option<usize>) -> Result<()> {
        self.inner.lock().await.set_capacity(capacity)
    }

    /// Snapshot of store statistics.
    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::error::StoreError;
    use chrono::TimeZone;

    fn shared(capacity: usize) -> (SharedStore<String, String, ManualClock>, ManualClock) {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let store =
            ExpiringLruStore::with_clock(Some(capacity), TimeDelta::seconds(300), clock.clone())
                .unwrap();
        (SharedStore::new(store), clock)
    }

    #[tokio::test]
    async fn test_shared_set_get_delete() {
        let (store, _clock) = shared(10);

        store.set("k".to_string(), "v".to_string()).await;
        assert_eq!(store.get(&"k".to_string()).await, Ok("v".to_string()));
        assert_eq!(store.delete(&"k".to_string()).await, Ok("v".to_string()));
        assert_eq!(store.get(&"k".to_string()).await, Err(StoreError::KeyNotFound));
    }

    #[tokio::test]
    async fn test_shared_clones_see_same_store() {
        let (store, clock) = shared(10);
        let other = store.clone();

        store
            .set_with_ttl("k".to_string(), "v".to_string(), Expiry::Seconds(5))
            .await;
        assert!(other.contains(&"k".to_string()).await);

        clock.advance(TimeDelta::seconds(5));
        assert!(!other.contains(&"k".to_string()).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_shared_concurrent_writers_respect_capacity() {
        let (store, _clock) = shared(8);

        let mut handles = Vec::new();
        for task in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    store.set(format!("t{task}-{i}"), format!("{i}")).await;
                    let _ = store.get(&format!("t{task}-{}", i / 2)).await;
                }
            }));
        }
        for handle in handles {
            handle.await.expect("task should not panic");
        }

        assert_eq!(store.len().await, 8);
        let stats = store.stats().await;
        assert_eq!(stats.total_entries, 8);
        assert_eq!(stats.evictions, 16 * 25 - 8);
    }

    #[tokio::test]
    async fn test_shared_lock_for_multi_step_operation() {
        let (store, _clock) = shared(10);
        store.set("a".to_string(), "1".to_string()).await;

        {
            let mut guard = store.lock().await;
            let next = guard.get("a").map(|v| format!("{v}1")).unwrap();
            guard.set("a".to_string(), next);
        }

        assert_eq!(store.get(&"a".to_string()).await, Ok("11".to_string()));
    }

    #[tokio::test]
    async fn test_shared_items_and_pops() {
        let (store, _clock) = shared(10);
        store.set("a".to_string(), "1".to_string()).await;
        store.set("b".to_string(), "2".to_string()).await;
        store.set("c".to_string(), "3".to_string()).await;

        let items = store.items().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].0, "a");

        assert_eq!(store.pop_lru().await, Ok(("a".to_string(), "1".to_string())));
        assert_eq!(store.pop_mru().await, Ok(("c".to_string(), "3".to_string())));
        assert_eq!(store.keys().await, vec!["b".to_string()]);
    }
}

//! Cache Store Module
//!
//! Main store engine combining key lookup with LRU ordering and lazy TTL
//! expiration.

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hash;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, trace};

use crate::cache::{CacheStats, Clock, Entry, Expiry, RecencyList, SystemClock};
use crate::config::Config;
use crate::error::{Result, StoreError};

/// Callback run with the key and value of every entry evicted for capacity.
pub type EvictionListener<K, V> = Box<dyn FnMut(&K, &V) + Send>;

// == Expiring LRU Store ==
/// Bounded key-value store with per-entry deadlines and LRU eviction.
///
/// Expiration is lazy: an entry whose deadline has passed stays in memory
/// until an operation touches it or the next insert of a new key sweeps it,
/// but it is never returned, counted or iterated.
///
/// Every read (`get`, `get_or`, `get_mut`, `get_with_deadline`, `ttl`,
/// `deadline_of`) promotes the key to most recently used. `contains`, `len`
/// and iteration do not.
///
/// The store has no interior locking; see [`crate::SharedStore`] for a
/// wrapper that serializes access from many tasks.
pub struct ExpiringLruStore<K, V, C = SystemClock> {
    /// Key to arena slot
    index: HashMap<K, usize>,
    /// Entries in recency order
    order: RecencyList<Entry<K, V>>,
    stats: CacheStats,
    /// Maximum number of live entries, None = unlimited
    capacity: Option<usize>,
    default_ttl: TimeDelta,
    clock: C,
    /// `(deadline, slot)` of every stored entry, soonest first
    deadlines: BTreeSet<(DateTime<Utc>, usize)>,
    on_evict: Option<EvictionListener<K, V>>,
}

impl<K, V> ExpiringLruStore<K, V, SystemClock>
where
    K: Hash + Eq + Clone,
{
    // == Constructors ==
    /// Creates a store holding at most `capacity` live entries.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `capacity` is zero or `default_ttl` is negative.
    pub fn new(capacity: usize, default_ttl: TimeDelta) -> Result<Self> {
        Self::with_clock(Some(capacity), default_ttl, SystemClock)
    }

    /// Creates a store with no capacity bound.
    pub fn unbounded(default_ttl: TimeDelta) -> Result<Self> {
        Self::with_clock(None, default_ttl, SystemClock)
    }

    /// Creates a store from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_clock(
            config.max_entries,
            ttl_from_secs(config.default_ttl),
            SystemClock,
        )
    }

    // == Bulk Constructors ==
    /// Builds a store mapping every key in `keys` to a clone of `value`.
    ///
    /// When `capacity` is None it defaults to the number of keys.
    pub fn from_keys<I>(
        keys: I,
        value: V,
        capacity: Option<usize>,
        default_ttl: TimeDelta,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        V: Clone,
    {
        Self::from_keys_with_clock(keys, value, capacity, default_ttl, SystemClock)
    }

    /// Builds a store from `(key, value, expiry)` items, inserted in order.
    ///
    /// When `capacity` is None it defaults to the number of items.
    pub fn from_mapping<I, E>(
        items: I,
        capacity: Option<usize>,
        default_ttl: TimeDelta,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V, E)>,
        E: Into<Expiry>,
    {
        Self::from_mapping_with_clock(items, capacity, default_ttl, SystemClock)
    }
}

impl<K, V, C> ExpiringLruStore<K, V, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    /// Creates a store reading time from `clock`.
    ///
    /// `capacity` of None means unlimited.
    ///
    /// # Errors
    /// `InvalidConfiguration` if `capacity` is `Some(0)` or `default_ttl` is negative.
    pub fn with_clock(capacity: Option<usize>, default_ttl: TimeDelta, clock: C) -> Result<Self> {
        validate_capacity(capacity)?;
        validate_default_ttl(default_ttl)?;

        debug!(?capacity, default_ttl_ms = default_ttl.num_milliseconds(), "store created");
        Ok(Self {
            index: HashMap::new(),
            order: RecencyList::new(),
            stats: CacheStats::new(),
            capacity,
            default_ttl,
            clock,
            deadlines: BTreeSet::new(),
            on_evict: None,
        })
    }

    /// [`from_keys`](ExpiringLruStore::from_keys) reading time from `clock`.
    pub fn from_keys_with_clock<I>(
        keys: I,
        value: V,
        capacity: Option<usize>,
        default_ttl: TimeDelta,
        clock: C,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
        V: Clone,
    {
        let keys: Vec<K> = keys.into_iter().collect();
        let capacity = capacity.unwrap_or(keys.len().max(1));
        let mut store = Self::with_clock(Some(capacity), default_ttl, clock)?;
        for key in keys {
            store.set(key, value.clone());
        }
        Ok(store)
    }

    /// [`from_mapping`](ExpiringLruStore::from_mapping) reading time from `clock`.
    pub fn from_mapping_with_clock<I, E>(
        items: I,
        capacity: Option<usize>,
        default_ttl: TimeDelta,
        clock: C,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V, E)>,
        E: Into<Expiry>,
    {
        let items: Vec<(K, V, E)> = items.into_iter().collect();
        let capacity = capacity.unwrap_or(items.len().max(1));
        let mut store = Self::with_clock(Some(capacity), default_ttl, clock)?;
        store.update(items);
        Ok(store)
    }

    /// Registers a callback run for every entry evicted to respect capacity.
    ///
    /// Expired purges, deletes and pops do not trigger it.
    pub fn with_eviction_listener<F>(mut self, listener: F) -> Self
    where
        F: FnMut(&K, &V) + Send + 'static,
    {
        self.on_evict = Some(Box::new(listener));
        self
    }

    /// Copies the live entries of `source` into a new store.
    ///
    /// Each entry keeps its own deadline; `capacity` and `default_ttl` fall
    /// back to the source's settings. Entries are inserted least recently
    /// used first, so recency order carries over.
    pub fn from_store(
        source: &Self,
        capacity: Option<usize>,
        default_ttl: Option<TimeDelta>,
    ) -> Result<Self>
    where
        V: Clone,
        C: Clone,
    {
        let mut store = Self::with_clock(
            capacity.or(source.capacity),
            default_ttl.unwrap_or(source.default_ttl),
            source.clock.clone(),
        )?;
        let now = source.clock.now();
        for entry in source.live_entries(now) {
            store.set_with_ttl(entry.key.clone(), entry.value.clone(), entry.deadline);
        }
        Ok(store)
    }

    // == Set ==
    /// Stores a value under the default TTL.
    pub fn set(&mut self, key: K, value: V) {
        self.set_with_ttl(key, value, Expiry::Default);
    }

    /// Stores a value with an explicit lifetime.
    ///
    /// An existing key has its value and deadline replaced and becomes most
    /// recently used. A new key first sweeps out expired entries, then evicts
    /// the least recently used live entry if the store is still full. Zero or
    /// negative TTLs are accepted and store an already-expired entry.
    pub fn set_with_ttl(&mut self, key: K, value: V, expiry: impl Into<Expiry>) {
        let now = self.clock.now();
        let deadline = expiry.into().deadline(now, self.default_ttl);

        if let Some(&slot) = self.index.get(&key) {
            if let Some(entry) = self.order.get_mut(slot) {
                let previous = std::mem::replace(&mut entry.deadline, deadline);
                entry.value = value;
                entry.created_at = now;
                self.deadlines.remove(&(previous, slot));
                self.deadlines.insert((deadline, slot));
            }
            self.order.touch(slot);
            return;
        }

        // Expired entries go first so they never cost a live entry its place
        self.purge_expired(now);
        self.make_room();

        let slot = self.order.push_front(Entry::new(key.clone(), value, now, deadline));
        self.index.insert(key, slot);
        self.deadlines.insert((deadline, slot));
    }

    /// Inserts `(key, value, expiry)` items one after another.
    pub fn update<I, E>(&mut self, items: I)
    where
        I: IntoIterator<Item = (K, V, E)>,
        E: Into<Expiry>,
    {
        for (key, value, expiry) in items {
            self.set_with_ttl(key, value, expiry);
        }
    }

    // == Get ==
    /// Retrieves a live value and marks it most recently used.
    ///
    /// An expired entry is purged and reported as `KeyNotFound`.
    pub fn get<Q>(&mut self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let slot = self.read_slot(key, now)?;
        self.entry(slot).map(|entry| &entry.value)
    }

    /// Like [`get`](Self::get), falling back to `default` when absent.
    pub fn get_or<'a, Q>(&'a mut self, key: &Q, default: &'a V) -> &'a V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        match self.read_slot(key, now) {
            Ok(slot) => self.order.get(slot).map_or(default, |entry| &entry.value),
            Err(_) => default,
        }
    }

    /// Mutable access to a live value; promotes like [`get`](Self::get).
    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let slot = self.read_slot(key, now)?;
        self.order
            .get_mut(slot)
            .map(|entry| &mut entry.value)
            .ok_or(StoreError::KeyNotFound)
    }

    /// Retrieves a live value together with its absolute deadline.
    pub fn get_with_deadline<Q>(&mut self, key: &Q) -> Result<(&V, DateTime<Utc>)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let slot = self.read_slot(key, now)?;
        self.entry(slot).map(|entry| (&entry.value, entry.deadline))
    }

    // == Time To Live ==
    /// Returns the time left before `key` expires.
    pub fn ttl<Q>(&mut self, key: &Q) -> Result<TimeDelta>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let slot = self.read_slot(key, now)?;
        self.entry(slot).map(|entry| entry.remaining(now))
    }

    /// Returns the absolute deadline of `key`.
    pub fn deadline_of<Q>(&mut self, key: &Q) -> Result<DateTime<Utc>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let slot = self.read_slot(key, now)?;
        self.entry(slot).map(|entry| entry.deadline)
    }

    /// Pushes the deadline of a live entry out to `now + ttl`.
    ///
    /// Never shortens an entry's life: if the current deadline is already
    /// later, only the recency position is refreshed.
    pub fn refresh<Q>(&mut self, key: &Q, expiry: impl Into<Expiry>) -> Result<()>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        let slot = self.live_slot(key, now).ok_or(StoreError::KeyNotFound)?;
        let deadline = expiry.into().deadline(now, self.default_ttl);

        if let Some(entry) = self.order.get_mut(slot) {
            if deadline > entry.deadline {
                let previous = std::mem::replace(&mut entry.deadline, deadline);
                self.deadlines.remove(&(previous, slot));
                self.deadlines.insert((deadline, slot));
            }
        }
        self.order.touch(slot);
        Ok(())
    }

    // == Contains ==
    /// Checks whether `key` holds a live entry, without promoting it.
    pub fn contains<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now();
        self.live_slot(key, now).is_some()
    }

    // == Delete ==
    /// Removes an entry and returns its value.
    ///
    /// The deadline is not consulted: an expired entry that has not been
    /// purged yet is still removed and returned.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key).ok_or(StoreError::KeyNotFound)?;
        self.remove_slot(slot)
            .map(|entry| entry.value)
            .ok_or(StoreError::KeyNotFound)
    }

    // == Pop ==
    /// Removes and returns the least recently used live entry.
    pub fn pop_lru(&mut self) -> Result<(K, V)> {
        self.pop_end(End::Oldest)
    }

    /// Removes and returns the most recently used live entry.
    pub fn pop_mru(&mut self) -> Result<(K, V)> {
        self.pop_end(End::Newest)
    }

    // == Length ==
    /// Returns the number of live entries, purging expired ones first.
    pub fn len(&mut self) -> usize {
        let now = self.clock.now();
        self.purge_expired(now);
        self.order.len()
    }

    /// True when no live entry remains.
    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Returns the number of physically stored entries, including expired
    /// ones not yet purged.
    pub fn stored_len(&self) -> usize {
        self.order.len()
    }

    // == Iteration ==
    /// Iterates live `(key, value)` pairs, least recently used first.
    ///
    /// Expired entries are purged before iteration starts. Each call walks
    /// the store as it is at that moment.
    pub fn iter(&mut self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.entries().map(|entry| (&entry.key, &entry.value))
    }

    /// Iterates live entries with their deadlines, least recently used first.
    pub fn entries(&mut self) -> impl Iterator<Item = &Entry<K, V>> + '_ {
        let now = self.clock.now();
        self.purge_expired(now);
        self.live_entries(now)
    }

    /// Live keys, least recently used first.
    pub fn keys(&mut self) -> impl Iterator<Item = &K> + '_ {
        self.entries().map(|entry| &entry.key)
    }

    /// Live values, least recently used first.
    pub fn values(&mut self) -> impl Iterator<Item = &V> + '_ {
        self.entries().map(|entry| &entry.value)
    }

    // == Clear ==
    /// Drops every entry. Statistics are kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.order.clear();
        self.deadlines.clear();
    }

    // == Settings ==
    /// Maximum number of live entries, None when unlimited.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Changes the capacity bound.
    ///
    /// Shrinking purges expired entries, then evicts least recently used
    /// entries until the live count fits.
    pub fn set_capacity(&mut self, capacity: Option<usize>) -> Result<()> {
        validate_capacity(capacity)?;
        self.capacity = capacity;

        if let Some(limit) = capacity {
            if self.order.len() > limit {
                let now = self.clock.now();
                self.purge_expired(now);
                self.evict_down_to(limit);
            }
        }
        debug!(?capacity, "capacity changed");
        Ok(())
    }

    /// TTL applied when a set does not name one.
    pub fn default_ttl(&self) -> TimeDelta {
        self.default_ttl
    }

    /// Changes the TTL applied to later inserts; stored deadlines are kept.
    pub fn set_default_ttl(&mut self, default_ttl: TimeDelta) -> Result<()> {
        validate_default_ttl(default_ttl)?;
        self.default_ttl = default_ttl;
        Ok(())
    }

    /// The clock deadlines are measured against.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    // == Stats ==
    /// Returns current store statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.order.len());
        stats
    }

    // == Internals ==
    fn entry(&self, slot: usize) -> Result<&Entry<K, V>> {
        self.order.get(slot).ok_or(StoreError::KeyNotFound)
    }

    /// Looks up a live entry for a value read: promotes and records a hit,
    /// or records a miss.
    fn read_slot<Q>(&mut self, key: &Q, now: DateTime<Utc>) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.live_slot(key, now) {
            Some(slot) => {
                self.order.touch(slot);
                self.stats.record_hit();
                trace!("cache hit");
                Ok(slot)
            }
            None => {
                self.stats.record_miss();
                trace!("cache miss");
                Err(StoreError::KeyNotFound)
            }
        }
    }

    /// Slot of a live entry for `key`; purges the entry if it has expired.
    fn live_slot<Q>(&mut self, key: &Q, now: DateTime<Utc>) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        let expired = match self.order.get(slot) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.index.remove(key);
                return None;
            }
        };

        if expired {
            self.remove_slot(slot);
            self.stats.record_expirations(1);
            debug!("purged expired entry on access");
            return None;
        }
        Some(slot)
    }

    fn remove_slot(&mut self, slot: usize) -> Option<Entry<K, V>> {
        let entry = self.order.remove(slot)?;
        self.index.remove(&entry.key);
        self.deadlines.remove(&(entry.deadline, slot));
        Some(entry)
    }

    fn live_entries(&self, now: DateTime<Utc>) -> impl Iterator<Item = &Entry<K, V>> + '_ {
        self.order
            .iter()
            .map(|(_, entry)| entry)
            .filter(move |entry| !entry.is_expired(now))
    }

    /// Removes every expired entry, soonest deadline first. Stops at the
    /// first live deadline, so only expired entries are visited.
    fn purge_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        while self
            .deadlines
            .first()
            .is_some_and(|&(deadline, _)| deadline <= now)
        {
            let Some((_, slot)) = self.deadlines.pop_first() else {
                break;
            };
            if self.remove_slot(slot).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.stats.record_expirations(removed);
            debug!(removed, "purged expired entries");
        }
        removed
    }

    /// Frees one slot for a new key when the store is full.
    fn make_room(&mut self) {
        if let Some(capacity) = self.capacity {
            if self.order.len() >= capacity {
                self.evict_down_to(capacity - 1);
            }
        }
    }

    fn evict_down_to(&mut self, limit: usize) {
        while self.order.len() > limit {
            let Some((slot, entry)) = self.order.evict_oldest() else {
                break;
            };
            self.index.remove(&entry.key);
            self.deadlines.remove(&(entry.deadline, slot));
            self.stats.record_eviction();
            debug!("evicted least recently used entry");

            if let Some(listener) = self.on_evict.as_mut() {
                listener(&entry.key, &entry.value);
            }
        }
    }

    fn pop_end(&mut self, end: End) -> Result<(K, V)> {
        let now = self.clock.now();
        loop {
            let slot = match end {
                End::Oldest => self.order.peek_oldest(),
                End::Newest => self.order.peek_newest(),
            }
            .ok_or(StoreError::KeyNotFound)?;

            let entry = self.remove_slot(slot).ok_or(StoreError::KeyNotFound)?;
            if entry.is_expired(now) {
                self.stats.record_expirations(1);
                continue;
            }
            return Ok((entry.key, entry.value));
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum End {
    Oldest,
    Newest,
}

impl<K, V, C> Extend<(K, V)> for ExpiringLruStore<K, V, C>
where
    K: Hash + Eq + Clone,
    C: Clock,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<K, V, C> fmt::Debug for ExpiringLruStore<K, V, C>
where
    K: fmt::Debug,
    V: fmt::Debug,
    C: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringLruStore")
            .field("entries", &self.order)
            .field("capacity", &self.capacity)
            .field("default_ttl", &self.default_ttl)
            .field("clock", &self.clock)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn validate_capacity(capacity: Option<usize>) -> Result<()> {
    if capacity == Some(0) {
        return Err(StoreError::InvalidConfiguration(
            "capacity must be positive".to_string(),
        ));
    }
    Ok(())
}

fn validate_default_ttl(default_ttl: TimeDelta) -> Result<()> {
    if default_ttl < TimeDelta::zero() {
        return Err(StoreError::InvalidConfiguration(
            "default TTL must not be negative".to_string(),
        ));
    }
    Ok(())
}

fn ttl_from_secs(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}

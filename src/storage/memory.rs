//! Thread-Safe Memory Cache with Expiry Support
//!
//! [`MemoryCache`] keeps every item in a `HashMap` guarded by a single
//! reader/writer lock.
//!
//! ## Locking
//!
//! ```text
//!   has / get / get_multi          set / del / clear / *_multi
//!          │                                  │
//!          ▼                                  ▼
//!   ┌──────────────┐   expired key    ┌──────────────────┐
//!   │  read lock   │ ───────────────> │    write lock    │
//!   │  (peek)      │   drop & retake  │ (re-check, evict)│
//!   └──────────────┘                  └──────────────────┘
//!          │                                  │
//!          └──────────────┬───────────────────┘
//!                         ▼
//!                 ┌───────────────┐
//!                 │  MemoryState  │  lock-free primitives
//!                 └───────────────┘
//! ```
//!
//! All real work happens in [`MemoryState`] methods, which assume the caller
//! already holds the lock. Composite operations (batches, the file cache)
//! lock once and call those primitives, so nothing ever re-enters the lock.
//!
//! ## Expiry
//!
//! Expiry is lazy: a read that finds an expired item removes it and reports
//! a miss. [`MemoryCache::purge_expired`] reclaims everything at once and is
//! what the [`ExpirySweeper`](crate::storage::ExpirySweeper) calls.
//!
//! ## Bounded Size
//!
//! [`MemoryCache::with_capacity`] caps the number of entries. Entries live in
//! an [`LruCache`], so inserting a new key into a full cache pops the least
//! recently used entry in constant time. A popped entry that had already
//! expired is counted as expired, not evicted. Bounded caches take the write
//! lock on reads as well, since a hit has to refresh the entry's recency.

use crate::driver::{Cache, DriverContext, DriverOptions};
use crate::error::{CacheError, Result};
use crate::storage::item::{now_millis, Item};
use crate::Value;
use lru::LruCache;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const DRIVER_NAME: &str = "memory";

/// Outcome of looking a key up.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Lookup {
    Hit(Value),
    Expired,
    Miss,
}

/// What an insert had to throw away to make room.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Evicted {
    pub expired: u64,
    pub lru: u64,
}

/// The map behind a [`MemoryCache`]. Callers must hold the cache lock.
pub(crate) struct MemoryState {
    entries: LruCache<String, Item>,
}

impl MemoryState {
    fn new(max_entries: Option<NonZeroUsize>) -> Self {
        let entries = match max_entries {
            Some(max) => LruCache::new(max),
            None => LruCache::unbounded(),
        };
        Self { entries }
    }

    /// Looks `key` up without refreshing recency or removing anything.
    pub(crate) fn peek(&self, key: &str, now: u64) -> Lookup {
        match self.entries.peek(key) {
            Some(item) if item.is_expired_at(now) => Lookup::Expired,
            Some(item) => Lookup::Hit(item.value.clone()),
            None => Lookup::Miss,
        }
    }

    /// Looks `key` up, marking a hit as recently used and removing the entry
    /// if it expired.
    pub(crate) fn lookup(&mut self, key: &str, now: u64) -> Lookup {
        let found = match self.entries.get(key) {
            Some(item) if item.is_expired_at(now) => Lookup::Expired,
            Some(item) => Lookup::Hit(item.value.clone()),
            None => Lookup::Miss,
        };
        if found == Lookup::Expired {
            self.entries.pop(key);
        }
        found
    }

    pub(crate) fn item(&self, key: &str) -> Option<&Item> {
        self.entries.peek(key)
    }

    /// Stores `item` under `key`, popping the least recently used entry
    /// first if the cache is full.
    pub(crate) fn insert(&mut self, key: String, item: Item, now: u64) -> Evicted {
        let mut evicted = Evicted::default();

        if !self.entries.contains(&key) && self.entries.len() >= self.entries.cap().get() {
            if let Some((_, victim)) = self.entries.pop_lru() {
                if victim.is_expired_at(now) {
                    evicted.expired += 1;
                } else {
                    evicted.lru += 1;
                }
            }
        }

        self.entries.put(key, item);
        evicted
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Item> {
        self.entries.pop(key)
    }

    pub(crate) fn purge_expired(&mut self, now: u64) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, item)| item.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            self.entries.pop(key);
        }
        expired.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    expired: AtomicU64,
    evicted: AtomicU64,
}

impl Counters {
    #[inline]
    fn bump(counter: &AtomicU64, by: u64) {
        if by > 0 {
            counter.fetch_add(by, Ordering::Relaxed);
        }
    }

    fn record_lookup(&self, found: &Lookup) {
        match found {
            Lookup::Hit(_) => Self::bump(&self.hits, 1),
            Lookup::Expired => {
                Self::bump(&self.expired, 1);
                Self::bump(&self.misses, 1);
            }
            Lookup::Miss => Self::bump(&self.misses, 1),
        }
    }

    fn record_insert(&self, evicted: Evicted) {
        Self::bump(&self.sets, 1);
        Self::bump(&self.expired, evicted.expired);
        Self::bump(&self.evicted, evicted.lru);
    }
}

/// Memory cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently tracked, expired ones included
    pub entries: usize,
    /// Reads that found a live value
    pub hits: u64,
    /// Reads that found nothing, or an expired value
    pub misses: u64,
    /// Values written
    pub sets: u64,
    /// Keys removed through `del`/`del_multi`
    pub deletes: u64,
    /// Expired entries removed (lazily or by purge)
    pub expired: u64,
    /// Live entries evicted to respect the capacity
    pub evicted: u64,
}

/// In-process cache with per-key TTL.
///
/// # Example
///
/// ```
/// use unicache::{Cache, MemoryCache};
/// use serde_json::json;
/// use std::time::Duration;
///
/// let cache = MemoryCache::new();
/// cache.set("name", json!("inhere"), Duration::from_secs(60)).unwrap();
///
/// assert!(cache.has("name"));
/// assert_eq!(cache.get("name"), Some(json!("inhere")));
///
/// cache.del("name").unwrap();
/// assert_eq!(cache.get("name"), None);
/// ```
pub struct MemoryCache {
    state: RwLock<MemoryState>,
    capacity: Option<NonZeroUsize>,
    ctx: DriverContext,
    counters: Counters,
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.count())
            .field("capacity", &self.capacity())
            .field("options", self.ctx.options())
            .finish()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    /// Creates an unbounded memory cache.
    pub fn new() -> Self {
        Self::build(None, DriverOptions::default())
    }

    /// Creates a memory cache holding at most `max_entries` keys (minimum 1).
    pub fn with_capacity(max_entries: usize) -> Self {
        Self::build(NonZeroUsize::new(max_entries.max(1)), DriverOptions::default())
    }

    /// Replaces the driver options (key prefix, debug logging).
    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.ctx = DriverContext::new(DRIVER_NAME, options);
        self
    }

    fn build(capacity: Option<NonZeroUsize>, options: DriverOptions) -> Self {
        Self {
            state: RwLock::new(MemoryState::new(capacity)),
            capacity,
            ctx: DriverContext::new(DRIVER_NAME, options),
            counters: Counters::default(),
        }
    }

    pub(crate) fn state(&self) -> &RwLock<MemoryState> {
        &self.state
    }

    /// Whether a read hit must refresh recency, which needs the write lock.
    pub(crate) fn tracks_recency(&self) -> bool {
        self.capacity.is_some()
    }

    /// The configured entry limit, if any.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity.map(NonZeroUsize::get)
    }

    /// Number of entries tracked, including expired ones not yet removed.
    pub fn count(&self) -> usize {
        self.state.read().len()
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let purged = self.state.write().purge_expired(now_millis());
        Counters::bump(&self.counters.expired, purged as u64);
        purged
    }

    /// Remaining time to live of `key`.
    ///
    /// - `Some(Some(d))` if the key exists and expires in `d`
    /// - `Some(None)` if the key exists but never expires
    /// - `None` if the key doesn't exist or has expired
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let key = self.ctx.key(key);
        let now = now_millis();
        let state = self.state.read();
        let item = state.item(&key).filter(|item| !item.is_expired_at(now))?;
        Some(item.remaining_at(now))
    }

    /// Returns a snapshot of the cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.count(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            sets: self.counters.sets.load(Ordering::Relaxed),
            deletes: self.counters.deletes.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }

    /// The most recent error recorded by this driver.
    pub fn last_err(&self) -> Option<CacheError> {
        self.ctx.last_err()
    }

    /// Reads an already-prefixed key.
    fn read(&self, key: &str) -> Option<Value> {
        let now = now_millis();

        // Fast path: shared lock for hits and plain misses
        if !self.tracks_recency() {
            let state = self.state.read();
            match state.peek(key, now) {
                Lookup::Expired => {}
                found => {
                    self.counters.record_lookup(&found);
                    return into_value(found);
                }
            }
        }

        // Re-check under the write lock, evicting the key if it expired
        let found = self.state.write().lookup(key, now);
        self.counters.record_lookup(&found);
        into_value(found)
    }
}

#[inline]
fn into_value(found: Lookup) -> Option<Value> {
    match found {
        Lookup::Hit(value) => Some(value),
        Lookup::Expired | Lookup::Miss => None,
    }
}

impl Cache for MemoryCache {
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.ctx.trace_op("get", key);
        self.read(&self.ctx.key(key))
    }

    fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        self.ctx.trace_op("set", key);
        let now = now_millis();
        let item = Item::created_at(value, ttl, now);

        let evicted = self
            .state
            .write()
            .insert(self.ctx.key(key).into_owned(), item, now);
        self.counters.record_insert(evicted);
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        self.ctx.trace_op("del", key);
        if self.state.write().remove(&self.ctx.key(key)).is_some() {
            Counters::bump(&self.counters.deletes, 1);
        }
        Ok(())
    }

    fn get_multi(&self, keys: &[&str]) -> HashMap<String, Option<Value>> {
        let now = now_millis();
        let mut values = HashMap::with_capacity(keys.len());
        let mut pending = Vec::new();

        if self.tracks_recency() {
            pending.extend_from_slice(keys);
        } else {
            let state = self.state.read();
            for key in keys {
                match state.peek(&self.ctx.key(key), now) {
                    Lookup::Expired => pending.push(*key),
                    found => {
                        self.counters.record_lookup(&found);
                        values.insert((*key).to_string(), into_value(found));
                    }
                }
            }
        }

        if !pending.is_empty() {
            let mut state = self.state.write();
            for key in pending {
                let found = state.lookup(&self.ctx.key(key), now);
                self.counters.record_lookup(&found);
                values.insert(key.to_string(), into_value(found));
            }
        }

        values
    }

    fn set_multi(&self, values: HashMap<String, Value>, ttl: Duration) -> Result<()> {
        let now = now_millis();
        let mut state = self.state.write();

        for (key, value) in values {
            self.ctx.trace_op("set", &key);
            let item = Item::created_at(value, ttl, now);
            let evicted = state.insert(self.ctx.key(&key).into_owned(), item, now);
            self.counters.record_insert(evicted);
        }
        Ok(())
    }

    fn del_multi(&self, keys: &[&str]) -> Result<()> {
        let mut state = self.state.write();
        for key in keys {
            self.ctx.trace_op("del", key);
            if state.remove(&self.ctx.key(key)).is_some() {
                Counters::bump(&self.counters.deletes, 1);
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.ctx.trace_op("clear", "*");
        self.state.write().clear();
        Ok(())
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::CacheExt;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_get_del() {
        let cache = MemoryCache::new();
        let key = "key";

        assert!(!cache.has(key));

        cache.set(key, json!("value"), Duration::from_secs(3)).unwrap();
        assert!(cache.has(key));
        assert_eq!(cache.get(key), Some(json!("value")));

        cache.del(key).unwrap();
        assert!(!cache.has(key));
        assert_eq!(cache.get(key), None);
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct User {
        age: u32,
        name: String,
    }

    #[test]
    fn test_object_value() {
        let cache = MemoryCache::new();
        let user = User {
            age: 1,
            name: "inhere".to_string(),
        };

        cache.set_as("user", &user, Duration::from_secs(3)).unwrap();
        assert!(cache.has("user"));

        let loaded: User = cache.get_as("user").unwrap().unwrap();
        assert_eq!(loaded.name, "inhere");
        assert_eq!(loaded, user);
    }

    #[test]
    fn test_expiry() {
        let cache = MemoryCache::new();

        cache
            .set("key", json!("value"), Duration::from_millis(50))
            .unwrap();
        assert_eq!(cache.get("key"), Some(json!("value")));

        thread::sleep(Duration::from_millis(100));

        assert!(!cache.has("key"));
        assert_eq!(cache.get("key"), None);
        // The expired entry was removed by the read
        assert_eq!(cache.count(), 0);
    }

    #[test]
    fn test_expired_entry_is_counted_until_read() {
        let cache = MemoryCache::new();
        cache.set("a", json!(1), Duration::from_millis(10)).unwrap();
        thread::sleep(Duration::from_millis(30));

        assert_eq!(cache.count(), 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.count(), 0);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_forever() {
        let cache = MemoryCache::new();
        cache.set("k", json!("v"), Duration::ZERO).unwrap();

        assert_eq!(cache.ttl("k"), Some(None));
        // Still a hit at the far end of time
        let state = cache.state().read();
        assert_eq!(state.peek("k", u64::MAX), Lookup::Hit(json!("v")));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache = MemoryCache::new();
        assert!(cache.del("missing-key").is_ok());

        cache.set("k", json!(1), Duration::ZERO).unwrap();
        assert!(cache.del("k").is_ok());
        assert!(cache.del("k").is_ok());
        assert_eq!(cache.stats().deletes, 1);
    }

    #[test]
    fn test_overwrite_replaces_expiry() {
        let cache = MemoryCache::new();

        cache.set("k", json!("a"), Duration::from_millis(20)).unwrap();
        cache.set("k", json!("b"), Duration::ZERO).unwrap();

        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), Some(json!("b")));
        assert_eq!(cache.ttl("k"), Some(None));

        cache.set("k", json!("c"), Duration::from_secs(100)).unwrap();
        let ttl = cache.ttl("k").flatten().unwrap();
        assert!(ttl > Duration::ZERO && ttl <= Duration::from_secs(100));
        assert_eq!(cache.ttl("missing"), None);
    }

    #[test]
    fn test_multi() {
        let cache = MemoryCache::new();
        let values = HashMap::from([("a".to_string(), json!(1)), ("b".to_string(), json!(2))]);

        cache.set_multi(values, Duration::from_secs(60)).unwrap();

        let got = cache.get_multi(&["a", "b", "c"]);
        assert_eq!(got.len(), 3);
        assert_eq!(got["a"], Some(json!(1)));
        assert_eq!(got["b"], Some(json!(2)));
        assert_eq!(got["c"], None);

        cache.del_multi(&["a", "c"]).unwrap();
        assert!(!cache.has("a"));
        assert!(cache.has("b"));
    }

    #[test]
    fn test_get_multi_evicts_expired() {
        let cache = MemoryCache::new();
        cache.set("short", json!(1), Duration::from_millis(10)).unwrap();
        cache.set("long", json!(2), Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(30));

        let got = cache.get_multi(&["short", "long"]);
        assert_eq!(got["short"], None);
        assert_eq!(got["long"], Some(json!(2)));
        assert_eq!(cache.count(), 1);
    }

    #[test]
    fn test_prefix() {
        let cache = MemoryCache::new().with_options(DriverOptions::new().with_prefix("app:"));
        cache.set("name", json!("x"), Duration::ZERO).unwrap();

        assert!(cache.state().read().item("app:name").is_some());
        assert_eq!(cache.get("name"), Some(json!("x")));
        assert_eq!(cache.get_multi(&["name"])["name"], Some(json!("x")));
    }

    #[test]
    fn test_clear() {
        let cache = MemoryCache::new();
        cache.set("k1", json!(1), Duration::ZERO).unwrap();
        cache.set("k2", json!(2), Duration::ZERO).unwrap();
        assert_eq!(cache.count(), 2);

        cache.clear().unwrap();
        assert_eq!(cache.count(), 0);

        // Still usable after clear
        cache.set("k3", json!(3), Duration::ZERO).unwrap();
        assert_eq!(cache.get("k3"), Some(json!(3)));
        assert!(cache.close().is_ok());
    }

    #[test]
    fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache.set("k1", json!(1), Duration::from_millis(10)).unwrap();
        cache.set("k2", json!(2), Duration::from_millis(10)).unwrap();
        cache.set("k3", json!(3), Duration::ZERO).unwrap();

        thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.purge_expired(), 2);
        assert_eq!(cache.count(), 1);
        assert!(cache.has("k3"));
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = MemoryCache::with_capacity(2);
        cache.set("a", json!(1), Duration::ZERO).unwrap();
        cache.set("b", json!(2), Duration::ZERO).unwrap();

        // Touch "a" so "b" becomes the oldest
        assert!(cache.has("a"));

        cache.set("c", json!(3), Duration::ZERO).unwrap();
        assert_eq!(cache.count(), 2);
        assert!(cache.has("a"));
        assert!(!cache.has("b"));
        assert!(cache.has("c"));
        assert_eq!(cache.stats().evicted, 1);
    }

    #[test]
    fn test_capacity_counts_expired_victim_as_expired() {
        let cache = MemoryCache::with_capacity(2);
        cache.set("old", json!(1), Duration::from_millis(10)).unwrap();
        cache.set("keep", json!(2), Duration::ZERO).unwrap();
        thread::sleep(Duration::from_millis(30));

        cache.set("new", json!(3), Duration::ZERO).unwrap();
        assert!(cache.has("keep"));
        assert!(cache.has("new"));
        assert_eq!(cache.stats().evicted, 0);
        assert_eq!(cache.stats().expired, 1);
    }

    #[test]
    fn test_capacity_get_multi_refreshes_recency() {
        let cache = MemoryCache::with_capacity(3);
        cache.set("a", json!(1), Duration::ZERO).unwrap();
        cache.set("b", json!(2), Duration::ZERO).unwrap();
        cache.set("c", json!(3), Duration::ZERO).unwrap();

        cache.get_multi(&["a", "b"]);
        cache.set("d", json!(4), Duration::ZERO).unwrap();

        let got = cache.get_multi(&["a", "b", "c", "d"]);
        assert_eq!(got["a"], Some(json!(1)));
        assert_eq!(got["b"], Some(json!(2)));
        assert_eq!(got["c"], None);
        assert_eq!(got["d"], Some(json!(4)));
    }

    #[test]
    fn test_large_full_cache_evicts_in_insertion_order() {
        let cache = MemoryCache::with_capacity(50_000);
        assert_eq!(cache.capacity(), Some(50_000));

        for i in 0..100_000 {
            cache.set(&format!("key:{}", i), json!(i), Duration::ZERO).unwrap();
        }

        assert_eq!(cache.count(), 50_000);
        assert_eq!(cache.stats().evicted, 50_000);
        assert_eq!(cache.get("key:49999"), None);
        assert_eq!(cache.get("key:50000"), Some(json!(50_000)));
    }

    #[test]
    fn test_overwrite_in_full_cache_does_not_evict() {
        let cache = MemoryCache::with_capacity(2);
        cache.set("a", json!(1), Duration::ZERO).unwrap();
        cache.set("b", json!(2), Duration::ZERO).unwrap();
        cache.set("a", json!(10), Duration::ZERO).unwrap();

        assert_eq!(cache.get("a"), Some(json!(10)));
        assert!(cache.has("b"));
        assert_eq!(cache.stats().evicted, 0);
    }

    #[test]
    fn test_stats() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::ZERO).unwrap();
        cache.get("k");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(MemoryCache::new());
        let mut handles = vec![];

        for i in 0..10 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..200 {
                    // Overlapping keys across threads
                    let key = format!("key-{}", j % 20);
                    cache.set(&key, json!(i), Duration::ZERO).unwrap();
                    cache.get(&key);
                    if j % 7 == 0 {
                        cache.del(&key).unwrap();
                    }
                    let own = format!("own-{}-{}", i, j);
                    cache.set(&own, json!(j), Duration::from_secs(60)).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.count() >= 2000);
        for i in 0..10 {
            assert_eq!(cache.get(&format!("own-{}-199", i)), Some(json!(199)));
        }
    }
}

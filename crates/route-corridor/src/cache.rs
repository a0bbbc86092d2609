//! Concurrent content-addressed cache of parsed routes
//!
//! Routes are keyed by the SHA-256 digest of their canonical WKT text. Each key owns a slot that
//! is filled at most once: concurrent first lookups for the same key wait on the slot's init lock
//! while exactly one of them parses. Readers of filled slots never take a lock beyond the shard
//! read of the map.

use crate::{CorridorError, Result, Route, wkt};
use dashmap::DashMap;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use sha2::digest::Output;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::{Duration, Instant};

pub(crate) const KEY_PREFIX: &str = "hash-";
const DIGEST_LEN: usize = 32;

/// Content hash of a route's canonical text
///
/// Displays as `hash-<64 lowercase hex digits>` and parses back from that form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteKey(Output<Sha256>);

impl RouteKey {
    /// Hash the canonical form of a route text
    pub fn from_text(text: &str) -> Self {
        Self(Sha256::digest(wkt::canonical_form(text).as_bytes()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{KEY_PREFIX}{:x}", self.0)
    }
}

impl fmt::Debug for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RouteKey({self})")
    }
}

impl FromStr for RouteKey {
    type Err = CorridorError;

    fn from_str(text: &str) -> Result<Self> {
        let invalid = || CorridorError::InvalidRouteKey(text.to_string());

        let hex = text.trim().strip_prefix(KEY_PREFIX).ok_or_else(invalid)?;
        if hex.len() != DIGEST_LEN * 2 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let mut bytes = [0u8; DIGEST_LEN];
        for (index, byte) in bytes.iter_mut().enumerate() {
            let pair = hex.get(index * 2..index * 2 + 2).ok_or_else(invalid)?;
            *byte = u8::from_str_radix(pair, 16).map_err(|_| invalid())?;
        }
        Ok(Self(bytes.into()))
    }
}

/// Configuration for the route cache
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheConfig {
    /// Entry ceiling; beyond it the least recently accessed routes are evicted.
    /// Default: 100000
    pub max_entries: usize,
    /// Entries not accessed for this long are dropped on the next lookup or sweep.
    /// Default: 24h
    pub time_to_idle: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 100_000,
            time_to_idle: Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Counters describing cache activity since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CacheStats {
    /// Entries currently stored
    pub entries: usize,
    /// Lookups answered from a filled slot
    pub hits: u64,
    /// Lookups that had to wait for or run a parse
    pub misses: u64,
    /// Parse callbacks invoked
    pub parses: u64,
    /// Entries removed by expiry or capacity (purges not included)
    pub evictions: u64,
}

#[derive(Debug)]
struct CacheSlot {
    route: OnceLock<Arc<Route>>,
    /// Serializes the parse for this key
    init: Mutex<()>,
    /// Nanoseconds since the cache epoch
    last_access: AtomicU64,
}

impl CacheSlot {
    fn new(now: u64) -> Self {
        Self {
            route: OnceLock::new(),
            init: Mutex::new(()),
            last_access: AtomicU64::new(now),
        }
    }

    #[inline]
    fn touch(&self, now: u64) {
        self.last_access.fetch_max(now, Ordering::Relaxed);
    }
}

/// Process-wide cache of parsed routes
///
/// Construct one per engine and share it behind an `Arc`.
#[derive(Debug)]
pub struct RouteCache {
    config: CacheConfig,
    entries: DashMap<RouteKey, Arc<CacheSlot>>,
    epoch: Instant,
    /// Held by the single thread running a capacity eviction
    evicting: Mutex<()>,
    hits: AtomicU64,
    misses: AtomicU64,
    parses: AtomicU64,
    evictions: AtomicU64,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl RouteCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            epoch: Instant::now(),
            evicting: Mutex::new(()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            parses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the route cached under `key`, running `parse` if there is none
    ///
    /// However many threads ask for a missing key at once, `parse` runs once and all of them get
    /// the same `Arc`. A failed parse is not stored: the error goes to the caller that ran it and
    /// the next lookup parses again.
    pub fn resolve<F>(&self, key: RouteKey, parse: F) -> Result<Arc<Route>>
    where
        F: FnOnce() -> Result<Arc<Route>>,
    {
        let now = self.now();
        if let Some(route) = self.lookup(&key, now) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(%key, "Route cache hit");
            return Ok(route);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        let route = loop {
            let slot = self.slot_for(key, now);
            let _init = slot.init.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(route) = slot.route.get() {
                slot.touch(now);
                break Arc::clone(route);
            }
            // Detached by a failed parse or a purge while this thread waited
            if !self.is_current(&key, &slot) {
                continue;
            }

            tracing::debug!(%key, "Route cache miss, parsing");
            self.parses.fetch_add(1, Ordering::Relaxed);
            match parse() {
                Ok(route) => {
                    slot.touch(now);
                    break Arc::clone(slot.route.get_or_init(|| route));
                }
                Err(err) => {
                    self.entries
                        .remove_if(&key, |_, existing| Arc::ptr_eq(existing, &slot));
                    return Err(err);
                }
            }
        };

        self.enforce_capacity();
        Ok(route)
    }

    /// Hash `text` and resolve it, parsing it on a miss
    pub fn resolve_text(&self, text: &str) -> Result<Arc<Route>> {
        let key = RouteKey::from_text(text);
        self.resolve(key, || wkt::parse_linestring(text))
    }

    /// Resolve by a precomputed key text, skipping the hash of the route text
    ///
    /// On a miss the route is parsed from `fallback_text`; without one the miss is an error.
    pub fn resolve_by_hash(
        &self,
        hash_text: &str,
        fallback_text: Option<&str>,
    ) -> Result<Arc<Route>> {
        let key: RouteKey = hash_text.parse()?;
        match fallback_text {
            Some(text) => self.resolve(key, || wkt::parse_linestring(text)),
            None => self.get(&key).ok_or(CorridorError::UnknownRouteKey(key)),
        }
    }

    /// Look up a route without loading it
    pub fn get(&self, key: &RouteKey) -> Option<Arc<Route>> {
        let route = self.lookup(key, self.now());
        let counter = if route.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        route
    }

    /// Parse and cache `text` eagerly, returning its key
    ///
    /// Lets an indexer store the key next to the route text so later lookups take the hash path.
    pub fn insert_text(&self, text: &str) -> Result<RouteKey> {
        let key = RouteKey::from_text(text);
        self.resolve(key, || wkt::parse_linestring(text))?;
        Ok(key)
    }

    /// Drop every entry idle for longer than the configured time, returning how many went
    pub fn evict_expired(&self) -> usize {
        let removed = self.evict_expired_at(self.now());
        if removed > 0 {
            tracing::debug!(removed, "Evicted idle routes");
        }
        removed
    }

    /// Drop all entries
    ///
    /// Resolutions in flight finish normally; the next resolution of any key parses again.
    pub fn purge(&self) {
        let removed = self.entries.len();
        self.entries.clear();
        tracing::info!(removed, "Purged route cache");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            parses: self.parses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }

    /// A filled, unexpired route for `key`; an expired one is removed on the way
    fn lookup(&self, key: &RouteKey, now: u64) -> Option<Arc<Route>> {
        // Clone the slot out so no shard guard is held past this line
        let slot = self.entries.get(key).map(|entry| Arc::clone(entry.value()))?;
        let route = slot.route.get()?;

        if self.is_expired(&slot, now) {
            if self
                .entries
                .remove_if(key, |_, existing| Arc::ptr_eq(existing, &slot))
                .is_some()
            {
                self.evictions.fetch_add(1, Ordering::Relaxed);
            }
            return None;
        }

        slot.touch(now);
        Some(Arc::clone(route))
    }

    /// Whether `slot` is still the one stored under `key`
    fn is_current(&self, key: &RouteKey, slot: &Arc<CacheSlot>) -> bool {
        self.entries
            .get(key)
            .is_some_and(|entry| Arc::ptr_eq(entry.value(), slot))
    }

    fn slot_for(&self, key: RouteKey, now: u64) -> Arc<CacheSlot> {
        let entry = self
            .entries
            .entry(key)
            .or_insert_with(|| Arc::new(CacheSlot::new(now)));
        Arc::clone(entry.value())
    }

    fn evict_expired_at(&self, now: u64) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, slot| {
            let keep = slot.route.get().is_none() || !self.is_expired(slot, now);
            if !keep {
                removed += 1;
            }
            keep
        });
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    /// Evict down to the low-water mark once the ceiling is exceeded
    fn enforce_capacity(&self) {
        let max_entries = self.config.max_entries;
        if self.entries.len() <= max_entries {
            return;
        }
        // Another thread is already evicting
        let Ok(_evicting) = self.evicting.try_lock() else {
            return;
        };

        let expired = self.evict_expired_at(self.now());
        let len = self.entries.len();
        if len <= max_entries {
            return;
        }

        let low_water = max_entries - max_entries / 64;
        let excess = len - low_water;
        let mut candidates: Vec<(u64, RouteKey)> = self
            .entries
            .iter()
            .filter(|entry| entry.value().route.get().is_some())
            .map(|entry| (entry.value().last_access.load(Ordering::Relaxed), *entry.key()))
            .collect();
        if excess < candidates.len() {
            candidates.select_nth_unstable_by_key(excess, |(last_access, _)| *last_access);
            candidates.truncate(excess);
        }

        let mut evicted = 0u64;
        for (_, key) in &candidates {
            if self.entries.remove(key).is_some() {
                evicted += 1;
            }
        }
        self.evictions.fetch_add(evicted, Ordering::Relaxed);

        tracing::info!(
            expired,
            evicted,
            remaining = self.entries.len(),
            max_entries,
            "Route cache over capacity, evicted least recently used routes"
        );
    }

    #[inline]
    fn is_expired(&self, slot: &CacheSlot, now: u64) -> bool {
        let time_to_idle = u64::try_from(self.config.time_to_idle.as_nanos()).unwrap_or(u64::MAX);
        now.saturating_sub(slot.last_access.load(Ordering::Relaxed)) >= time_to_idle
    }

    #[inline]
    fn now(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }
}

impl Default for RouteCache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    const ROUTE_TEXT: &str = "LINESTRING(16.2075 48.3849, 16.2071 48.3847)";

    fn numbered_route(index: usize) -> String {
        format!("LINESTRING({index} 0, {index} 1)")
    }

    #[test]
    fn test_concurrent_first_access_parses_once() {
        const THREADS: usize = 8;
        let cache = RouteCache::default();
        let parses = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);
        let key = RouteKey::from_text(ROUTE_TEXT);

        let routes: Vec<Arc<Route>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        cache
                            .resolve(key, || {
                                parses.fetch_add(1, Ordering::SeqCst);
                                thread::sleep(Duration::from_millis(20));
                                wkt::parse_linestring(ROUTE_TEXT)
                            })
                            .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(parses.load(Ordering::SeqCst), 1);
        assert_eq!(routes.len(), THREADS);
        assert!(routes.iter().all(|route| Arc::ptr_eq(route, &routes[0])));
        assert_eq!(cache.stats().parses, 1);
    }

    #[test]
    fn test_failed_parse_is_not_memoized() {
        let cache = RouteCache::default();
        let key = RouteKey::from_text("LINESTRING(0 0, 1 0");

        let result = cache.resolve(key, || wkt::parse_linestring("LINESTRING(0 0, 1 0"));
        assert!(matches!(result, Err(CorridorError::InvalidLineString(_))));
        assert!(cache.is_empty());

        let route = cache
            .resolve(key, || wkt::parse_linestring("LINESTRING(0 0, 1 0)"))
            .unwrap();
        assert_eq!(route.len(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().parses, 2);
    }

    #[test]
    fn test_waiters_retry_after_failed_parse() {
        const THREADS: usize = 4;
        let cache = RouteCache::default();
        let attempts = AtomicUsize::new(0);
        let barrier = Barrier::new(THREADS);
        let key = RouteKey::from_text(ROUTE_TEXT);

        let results: Vec<Result<Arc<Route>>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        cache.resolve(key, || {
                            if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                                thread::sleep(Duration::from_millis(20));
                                return Err(CorridorError::InvalidLineString(
                                    "LINESTRING(".to_string(),
                                ));
                            }
                            wkt::parse_linestring(ROUTE_TEXT)
                        })
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let routes: Vec<&Arc<Route>> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(routes.len(), THREADS - 1);
        assert!(routes.iter().all(|route| Arc::ptr_eq(*route, routes[0])));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().parses, 2);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_purge_during_parse() {
        let cache = RouteCache::default();
        let key = RouteKey::from_text(ROUTE_TEXT);
        let parsing = Barrier::new(2);
        let purged = Barrier::new(2);

        let first = thread::scope(|scope| {
            let handle = scope.spawn(|| {
                cache.resolve(key, || {
                    parsing.wait();
                    purged.wait();
                    wkt::parse_linestring(ROUTE_TEXT)
                })
            });
            parsing.wait();
            cache.purge();
            purged.wait();
            handle.join().unwrap()
        })
        .unwrap();

        // The in-flight caller still gets its route, but the purged map does not keep it
        assert_eq!(first.len(), 2);
        assert!(cache.get(&key).is_none());

        let second = cache.resolve_text(ROUTE_TEXT).unwrap();
        assert_eq!(cache.stats().parses, 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_hits_share_the_parsed_route() {
        let cache = RouteCache::default();
        let first = cache.resolve_text(ROUTE_TEXT).unwrap();
        let second = cache.resolve_text(ROUTE_TEXT).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        let stats = cache.stats();
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.parses, 1);
    }

    #[test]
    fn test_purge_forces_reparse() {
        let cache = RouteCache::default();
        let before = cache.resolve_text(ROUTE_TEXT).unwrap();
        assert_eq!(cache.len(), 1);

        cache.purge();
        assert!(cache.is_empty());

        let after = cache.resolve_text(ROUTE_TEXT).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
        assert_eq!(cache.stats().parses, 2);
    }

    #[test]
    fn test_zero_time_to_idle_always_reparses() {
        let cache = RouteCache::new(CacheConfig {
            time_to_idle: Duration::ZERO,
            ..CacheConfig::default()
        });
        cache.resolve_text(ROUTE_TEXT).unwrap();
        cache.resolve_text(ROUTE_TEXT).unwrap();
        assert_eq!(cache.stats().parses, 2);
        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let cache = RouteCache::new(CacheConfig {
            max_entries: 64,
            ..CacheConfig::default()
        });
        let keys: Vec<RouteKey> = (0..65)
            .map(|index| cache.insert_text(&numbered_route(index)).unwrap())
            .collect();

        // 65 > 64 triggers eviction down to 64 - 64 / 64 = 63
        assert_eq!(cache.len(), 63);
        assert_eq!(cache.stats().evictions, 2);
        assert!(cache.get(&keys[0]).is_none());
        assert!(cache.get(&keys[1]).is_none());
        assert!(cache.get(&keys[64]).is_some());
    }

    #[test]
    fn test_canonically_equal_texts_share_a_key() {
        let cache = RouteCache::default();
        let first = cache.resolve_text("LINESTRING(0 0, 1 0)").unwrap();
        let second = cache.resolve_text("  linestring ( 0 0 ,1  0 ) ").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(
            RouteKey::from_text("LINESTRING(0 0, 1 0)"),
            RouteKey::from_text("linestring(0 0,1 0)")
        );
        assert_ne!(
            RouteKey::from_text("LINESTRING(0 0, 1 0)"),
            RouteKey::from_text("LINESTRING(1 0, 0 0)")
        );
    }

    #[test]
    fn test_route_key_text_form() {
        let key = RouteKey::from_text(ROUTE_TEXT);
        let text = key.to_string();
        assert!(text.starts_with("hash-"));
        assert_eq!(text.len(), KEY_PREFIX.len() + 64);
        assert_eq!(text.parse::<RouteKey>().unwrap(), key);
        assert_eq!(key.as_bytes().len(), DIGEST_LEN);

        // SHA-256 of the empty string
        assert_eq!(
            RouteKey::from_text("").to_string(),
            "hash-e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );

        assert!("hash-abc".parse::<RouteKey>().is_err());
        assert!(text[KEY_PREFIX.len()..].parse::<RouteKey>().is_err());
        let not_hex = format!("hash-{}", "g".repeat(64));
        assert!(matches!(
            not_hex.parse::<RouteKey>(),
            Err(CorridorError::InvalidRouteKey(_))
        ));
    }

    #[test]
    fn test_resolve_by_hash() {
        let cache = RouteCache::default();
        let key = cache.insert_text(ROUTE_TEXT).unwrap();
        let hash_text = key.to_string();

        let cached = cache.resolve_by_hash(&hash_text, None).unwrap();
        let via_text = cache.resolve_text(ROUTE_TEXT).unwrap();
        assert!(Arc::ptr_eq(&cached, &via_text));

        let other = RouteKey::from_text("LINESTRING(1 1, 2 2)").to_string();
        assert!(matches!(
            cache.resolve_by_hash(&other, None),
            Err(CorridorError::UnknownRouteKey(_))
        ));
        let parsed = cache
            .resolve_by_hash(&other, Some("LINESTRING(1 1, 2 2)"))
            .unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(cache.stats().parses, 2);

        assert!(matches!(
            cache.resolve_by_hash("not-a-hash", Some(ROUTE_TEXT)),
            Err(CorridorError::InvalidRouteKey(_))
        ));
    }

    #[test]
    fn test_get_does_not_load() {
        let cache = RouteCache::default();
        let key = RouteKey::from_text(ROUTE_TEXT);
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());
        assert_eq!(cache.stats().parses, 0);
    }
}

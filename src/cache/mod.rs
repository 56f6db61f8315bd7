pub mod policy;

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::{self, Instant};

/// A stored value with its insertion time and fixed time-to-live.
struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
    ttl: Duration,
    /// Insertion sequence, used to find the FIFO eviction victim.
    seq: u64,
}

impl<T> CacheEntry<T> {
    /// Single liveness predicate shared by lazy expiry and the sweep.
    fn is_live(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) <= self.ttl
    }
}

/// A live cache hit together with how long ago it was stored.
#[derive(Debug, Clone)]
pub struct CachedValue<T> {
    pub value: T,
    pub age: Duration,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    /// `size / max_size` as a percentage with two decimals, e.g. `"12.50%"`.
    pub utilization: String,
}

struct Inner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
}

impl<T> Inner<T> {
    fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Bounded in-memory cache with per-entry TTL.
///
/// Expired entries are dropped lazily on read and periodically by
/// [`sweep_loop`]. When a new key is inserted into a full cache the oldest
/// inserted entry is evicted (FIFO, not LRU). None of the operations can
/// fail: absence, expiry and eviction are all silent.
pub struct TtlCache<T> {
    inner: Mutex<Inner<T>>,
    max_size: usize,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(max_size),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            max_size,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or overwrite `key` with a TTL in whole seconds.
    pub fn set(&self, key: impl Into<String>, value: T, ttl_secs: u64) {
        self.insert(key.into(), value, Duration::from_secs(ttl_secs));
    }

    /// Insert or overwrite `key`. An overwrite restarts the entry's clock but
    /// keeps its original place in the eviction order.
    pub fn insert(&self, key: String, value: T, ttl: Duration) {
        let mut inner = self.lock();
        let now = Instant::now();

        if let Some(entry) = inner.entries.get_mut(&key) {
            entry.value = value;
            entry.stored_at = now;
            entry.ttl = ttl;
            return;
        }

        if inner.entries.len() >= self.max_size {
            if let Some(evicted) = inner.evict_oldest() {
                tracing::debug!(key = %evicted, "cache full, evicted oldest entry");
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at: now,
                ttl,
                seq,
            },
        );
    }

    /// Get a live entry and its age. A stale entry is removed and reported absent.
    pub fn get_entry(&self, key: &str) -> Option<CachedValue<T>> {
        let mut inner = self.lock();
        let now = Instant::now();

        let entry = inner.entries.get(key)?;
        if !entry.is_live(now) {
            inner.remove(key);
            return None;
        }

        Some(CachedValue {
            value: entry.value.clone(),
            age: now.saturating_duration_since(entry.stored_at),
        })
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.get_entry(key).map(|hit| hit.value)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get_entry(key).is_some()
    }

    /// Remove `key`. Returns whether an entry (live or stale) was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of stored entries, without forcing an expiry pass.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn stats(&self) -> CacheStats {
        let size = self.len();
        CacheStats {
            size,
            max_size: self.max_size,
            utilization: format!("{:.2}%", size as f64 / self.max_size as f64 * 100.0),
        }
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();

        let expired: Vec<String> = inner
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            inner.remove(key);
        }

        expired.len()
    }
}

/// Background task that periodically sweeps expired entries out of the cache.
pub async fn sweep_loop<T>(cache: Arc<TtlCache<T>>, period: Duration)
where
    T: Clone + Send + 'static,
{
    let mut interval = time::interval(period);
    // First tick completes immediately; nothing can have expired yet.
    interval.tick().await;

    loop {
        interval.tick().await;

        let removed = cache.sweep();
        if removed > 0 {
            tracing::info!(
                removed,
                remaining = cache.len(),
                "swept expired cache entries"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_missing_key_returns_none() {
        let cache: TtlCache<u32> = TtlCache::new(10);
        assert_eq!(cache.get("nope"), None);
        assert!(!cache.has("nope"));
    }

    #[test]
    fn test_set_then_get_returns_value() {
        let cache = TtlCache::new(10);
        cache.set("a", 1, 60);
        assert_eq!(cache.get("a"), Some(1));
        assert!(cache.has("a"));
    }

    #[test]
    fn test_overwrite_replaces_value_without_growing() {
        let cache = TtlCache::new(10);
        cache.set("a", 1, 60);
        cache.set("a", 2, 60);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_live_until_ttl_elapses() {
        let cache = TtlCache::new(10);
        cache.set("a", "v", 30);

        time::advance(Duration::from_secs(30)).await;
        assert_eq!(cache.get("a"), Some("v"), "entry is live at exactly ttl");

        time::advance(Duration::from_millis(1)).await;
        assert!(!cache.has("a"), "entry is stale once elapsed exceeds ttl");
        assert_eq!(cache.get("a"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiry_removes_entry() {
        let cache = TtlCache::new(10);
        cache.set("a", 1, 1);
        assert_eq!(cache.len(), 1);

        time::advance(Duration::from_secs(2)).await;
        // len does not force expiry
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_entry_reports_age_since_store() {
        let cache = TtlCache::new(10);
        time::advance(Duration::from_secs(100)).await;
        cache.set("a", 1, 60);

        time::advance(Duration::from_secs(7)).await;
        let hit = cache.get_entry("a").unwrap();
        assert_eq!(hit.value, 1);
        assert_eq!(hit.age.as_secs(), 7);

        // Reads never refresh stored_at
        time::advance(Duration::from_secs(3)).await;
        assert_eq!(cache.get_entry("a").unwrap().age.as_secs(), 10);
    }

    #[test]
    fn test_size_never_exceeds_max() {
        let cache = TtlCache::new(3);
        for i in 0..20 {
            cache.set(format!("k{i}"), i, 60);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_full_cache_evicts_oldest_inserted() {
        let cache = TtlCache::new(3);
        cache.set("a", 1, 60);
        cache.set("b", 2, 60);
        cache.set("c", 3, 60);

        // Reading "a" does not protect it: eviction is FIFO, not LRU
        assert_eq!(cache.get("a"), Some(1));

        cache.set("d", 4, 60);
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get("d"), Some(4));
    }

    #[test]
    fn test_overwrite_in_full_cache_does_not_evict() {
        let cache = TtlCache::new(2);
        cache.set("a", 1, 60);
        cache.set("b", 2, 60);
        cache.set("a", 10, 60);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("a"), Some(10));
        assert_eq!(cache.get("b"), Some(2));

        // "a" keeps its first-insertion slot, so it is still evicted first
        cache.set("c", 3, 60);
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_restarts_ttl_in_place() {
        let cache = TtlCache::new(2);
        cache.set("a", 1, 10);
        cache.set("b", 2, 600);

        time::advance(Duration::from_secs(8)).await;
        cache.set("a", 10, 10);

        // Past the first ttl, still within the restarted one
        time::advance(Duration::from_secs(5)).await;
        let hit = cache.get_entry("a").unwrap();
        assert_eq!(hit.value, 10);
        assert_eq!(hit.age.as_secs(), 5);

        cache.set("c", 3, 600);
        assert!(!cache.has("a"));
        assert_eq!(cache.get("b"), Some(2));
    }

    #[test]
    fn test_eviction_order_skips_deleted_keys() {
        let cache = TtlCache::new(2);
        cache.set("a", 1, 60);
        cache.set("b", 2, 60);
        assert!(cache.delete("a"));

        cache.set("c", 3, 60);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), Some(2));
        assert_eq!(cache.get("c"), Some(3));
    }

    #[test]
    fn test_delete_reports_presence() {
        let cache = TtlCache::new(10);
        cache.set("a", 1, 60);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert!(!cache.has("a"));
    }

    #[test]
    fn test_clear_removes_everything() {
        let cache = TtlCache::new(10);
        cache.set("a", 1, 60);
        cache.set("b", 2, 60);
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.get("a"), None);

        // Eviction bookkeeping is reset too
        for i in 0..10 {
            cache.set(format!("k{i}"), i, 60);
        }
        assert_eq!(cache.len(), 10);
    }

    #[test]
    fn test_stats_formats_utilization() {
        let cache = TtlCache::new(8);
        assert_eq!(
            cache.stats(),
            CacheStats {
                size: 0,
                max_size: 8,
                utilization: "0.00%".to_string(),
            }
        );

        cache.set("a", 1, 60);
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.utilization, "12.50%");

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["maxSize"], 8);
    }

    #[test]
    fn test_stats_utilization_rounds_to_two_places() {
        let cache = TtlCache::new(3);
        cache.set("a", 1, 60);
        assert_eq!(cache.stats().utilization, "33.33%");
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_expired() {
        let cache = TtlCache::new(10);
        cache.set("short", 1, 30);
        cache.set("long", 2, 900);

        time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("long"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_without_expired_entries_is_noop() {
        let cache = TtlCache::new(10);
        cache.set("a", 1, 60);
        cache.set("b", 2, 60);

        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_twice_equals_sweep_once() {
        let cache = TtlCache::new(10);
        cache.set("a", 1, 10);
        cache.set("b", 2, 10);
        cache.set("c", 3, 600);

        time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.sweep(), 2);
        let after_first = cache.len();
        assert_eq!(cache.sweep(), 0);
        assert_eq!(cache.len(), after_first);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_frees_slots_for_new_keys() {
        let cache = TtlCache::new(2);
        cache.set("old", 1, 5);
        cache.set("keep", 2, 600);

        time::advance(Duration::from_secs(6)).await;
        cache.sweep();
        cache.set("new", 3, 600);

        assert_eq!(cache.get("keep"), Some(2));
        assert_eq!(cache.get("new"), Some(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_loop_runs_on_period() {
        let cache = Arc::new(TtlCache::new(10));
        cache.set("a", 1, 1);

        let handle = tokio::spawn(sweep_loop(cache.clone(), Duration::from_secs(300)));

        // Let the loop consume its immediate first tick
        tokio::task::yield_now().await;
        assert_eq!(cache.len(), 1);

        time::sleep(Duration::from_secs(301)).await;
        tokio::task::yield_now().await;
        assert_eq!(cache.len(), 0);

        handle.abort();
    }

    #[test]
    fn test_concurrent_writers_respect_bound() {
        let cache = Arc::new(TtlCache::new(50));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = cache.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.set(format!("t{t}-{i}"), i, 60);
                        let _ = cache.get(&format!("t{t}-{}", i / 2));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 50);
    }
}

use crate::deduplication::{DeduplicationConfig, RequestDeduplicator};
use crate::error::CacheError;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use futures::Future;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::{self, Display};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[cfg(feature = "graphql")]
use async_graphql::SimpleObject;

/// Configuration for the request cache
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// TTL used by [`RequestCache::get_default`] and by capacity eviction
    pub default_ttl: Duration,
    /// Maximum number of cached entries
    pub max_entries: usize,
    /// How often the background sweeper runs
    pub cleanup_interval: Duration,
    /// How long a deduplicated caller waits for the in-flight request
    pub pending_timeout: Duration,
    /// Whether caching is enabled
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::seconds(60),
            max_entries: 1000,
            cleanup_interval: Duration::minutes(5),
            pending_timeout: Duration::seconds(30),
            enabled: true,
        }
    }
}

impl CacheConfig {
    /// Create a new cache configuration
    pub fn new(default_ttl: Duration, max_entries: usize, cleanup_interval: Duration) -> Self {
        Self {
            default_ttl,
            max_entries,
            cleanup_interval,
            ..Self::default()
        }
    }
}

/// Cached value with its creation time
#[derive(Clone, Debug)]
pub struct CachedResult<V> {
    pub data: V,
    pub created_at: DateTime<Utc>,
}

impl<V> CachedResult<V> {
    pub fn new(data: V, created_at: DateTime<Utc>) -> Self {
        Self { data, created_at }
    }

    /// Whether the entry is younger than `ttl` at `now`
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at < ttl
    }
}

/// Key of a cached request
#[derive(Hash, Eq, PartialEq, Clone, Debug)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }

    /// Build a key from a namespace and a hash of the request parameters, so
    /// structurally equal queries share an entry.
    pub fn hashed<I, S>(namespace: &str, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_ref());
            hasher.update([0x1f]);
        }
        CacheKey(format!("{}:{}", namespace, hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        CacheKey(key)
    }
}

/// In-memory request cache: TTL expiry plus deduplication of concurrent
/// fetches for the same key. Failed fetches are never stored.
pub struct RequestCache<V> {
    entries: DashMap<CacheKey, CachedResult<V>>,
    deduplicator: RequestDeduplicator<V>,
    hits: AtomicUsize,
    misses: AtomicUsize,
    pub config: CacheConfig,
}

impl<V: Clone> RequestCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        let deduplicator = RequestDeduplicator::new(DeduplicationConfig {
            request_timeout: config.pending_timeout,
            enabled: config.enabled,
        });

        Self {
            entries: DashMap::new(),
            deduplicator,
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
            config,
        }
    }

    /// Return the cached value for `key` if it is younger than `ttl`,
    /// otherwise run `fetcher` (or join the fetch already running for `key`).
    pub async fn get<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        fetcher: F,
    ) -> Result<V, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        if !self.config.enabled {
            return fetcher().await.map_err(CacheError::fetch);
        }

        let started_at = Utc::now();
        if let Some(data) = self.lookup(key, ttl, started_at) {
            return Ok(data);
        }

        self.deduplicator
            .execute(key.as_str(), || self.fetch_as_leader(key, ttl, started_at, fetcher))
            .await
    }

    /// Runs once this caller owns the in-flight slot for `key`. A leader
    /// that finished between our miss and claiming the slot has already
    /// stored a fresh value, so use that instead of fetching again.
    async fn fetch_as_leader<F, Fut, E>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        started_at: DateTime<Utc>,
        fetcher: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let stored = self
            .entries
            .get(key)
            .filter(|cached| cached.is_fresh(ttl, Utc::now()))
            .map(|cached| cached.data.clone());
        if let Some(data) = stored {
            log::debug!("Cache filled while waiting for key: {}", key);
            return Ok(data);
        }

        let data = fetcher().await?;
        self.put(key.clone(), data.clone(), started_at);
        Ok(data)
    }

    /// [`RequestCache::get`] with the configured default TTL
    pub async fn get_default<F, Fut, E>(&self, key: &CacheKey, fetcher: F) -> Result<V, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        self.get(key, self.config.default_ttl, fetcher).await
    }

    /// Cached value without triggering a fetch
    pub fn peek(&self, key: &CacheKey, ttl: Duration) -> Option<V> {
        if !self.config.enabled {
            return None;
        }
        self.lookup(key, ttl, Utc::now())
    }

    fn lookup(&self, key: &CacheKey, ttl: Duration, now: DateTime<Utc>) -> Option<V> {
        if let Some(cached) = self.entries.get(key) {
            if cached.is_fresh(ttl, now) {
                log::debug!("Cache hit for key: {}", key);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(cached.data.clone());
            }
            log::debug!("Cache entry stale for key: {}", key);
        }

        log::debug!("Cache miss for key: {}", key);
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Store a value fetched at `created_at`
    pub fn put(&self, key: CacheKey, data: V, created_at: DateTime<Utc>) {
        if !self.config.enabled {
            return;
        }

        if !self.entries.contains_key(&key) && self.entries.len() >= self.config.max_entries {
            self.clear_expired(self.config.default_ttl);

            if self.entries.len() >= self.config.max_entries {
                self.evict_oldest();
            }
        }

        log::debug!("Stored in cache with key: {}", key);
        self.entries.insert(key, CachedResult::new(data, created_at));
    }

    /// Drop the entry and any in-flight marker for `key`
    pub fn invalidate(&self, key: &CacheKey) {
        self.entries.remove(key);
        self.deduplicator.forget(key.as_str());
        log::debug!("Invalidated cache key: {}", key);
    }

    /// Remove entries that are `ttl` old or older
    pub fn clear_expired(&self, ttl: Duration) {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, cached| cached.is_fresh(ttl, now));
        log::debug!(
            "Evicted {} expired cache entries",
            before.saturating_sub(self.entries.len())
        );
    }

    /// Remove the oldest quarter of the entries when at capacity
    fn evict_oldest(&self) {
        let mut entries: Vec<_> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().created_at))
            .collect();

        entries.sort_by_key(|(_, created_at)| *created_at);

        let to_remove = (self.config.max_entries / 4).max(1);
        for (key, _) in entries.into_iter().take(to_remove) {
            self.entries.remove(&key);
        }

        log::debug!("Evicted {} oldest cache entries", to_remove);
    }

    /// Clear all cache entries and pending requests
    pub fn clear(&self) {
        self.entries.clear();
        self.deduplicator.clear();
        log::info!("Cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics. Validity is judged against the default TTL.
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let total_entries = self.entries.len();
        let expired_entries = self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_fresh(self.config.default_ttl, now))
            .count();
        let dedup = self.deduplicator.stats();

        CacheStats {
            total_entries,
            valid_entries: total_entries.saturating_sub(expired_entries),
            expired_entries,
            pending_requests: dedup.pending_requests,
            max_entries: self.config.max_entries,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            deduplicated: dedup.coalesced,
        }
    }
}

/// Periodically sweep entries older than `ttl` out of `cache`.
pub fn spawn_cleanup<V>(cache: SharedRequestCache<V>, ttl: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let period = cache
        .config
        .cleanup_interval
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(300));

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // first tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            cache.clear_expired(ttl);
        }
    })
}

/// Cache statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub pending_requests: usize,
    pub max_entries: usize,
    pub hits: usize,
    pub misses: usize,
    pub deduplicated: usize,
}

/// Thread-safe wrapper for the cache
pub type SharedRequestCache<V> = Arc<RequestCache<V>>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;

    #[test]
    fn test_cache_key_generation() {
        let key1 = CacheKey::hashed("screener", ["marketCapMin=0", "sector=all"]);
        let key2 = CacheKey::hashed("screener", ["marketCapMin=0", "sector=all"]);
        assert_eq!(key1, key2);
        assert!(key1.as_str().starts_with("screener:"));

        let key3 = CacheKey::hashed("screener", ["marketCapMin=0", "sector=Technology"]);
        assert_ne!(key1, key3);

        // part boundaries matter
        let joined = CacheKey::hashed("screener", ["ab", "c"]);
        let split = CacheKey::hashed("screener", ["a", "bc"]);
        assert_ne!(joined, split);
    }

    #[test]
    fn test_cached_result_validity() {
        let now = Utc::now();
        let cached = CachedResult::new(1, now);
        assert!(cached.is_fresh(Duration::seconds(1), now));

        let expired = CachedResult::new(1, now - Duration::seconds(2));
        assert!(!expired.is_fresh(Duration::seconds(1), now));

        // exactly ttl old is already stale
        let boundary = CachedResult::new(1, now - Duration::seconds(1));
        assert!(!boundary.is_fresh(Duration::seconds(1), now));
    }

    #[tokio::test]
    async fn test_hit_skips_fetcher() {
        let cache: RequestCache<String> = RequestCache::new(CacheConfig::default());
        let key = CacheKey::new("quote:AAPL");
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..3 {
            let value = cache
                .get(&key, Duration::seconds(60), || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>("189.50".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "189.50");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[tokio::test]
    async fn test_ttl_is_per_call() {
        let cache: RequestCache<u32> = RequestCache::new(CacheConfig::default());
        let key = CacheKey::new("profile:MSFT");
        cache.put(key.clone(), 1, Utc::now() - Duration::seconds(120));

        // fresh for a caller tolerating 5 minutes
        let long = cache
            .get(&key, Duration::minutes(5), || async { Ok::<_, String>(2) })
            .await;
        assert_eq!(long, Ok(1));

        // stale for a caller wanting 60 seconds
        let short = cache
            .get(&key, Duration::seconds(60), || async { Ok::<_, String>(2) })
            .await;
        assert_eq!(short, Ok(2));
    }

    #[tokio::test]
    async fn test_late_leader_uses_value_stored_meanwhile() {
        let cache: RequestCache<u32> = RequestCache::new(CacheConfig::default());
        let key = CacheKey::new("quote:NFLX");
        let started_at = Utc::now();

        // our lookup missed, then another leader stored its result
        assert_eq!(cache.peek(&key, Duration::seconds(60)), None);
        cache.put(key.clone(), 640, Utc::now());

        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let value = cache
            .fetch_as_leader(&key, Duration::seconds(60), started_at, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(641)
            })
            .await;
        assert_eq!(value, Ok(640));
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        // a stale entry does not count
        let value = cache
            .fetch_as_leader(&key, Duration::zero(), started_at, || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, String>(641)
            })
            .await;
        assert_eq!(value, Ok(641));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let cache: RequestCache<u32> = RequestCache::new(CacheConfig::default());
        let key = CacheKey::new("metrics:IBM");

        let failed = cache
            .get(&key, Duration::seconds(60), || async { Err::<u32, _>("429") })
            .await;
        assert_eq!(failed, Err(CacheError::Fetch("429".to_string())));
        assert!(cache.is_empty());

        let ok = cache
            .get(&key, Duration::seconds(60), || async { Ok::<_, String>(3) })
            .await;
        assert_eq!(ok, Ok(3));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_gets_are_deduplicated() {
        let cache: SharedRequestCache<u32> = Arc::new(RequestCache::new(CacheConfig::default()));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = vec![];
        for _ in 0..4 {
            let cache = cache.clone();
            let calls = calls.clone();
            handles.push(tokio::spawn(async move {
                let key = CacheKey::new("candles:SPY");
                cache
                    .get(&key, Duration::seconds(60), || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(StdDuration::from_millis(80)).await;
                        Ok::<_, String>(500)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(500));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().deduplicated, 3);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let cache: RequestCache<u32> = RequestCache::new(CacheConfig::default());
        let a = CacheKey::new("a");
        let b = CacheKey::new("b");
        cache.put(a.clone(), 1, Utc::now());
        cache.put(b.clone(), 2, Utc::now());

        cache.invalidate(&a);
        assert!(cache.peek(&a, Duration::seconds(60)).is_none());
        assert_eq!(cache.peek(&b, Duration::seconds(60)), Some(2));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_expired() {
        let cache: RequestCache<u32> = RequestCache::new(CacheConfig::default());
        cache.put(CacheKey::new("old"), 1, Utc::now() - Duration::seconds(400));
        cache.put(CacheKey::new("new"), 2, Utc::now());

        cache.clear_expired(Duration::seconds(300));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek(&CacheKey::new("new"), Duration::seconds(300)), Some(2));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let config = CacheConfig {
            max_entries: 4,
            default_ttl: Duration::hours(1),
            ..CacheConfig::default()
        };
        let cache: RequestCache<u32> = RequestCache::new(config);
        let now = Utc::now();
        for i in 0..4 {
            cache.put(
                CacheKey::new(format!("k{}", i)),
                i,
                now - Duration::seconds(10 - i as i64),
            );
        }

        cache.put(CacheKey::new("k4"), 4, now);
        assert_eq!(cache.len(), 4);
        assert!(cache.peek(&CacheKey::new("k0"), Duration::hours(1)).is_none());
        assert_eq!(cache.peek(&CacheKey::new("k4"), Duration::hours(1)), Some(4));
    }

    #[tokio::test]
    async fn test_disabled_cache_always_fetches() {
        let config = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache: RequestCache<u32> = RequestCache::new(config);
        let key = CacheKey::new("x");
        let calls = AtomicUsize::new(0);
        let counter = &calls;

        for _ in 0..2 {
            let _ = cache
                .get(&key, Duration::seconds(60), || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(1)
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
    }
}

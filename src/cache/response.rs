//! Completed-response cache.
//!
//! [`ResponseCache`] stores the final text of successful completions keyed
//! by [`CacheKey`] (message + category). It is checked before any upstream
//! call; a hit skips the gateway, the quota check and the ledger entirely.
//!
//! Answers are stored with the model that produced them. Streams whose text
//! could not be captured are recorded with the [`CachedValue::Streamed`]
//! sentinel. Callers that need an answer use [`ResponseCache::get_answer`],
//! which treats the sentinel as a miss.
//!
//! Eviction is strict LRU on entry count combined with a per-entry TTL,
//! whichever comes first. The cache is process-local; two concurrent misses
//! on the same key both go upstream and the last writer wins.

use std::time::Duration;

use moka::future::Cache;
use moka::policy::EvictionPolicy;
use tracing::debug;

use super::key::CacheKey;
use crate::telemetry;

/// Configuration for the response cache.
///
/// ```rust
/// # use hermod::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(5_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 24 hours.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// A completed answer and the model that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedAnswer {
    pub text: String,
    pub model: String,
}

/// Cached value: the answer, or a marker that the answer was streamed
/// without a usable capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Text(CachedAnswer),
    Streamed,
}

impl CachedValue {
    pub fn text(text: impl Into<String>, model: impl Into<String>) -> Self {
        CachedValue::Text(CachedAnswer {
            text: text.into(),
            model: model.into(),
        })
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CachedValue::Text(answer) => Some(&answer.text),
            CachedValue::Streamed => None,
        }
    }
}

/// In-memory LRU + TTL cache of completed responses.
///
/// Internally synchronized; share it behind an `Arc`.
pub struct ResponseCache {
    cache: Cache<CacheKey, CachedValue>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self { cache }
    }

    /// Look up a cached value.
    ///
    /// Expired entries are never returned. Emits cache hit/miss metrics.
    pub async fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let category = key.category().as_str();
        match self.cache.get(key).await {
            Some(value) => {
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "category" => category)
                    .increment(1);
                debug!(key = %key, category, "cache hit");
                Some(value)
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "category" => category)
                    .increment(1);
                None
            }
        }
    }

    /// Look up a cached answer; the streamed sentinel counts as a miss.
    pub async fn get_answer(&self, key: &CacheKey) -> Option<CachedAnswer> {
        match self.get(key).await {
            Some(CachedValue::Text(answer)) => Some(answer),
            _ => None,
        }
    }

    /// Like [`get_answer`](Self::get_answer), text only.
    pub async fn get_text(&self, key: &CacheKey) -> Option<String> {
        self.get_answer(key).await.map(|answer| answer.text)
    }

    /// Insert or overwrite an entry, refreshing its recency and TTL.
    pub async fn set(&self, key: CacheKey, value: CachedValue) {
        debug!(key = %key, streamed = matches!(value, CachedValue::Streamed), "cache store");
        self.cache.insert(key, value).await;
    }

    /// Drop one entry.
    pub async fn invalidate(&self, key: &CacheKey) {
        self.cache.invalidate(key).await;
    }

    /// Apply pending evictions and expirations.
    ///
    /// moka performs maintenance lazily; [`len`](Self::len) is only exact
    /// after this has run.
    pub async fn flush_pending(&self) {
        self.cache.run_pending_tasks().await;
    }

    /// Approximate number of live entries.
    pub fn len(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}

// src/services/cache.rs
// DOCUMENTATION: Key-value cache with per-key TTL
// PURPOSE: Backing store for the tier-1 response cache, the tier-2 per-cell
// dataset cache and the geocode / arrest-rate caches (distinct key namespaces)

use crate::errors::AnalysisError;
use crate::models::Dataset;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Shared key-value cache
/// DOCUMENTATION: Values are JSON strings. An `Err` means the cache itself is
/// unreachable; callers treat that as `CacheUnavailable` and fall back to
/// the source of truth.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AnalysisError>;
}

/// Cache entry with expiration
#[derive(Clone, Debug)]
struct CacheEntry<T> {
    data: T,
    expires_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(data: T, ttl: Duration) -> Self {
        Self {
            data,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-process cache with TTL
/// DOCUMENTATION: Thread-safe map guarded by a tokio RwLock. Entries are never
/// mutated in place; a miss leads to a recompute and a full overwrite.
#[derive(Default)]
pub struct InMemoryCache {
    store: Arc<RwLock<HashMap<String, CacheEntry<String>>>>,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear expired entries
    pub async fn cleanup(&self) {
        let mut store = self.store.write().await;
        let before_count = store.len();
        store.retain(|_, entry| !entry.is_expired());
        let after_count = store.len();

        if before_count > after_count {
            log::info!(
                "Cache cleanup: removed {} expired entries ({} remaining)",
                before_count - after_count,
                after_count
            );
        }
    }

    /// Get cache statistics, broken down by key namespace
    pub async fn stats(&self) -> CacheStats {
        let store = self.store.read().await;
        let mut namespaces: HashMap<String, usize> = HashMap::new();
        let mut expired = 0;

        for (key, entry) in store.iter() {
            if entry.is_expired() {
                expired += 1;
                continue;
            }
            let namespace = key.split(':').next().unwrap_or_default().to_string();
            *namespaces.entry(namespace).or_default() += 1;
        }

        CacheStats {
            total_entries: store.len(),
            expired_entries: expired,
            active_entries: store.len() - expired,
            namespaces,
        }
    }

    /// Clear all cache entries
    #[allow(dead_code)]
    pub async fn clear(&self) {
        let mut store = self.store.write().await;
        let count = store.len();
        store.clear();
        log::info!("Cache cleared: {} entries removed", count);
    }
}

#[async_trait]
impl KeyValueCache for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AnalysisError> {
        let store = self.store.read().await;

        match store.get(key) {
            Some(entry) if !entry.is_expired() => {
                log::debug!("Cache HIT for key: {}", key);
                Ok(Some(entry.data.clone()))
            }
            Some(_) => {
                log::debug!("Cache EXPIRED for key: {}", key);
                Ok(None)
            }
            None => {
                log::debug!("Cache MISS for key: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), AnalysisError> {
        let mut store = self.store.write().await;
        store.insert(key.to_string(), CacheEntry::new(value, ttl));
        log::debug!("Cache SET for key: {} (TTL: {}s)", key, ttl.as_secs());
        Ok(())
    }
}

/// Cache statistics
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub expired_entries: usize,
    pub active_entries: usize,
    /// Active entries per key prefix (analysis, data, address, arrest_rate)
    pub namespaces: HashMap<String, usize>,
}

/// Start background cleanup task
/// DOCUMENTATION: Periodically removes expired entries
pub fn start_cleanup_task(cache: Arc<InMemoryCache>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            cache.cleanup().await;
            let stats = cache.stats().await;
            log::debug!("Cache stats after cleanup: {:?}", stats);
        }
    });
}

/// Result of a typed cache read
#[derive(Debug)]
pub enum CacheRead<T> {
    Hit(T),
    Miss,
    /// The cache could not be reached
    Unavailable(AnalysisError),
}

/// Read and decode a JSON value; an undecodable entry counts as a miss
pub async fn read_json<T: DeserializeOwned>(cache: &dyn KeyValueCache, key: &str) -> CacheRead<T> {
    match cache.get(key).await {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(value) => CacheRead::Hit(value),
            Err(e) => {
                log::warn!("Discarding corrupt cache entry {}: {}", key, e);
                CacheRead::Miss
            }
        },
        Ok(None) => CacheRead::Miss,
        Err(e) => {
            log::warn!("Cache read failed for {}: {}", key, e);
            CacheRead::Unavailable(e)
        }
    }
}

/// Encode and write a JSON value without failing the caller
/// DOCUMENTATION: The write is bounded by `timeout`; errors and timeouts are
/// logged and reported as `false`
pub async fn write_json<T: Serialize>(
    cache: &dyn KeyValueCache,
    key: &str,
    value: &T,
    ttl: Duration,
    timeout: Duration,
) -> bool {
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("Failed to serialize cache value for {}: {}", key, e);
            return false;
        }
    };

    match tokio::time::timeout(timeout, cache.set(key, raw, ttl)).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::warn!("Cache write failed for {}: {}", key, e);
            false
        }
        Err(_) => {
            log::warn!("Cache write timed out for {} after {:?}", key, timeout);
            false
        }
    }
}

/// Round a coordinate to a fixed number of decimals for use in a key
fn rounded(value: f64, decimals: u32) -> String {
    let factor = 10f64.powi(decimals as i32);
    // + 0.0 turns -0.0 into 0.0 so both render the same
    let value = (value * factor).round() / factor + 0.0;
    format!("{:.*}", decimals as usize, value)
}

/// Tier-1 key: rounded request coordinate plus radius
pub fn response_key(lat: f64, lng: f64, radius: u32, decimals: u32) -> String {
    format!(
        "analysis:{}:{}:{}",
        rounded(lat, decimals),
        rounded(lng, decimals),
        radius
    )
}

/// Tier-2 key: one cell of one dataset
pub fn grid_key(cell: &str, dataset: Dataset) -> String {
    format!("data:{}:{}", cell, dataset.as_str())
}

pub fn address_key(lat: f64, lng: f64, decimals: u32) -> String {
    format!("address:{}:{}", rounded(lat, decimals), rounded(lng, decimals))
}

pub fn arrest_rate_key(district: &str) -> String {
    format!("arrest_rate:{}", district.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_cache_set_get() {
        let cache = InMemoryCache::new();

        assert_ok!(
            cache
                .set("test_key", "test_value".to_string(), Duration::from_secs(60))
                .await
        );
        let result = assert_ok!(cache.get("test_key").await);

        assert_eq!(result, Some("test_value".to_string()));
        assert_eq!(cache.get("other_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cache_expiration() {
        let cache = InMemoryCache::new();
        cache
            .set("test_key", "test_value".to_string(), Duration::from_millis(50))
            .await
            .unwrap();

        // Should exist immediately
        assert!(cache.get("test_key").await.unwrap().is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get("test_key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_overwrite_replaces_value() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set("k", "a".to_string(), ttl).await.unwrap();
        cache.set("k", "b".to_string(), ttl).await.unwrap();
        assert_eq!(cache.get("k").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test]
    async fn test_cache_cleanup_and_stats() {
        let cache = InMemoryCache::new();

        cache
            .set("data:wydm9q:cctv", "[]".to_string(), Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .set("address:37.5663:126.9779", "{}".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.expired_entries, 1);
        assert_eq!(stats.namespaces.get("address"), Some(&1));

        cache.cleanup().await;

        let stats = cache.stats().await;
        assert_eq!(stats.total_entries, 1);
        assert_eq!(stats.active_entries, 1);

        cache.clear().await;
        assert_eq!(cache.stats().await.total_entries, 0);
    }

    #[tokio::test]
    async fn test_json_helpers() {
        let cache = InMemoryCache::new();
        let ttl = Duration::from_secs(60);
        let timeout = Duration::from_millis(100);

        assert!(write_json(&cache, "arrest_rate:중구", &Some(0.72), ttl, timeout).await);
        match read_json::<Option<f64>>(&cache, "arrest_rate:중구").await {
            CacheRead::Hit(rate) => assert_eq!(rate, Some(0.72)),
            other => panic!("expected hit, got {:?}", other),
        }

        cache.set("arrest_rate:종로구", "not json".to_string(), ttl).await.unwrap();
        assert!(matches!(
            read_json::<Option<f64>>(&cache, "arrest_rate:종로구").await,
            CacheRead::Miss
        ));
    }

    #[tokio::test]
    async fn test_cached_floats_read_back_bit_exact() {
        let cache = InMemoryCache::new();
        let values: Vec<f64> = vec![126.97926149389276, 249.99999999074362, 37.566_300_000_000_01];

        assert!(
            write_json(&cache, "data:wydm9q:cctv", &values, Duration::from_secs(60), Duration::from_millis(100))
                .await
        );
        match read_json::<Vec<f64>>(&cache, "data:wydm9q:cctv").await {
            CacheRead::Hit(read) => {
                for (a, b) in read.iter().zip(&values) {
                    assert_eq!(a.to_bits(), b.to_bits(), "{} != {}", a, b);
                }
            }
            other => panic!("expected hit, got {:?}", other),
        }
    }

    #[test]
    fn test_keys_round_coordinates() {
        let key1 = response_key(37.56631, 126.97791, 500, 4);
        let key2 = response_key(37.56629, 126.97789, 500, 4);
        let key3 = response_key(37.5664, 126.9779, 500, 4);

        assert_eq!(key1, "analysis:37.5663:126.9779:500");
        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
        assert_ne!(key1, response_key(37.5663, 126.9779, 300, 4));

        assert_eq!(address_key(-0.00001, 0.0, 4), "address:0.0000:0.0000");
        assert_eq!(grid_key("wydm9q", Dataset::PoliceOffice), "data:wydm9q:police");
        assert_eq!(arrest_rate_key(" 중구 "), "arrest_rate:중구");
    }
}

//! Dashboard result cache
//!
//! A string key/value store with per-entry TTL. Values are JSON documents.
//! Two backends: an in-process Moka cache (default) and Redis for deployments
//! with more than one replica.

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Cache backend failure
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Key/value store holding serialized dashboard results
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a raw value, `None` when absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store a raw value for `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()>;
}

/// Read and decode a JSON value
///
/// An entry that no longer decodes as `T` is reported as a miss.
pub async fn get_json<T: DeserializeOwned>(
    cache: &dyn CacheStore,
    key: &str,
) -> CacheResult<Option<T>> {
    let Some(raw) = cache.get(key).await? else {
        return Ok(None);
    };

    match serde_json::from_str::<T>(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
            Ok(None)
        }
    }
}

/// Encode and store a JSON value
pub async fn set_json<T: Serialize + ?Sized>(
    cache: &dyn CacheStore,
    key: &str,
    value: &T,
    ttl: Duration,
) -> CacheResult<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, raw, ttl).await
}

// =============================================================================
// In-memory backend
// =============================================================================

#[derive(Clone)]
struct Entry {
    value: Arc<str>,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(&self, _key: &String, value: &Entry, _now: Instant) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _now: Instant,
        _current: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// In-process cache backed by Moka
///
/// Entries are lost on restart.
pub struct MemoryCache {
    entries: Cache<String, Entry>,
}

impl MemoryCache {
    /// Create new in-memory cache
    ///
    /// # Arguments
    /// * `max_entries` - Capacity before LRU eviction kicks in
    pub fn new(max_entries: u64) -> Self {
        let entries = Cache::builder()
            .max_capacity(max_entries)
            .expire_after(PerEntryTtl)
            .build();

        Self { entries }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.get(key).await.map(|entry| entry.value.to_string()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        self.entries
            .insert(
                key.to_string(),
                Entry {
                    value: Arc::from(value),
                    ttl,
                },
            )
            .await;
        Ok(())
    }
}

// =============================================================================
// Redis backend
// =============================================================================

/// Shared cache backed by Redis `GET` / `SET EX`
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    /// Connect to Redis
    ///
    /// # Errors
    /// Returns error if the URL is invalid or the server is unreachable
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        tracing::info!("Connected to Redis cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value, secs).await?;
        tracing::debug!(key = %key, ttl = secs, "Cache set");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        count: u32,
    }

    #[tokio::test]
    async fn memory_cache_roundtrips_json() {
        let cache = MemoryCache::new(100);
        set_json(&cache, "k", &Sample { count: 3 }, Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<Sample> = get_json(&cache, "k").await.unwrap();
        assert_eq!(value, Some(Sample { count: 3 }));
    }

    #[tokio::test]
    async fn memory_cache_reports_missing_key() {
        let cache = MemoryCache::new(100);
        assert_eq!(cache.get("absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn memory_cache_expires_entries() {
        let cache = MemoryCache::new(100);
        cache
            .set("short", "1".to_string(), Duration::from_millis(200))
            .await
            .unwrap();
        cache
            .set("long", "2".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;

        assert_eq!(cache.get("short").await.unwrap(), None);
        assert_eq!(cache.get("long").await.unwrap().as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let cache = MemoryCache::new(100);
        cache
            .set("k", "not json".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let value: Option<Sample> = get_json(&cache, "k").await.unwrap();
        assert!(value.is_none());
    }
}

use crate::models::domain::expiry_after;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Longest lifetime either tier of [`TieredStore`] is asked to keep an entry
pub const MAX_STORE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Errors that can occur with cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),
}

/// Source of the current time, swappable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now = expiry_after(*now, by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Key-value store with per-entry time to live
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;
}

/// In-process store, expiry is read from the injected clock
pub struct MemoryStore {
    entries: RwLock<HashMap<String, (String, DateTime<Utc>)>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = self.clock.now();
        let entries = self.entries.read();
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| now < *expires_at)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let expires_at = expiry_after(self.clock.now(), ttl);
        self.entries.write().insert(key.to_string(), (value, expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().remove(key);
        Ok(())
    }
}

/// Multi-tier store
///
/// L1 (in-memory) is local to the process, L2 (Redis) is shared across
/// instances. Entries carry their own expiry in both tiers.
pub struct TieredStore {
    // Store ConnectionManager in a Mutex for interior mutability
    redis: Arc<tokio::sync::Mutex<ConnectionManager>>,
    l1_cache: moka::future::Cache<String, (String, DateTime<Utc>)>,
}

impl TieredStore {
    /// Create a new tiered store; `max_ttl` bounds how long L1 keeps anything
    /// and is itself capped at [`MAX_STORE_TTL`]
    pub async fn new(redis_url: &str, l1_size: u64, max_ttl: Duration) -> Result<Self, CacheError> {
        let client = redis::Client::open(redis_url)?;
        let redis = redis::aio::ConnectionManager::new(client).await?;

        let l1_cache = moka::future::CacheBuilder::new(l1_size)
            .time_to_live(max_ttl.min(MAX_STORE_TTL))
            .build();

        Ok(Self {
            redis: Arc::new(tokio::sync::Mutex::new(redis)),
            l1_cache,
        })
    }
}

#[async_trait]
impl KeyValueStore for TieredStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        // Try L1 cache first
        if let Some((value, expires_at)) = self.l1_cache.get(key).await {
            if Utc::now() < expires_at {
                tracing::trace!("L1 cache hit: {}", key);
                return Ok(Some(value));
            }
            self.l1_cache.invalidate(key).await;
        }

        // Try L2 cache (Redis)
        let mut conn = self.redis.lock().await;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        let remaining_secs: i64 = redis::cmd("TTL").arg(key).query_async(&mut *conn).await?;
        drop(conn);

        match value {
            Some(value) => {
                tracing::trace!("L2 cache hit: {}", key);
                if remaining_secs > 0 {
                    let expires_at = expiry_after(Utc::now(), Duration::from_secs(remaining_secs as u64));
                    self.l1_cache
                        .insert(key.to_string(), (value.clone(), expires_at))
                        .await;
                }
                Ok(Some(value))
            }
            None => {
                tracing::trace!("Cache miss: {}", key);
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        let ttl = ttl.min(MAX_STORE_TTL);
        let expires_at = expiry_after(Utc::now(), ttl);
        self.l1_cache
            .insert(key.to_string(), (value.clone(), expires_at))
            .await;

        // Set in L2 cache with explicit TTL
        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl.as_secs().max(1))
            .arg(value)
            .query_async(&mut *conn)
            .await?;
        drop(conn);

        tracing::trace!("Cache set: {}", key);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.l1_cache.invalidate(key).await;
        let mut conn = self.redis.lock().await;
        let _: () = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        Ok(())
    }
}

/// Cache key builder
pub struct CacheKey;

impl CacheKey {
    /// Key of the scraped catalog snapshot
    pub fn snapshot() -> &'static str {
        "similar:snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_expires_with_clock() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemoryStore::new(clock.clone());

        store.set("key", "value".to_string(), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("key").await.unwrap().as_deref(), Some("value"));

        clock.advance(Duration::from_secs(59));
        assert!(store.get("key").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(store.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_accepts_huge_ttl() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemoryStore::new(clock.clone());

        store.set("key", "value".to_string(), Duration::from_secs(u64::MAX)).await.unwrap();
        clock.advance(Duration::from_secs(u64::MAX));

        assert_eq!(clock.now(), DateTime::<Utc>::MAX_UTC);
        // Saturated on both sides: expiry is not after now
        assert!(store.get("key").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryStore::default();
        store.set("key", "value".to_string(), Duration::from_secs(60)).await.unwrap();
        store.delete("key").await.unwrap();

        assert!(store.get("key").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    #[ignore = "Requires Redis"]
    async fn test_tiered_store_set_get() {
        let store = TieredStore::new("redis://127.0.0.1:6379", 16, Duration::from_secs(60))
            .await
            .expect("Failed to create cache");

        store.set("test_key", "test_value".to_string(), Duration::from_secs(30)).await.unwrap();
        assert_eq!(store.get("test_key").await.unwrap().as_deref(), Some("test_value"));

        store.delete("test_key").await.unwrap();
        assert!(store.get("test_key").await.unwrap().is_none());
    }

    #[test]
    fn test_cache_key_builder() {
        assert_eq!(CacheKey::snapshot(), "similar:snapshot");
    }
}

use crate::error::Result;
use moka::Expiry;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Distributed cache; the in-process cache is used when unset
    pub redis_url: Option<String>,
    /// Entry bound for the in-process cache
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            max_capacity: 10_000,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        entry.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        entry.ttl
    }
}

#[derive(Clone)]
enum Backend {
    Memory(moka::future::Cache<String, Entry>),
    Redis(ConnectionManager),
}

/// JSON value cache over Redis or an in-process store
#[derive(Clone)]
pub struct Cache {
    backend: Backend,
}

impl Cache {
    pub async fn new(config: &CacheConfig) -> Result<Self> {
        match config.redis_url.as_deref().filter(|url| !url.is_empty()) {
            Some(url) => {
                let client = Client::open(url)?;
                let manager = ConnectionManager::new(client).await?;
                Ok(Self {
                    backend: Backend::Redis(manager),
                })
            }
            None => Ok(Self::in_memory(config.max_capacity)),
        }
    }

    pub fn in_memory(max_capacity: u64) -> Self {
        let cache = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(EntryExpiry)
            .build();

        Self {
            backend: Backend::Memory(cache),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        }
    }

    /// Set a value in the cache with optional TTL (seconds). Writing an
    /// existing key replaces both the value and its TTL.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: Option<u64>) -> Result<()> {
        let serialized = serde_json::to_string(value)?;

        match &self.backend {
            Backend::Memory(cache) => {
                let entry = Entry {
                    value: serialized,
                    ttl: ttl_seconds.map(Duration::from_secs),
                };
                cache.insert(key.to_string(), entry).await;
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                match ttl_seconds {
                    Some(ttl) => conn.set_ex::<_, _, ()>(key, serialized, ttl).await?,
                    None => conn.set::<_, _, ()>(key, serialized).await?,
                }
            }
        }

        Ok(())
    }

    /// Get a value from the cache
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let raw = match &self.backend {
            Backend::Memory(cache) => cache.get(key).await.map(|entry| entry.value),
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                conn.get::<_, Option<String>>(key).await?
            }
        };

        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        match &self.backend {
            Backend::Memory(cache) => {
                cache.remove(key).await;
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                conn.del::<_, ()>(key).await?;
            }
        }
        Ok(())
    }

    /// Delete keys matching a glob. The in-process backend only understands
    /// a trailing `*`.
    pub async fn delete_pattern(&self, pattern: &str) -> Result<u64> {
        let count = match &self.backend {
            Backend::Memory(cache) => {
                let prefix = pattern.trim_end_matches('*');
                let keys: Vec<String> = cache
                    .iter()
                    .filter(|(key, _)| key.starts_with(prefix))
                    .map(|(key, _)| key.to_string())
                    .collect();

                for key in &keys {
                    cache.remove(key).await;
                }
                keys.len() as u64
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let keys: Vec<String> = conn.keys(pattern).await?;
                if keys.is_empty() {
                    return Ok(0);
                }
                let count = keys.len() as u64;
                conn.del::<_, ()>(keys).await?;
                count
            }
        };

        tracing::debug!(pattern, count, "Deleted cache keys matching pattern");
        Ok(count)
    }

    pub async fn ping(&self) -> Result<()> {
        if let Backend::Redis(manager) = &self.backend {
            let mut conn = manager.clone();
            redis::cmd("PING").query_async::<()>(&mut conn).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get() {
        let cache = Cache::in_memory(100);
        cache.set("test_key", &"test_value", Some(60)).await.unwrap();

        let value: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(value, Some("test_value".to_string()));

        cache.delete("test_key").await.unwrap();
        let value: Option<String> = cache.get("test_key").await.unwrap();
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = Cache::in_memory(100);
        cache.set("short", &1u32, Some(1)).await.unwrap();
        cache.set("forever", &2u32, None).await.unwrap();

        tokio::time::sleep(Duration::from_millis(1200)).await;

        assert_eq!(cache.get::<u32>("short").await.unwrap(), None);
        assert_eq!(cache.get::<u32>("forever").await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let cache = Cache::in_memory(100);
        cache.set("privileges:a", &1u32, Some(60)).await.unwrap();
        cache.set("privileges:b", &2u32, Some(60)).await.unwrap();
        cache.set("session:a", &3u32, Some(60)).await.unwrap();

        assert_eq!(cache.delete_pattern("privileges:*").await.unwrap(), 2);
        assert_eq!(cache.get::<u32>("privileges:a").await.unwrap(), None);
        assert_eq!(cache.get::<u32>("session:a").await.unwrap(), Some(3));
    }

    #[tokio::test]
    async fn test_memory_backend_when_redis_unset() {
        let cache = Cache::new(&CacheConfig::default()).await.unwrap();
        assert_eq!(cache.backend_name(), "memory");
        cache.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Only run with Redis available
    async fn test_redis_connection() {
        let config = CacheConfig {
            redis_url: Some(
                std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            ),
            ..Default::default()
        };
        let cache = Cache::new(&config).await.expect("Failed to connect to Redis");
        cache.ping().await.expect("Failed to ping Redis");
    }
}

/// Caching layer for catalog-service
///
/// Products are cached under `product:{id}` with a sliding TTL: every hit
/// resets the entry to its full lifetime. Entries are invalidated by the
/// image worker after it appends a compressed-image URL.
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::Product;

const DEFAULT_TTL_SECONDS: u64 = 600;

/// Cache operations the read path and the image worker depend on
#[async_trait]
pub trait ProductCache: Send + Sync {
    /// Look up a cached product; a hit resets the entry's TTL (sliding
    /// expiration) before the value is returned.
    async fn get(&self, product_id: i32) -> Result<Option<Product>>;

    /// Store a product with a fresh TTL
    async fn put(&self, product: &Product) -> Result<()>;

    /// Drop the cache entry for a product
    async fn invalidate(&self, product_id: i32) -> Result<()>;
}

/// Redis-backed product cache
#[derive(Clone)]
pub struct RedisProductCache {
    conn: Arc<Mutex<ConnectionManager>>,
    ttl_seconds: u64,
}

impl RedisProductCache {
    /// Initialize cache from Redis client
    pub async fn new(client: redis::Client, ttl_seconds: Option<u64>) -> Result<Self> {
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to connect to Redis: {e}")))?;

        Ok(Self::with_manager(Arc::new(Mutex::new(manager)), ttl_seconds))
    }

    pub fn with_manager(manager: Arc<Mutex<ConnectionManager>>, ttl_seconds: Option<u64>) -> Self {
        Self {
            conn: manager,
            ttl_seconds: ttl_seconds.unwrap_or(DEFAULT_TTL_SECONDS),
        }
    }

    fn product_key(id: i32) -> String {
        format!("product:{id}")
    }
}

#[async_trait]
impl ProductCache for RedisProductCache {
    async fn get(&self, product_id: i32) -> Result<Option<Product>> {
        let key = Self::product_key(product_id);
        let mut conn = self.conn.lock().await;

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to read from cache: {e}")))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        // Sliding expiration: a hit restores the full TTL
        let _: bool = conn
            .expire(&key, self.ttl_seconds as i64)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to reset TTL: {e}")))?;

        let product = serde_json::from_str(&raw)
            .map_err(|e| AppError::CacheError(format!("Failed to deserialize cache value: {e}")))?;

        Ok(Some(product))
    }

    async fn put(&self, product: &Product) -> Result<()> {
        let payload = serde_json::to_string(product)
            .map_err(|e| AppError::CacheError(format!("Failed to serialize cache value: {e}")))?;

        let mut conn = self.conn.lock().await;
        conn.set_ex(Self::product_key(product.product_id), payload, self.ttl_seconds)
            .await
            .map_err(|e| AppError::CacheError(format!("Failed to write to cache: {e}")))
    }

    async fn invalidate(&self, product_id: i32) -> Result<()> {
        let mut conn = self.conn.lock().await;
        conn.del(Self::product_key(product_id))
            .await
            .map(|_: usize| ())
            .map_err(|e| AppError::CacheError(format!("Failed to delete cache key: {e}")))
    }
}

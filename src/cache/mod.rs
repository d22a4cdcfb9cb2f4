use redis::{AsyncCommands, Client, RedisError, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache for hot lookups (market listing, product and profile
/// detail). Values are stored as JSON strings. Cache failures are never
/// fatal; callers fall back to the database.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    pub async fn new(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client).await?;
        Ok(Self { connection })
    }

    /// Get a value from cache.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> redis::RedisResult<Option<T>> {
        let mut con = self.connection.clone();
        let value: Option<String> = con.get(key).await?;

        match value {
            Some(v) => {
                let deserialized = serde_json::from_str(&v).map_err(|e| {
                    RedisError::from((
                        redis::ErrorKind::TypeError,
                        "Deserialization error",
                        e.to_string(),
                    ))
                })?;
                Ok(Some(deserialized))
            }
            None => Ok(None),
        }
    }

    /// Set a value in cache with a TTL.
    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> redis::RedisResult<()> {
        let serialized = serde_json::to_string(value).map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "Serialization error",
                e.to_string(),
            ))
        })?;

        let mut con = self.connection.clone();
        con.set_ex(key, serialized, ttl.as_secs()).await
    }

    /// Delete a key from cache.
    pub async fn delete(&self, key: &str) -> redis::RedisResult<()> {
        let mut con = self.connection.clone();
        con.del(key).await
    }

    /// Delete all keys matching a pattern (used to drop listing pages after
    /// a product write).
    pub async fn delete_pattern(&self, pattern: &str) -> redis::RedisResult<()> {
        let mut con = self.connection.clone();
        let keys: Vec<String> = con.keys(pattern).await?;

        if !keys.is_empty() {
            let _: () = con.del(&keys).await?;
        }

        Ok(())
    }
}

/// Cache key builders.
pub mod keys {
    /// Key for one page of the market listing.
    pub fn market_page(page: u64, limit: u64) -> String {
        format!("market:page:{page}:{limit}")
    }

    /// Pattern covering every market listing page.
    pub fn market_pattern() -> &'static str {
        "market:page:*"
    }

    /// Key for a single product.
    pub fn product(id: &str) -> String {
        format!("product:{id}")
    }

    /// Key for a single profile.
    pub fn profile(id: &str) -> String {
        format!("profile:{id}")
    }

    /// Key for a farmer's own product list.
    pub fn farmer_products(farmer_id: &str) -> String {
        format!("farmer:{farmer_id}:products")
    }
}

/// Cache TTLs, overridable from the environment.
pub struct CacheConfig {
    pub market_ttl: Duration,
    pub product_ttl: Duration,
    pub profile_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            market_ttl: Duration::from_secs(300),
            product_ttl: Duration::from_secs(600),
            profile_ttl: Duration::from_secs(900),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self {
            market_ttl: parse_duration_secs("CACHE_TTL_MARKET", 300),
            product_ttl: parse_duration_secs("CACHE_TTL_PRODUCT", 600),
            profile_ttl: parse_duration_secs("CACHE_TTL_PROFILE", 900),
        }
    }
}

fn parse_duration_secs(env_var: &str, default: u64) -> Duration {
    std::env::var(env_var)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(default))
}

/// Wrapper type for Actix-web app data.
pub type CacheData = Arc<RedisCache>;

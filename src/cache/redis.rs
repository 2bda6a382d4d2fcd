use redis::{AsyncCommands, Client, RedisError};
use tracing::{error, info};
use uuid::Uuid;

// Redis cache key prefixes
pub const FEED_SNAPSHOT_KEY: &str = "feed:snapshot";
pub const UNREAD_COUNT_KEY_PREFIX: &str = "unread";
const FEED_SNAPSHOT_TTL_SECONDS: u64 = 60; // 1 minute
const UNREAD_COUNT_TTL_SECONDS: u64 = 300; // 5 minutes

// Error type for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    RedisError(String),

    #[error("Deserialization error: {0}")]
    DeserializationError(String),
}

#[derive(Debug, Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub fn new(client: Client) -> Self {
        // Just create the instance without validation
        // Connection validation will happen on first use
        Self { client }
    }

    // Get the client
    pub fn get_client(&self) -> &Client {
        &self.client
    }

    // Cache the default feed snapshot (no filters, newest-first)
    pub async fn cache_feed_snapshot(&self, json_data: &str) -> Result<(), RedisError> {
        self.get_client()
            .get_multiplexed_async_connection()
            .await?
            .set_ex(FEED_SNAPSHOT_KEY, json_data, FEED_SNAPSHOT_TTL_SECONDS)
            .await
            .map(|_: ()| ())
    }

    // Get the default feed snapshot from cache
    pub async fn get_feed_snapshot(&self) -> Result<Option<String>, RedisError> {
        let mut connection = self.client.get_multiplexed_async_connection().await?;

        let result: Option<String> = connection.get(FEED_SNAPSHOT_KEY).await?;

        if result.is_some() {
            info!("Cache hit for feed snapshot");
        } else {
            info!("Cache miss for feed snapshot");
        }

        Ok(result)
    }

    // Invalidate the feed snapshot after any issue, vote or comment write
    pub async fn invalidate_feed_snapshot(&self) -> Result<(), RedisError> {
        self.get_client()
            .get_multiplexed_async_connection()
            .await?
            .del(FEED_SNAPSHOT_KEY)
            .await
            .map(|_: ()| ())
    }

    // Cache a user's unread notification count
    pub async fn cache_unread_count(&self, user_id: Uuid, count: i64) -> Result<(), RedisError> {
        let key = format!("{}:{}", UNREAD_COUNT_KEY_PREFIX, user_id);
        self.get_client()
            .get_multiplexed_async_connection()
            .await?
            .set_ex(key, count, UNREAD_COUNT_TTL_SECONDS)
            .await
            .map(|_: ()| ())
    }

    // Get a user's unread notification count from cache
    pub async fn get_unread_count(&self, user_id: Uuid) -> Result<Option<i64>, CacheError> {
        let mut connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!("Redis connection error while getting unread count: {}", e);
                CacheError::RedisError(e.to_string())
            })?;

        let cache_key = format!("{}:{}", UNREAD_COUNT_KEY_PREFIX, user_id);
        let result: Option<String> = connection.get(&cache_key).await.map_err(|e| {
            error!("Redis error while getting unread count: {}", e);
            CacheError::RedisError(e.to_string())
        })?;

        match result {
            Some(raw) => {
                let count: i64 = raw.parse().map_err(|e| {
                    error!("Failed to parse cached unread count: {}", e);
                    CacheError::DeserializationError(format!("{}", e))
                })?;
                Ok(Some(count))
            }
            None => Ok(None),
        }
    }

    // Invalidate a user's unread count after notification writes
    pub async fn invalidate_unread_count(&self, user_id: Uuid) -> Result<(), RedisError> {
        let key = format!("{}:{}", UNREAD_COUNT_KEY_PREFIX, user_id);
        self.get_client()
            .get_multiplexed_async_connection()
            .await?
            .del(key)
            .await
            .map(|_: ()| ())
    }

    // Invalidate unread counts for a batch of users in one round trip
    pub async fn invalidate_unread_counts(&self, user_ids: &[Uuid]) -> Result<(), RedisError> {
        if user_ids.is_empty() {
            return Ok(());
        }

        let mut connection = self.get_client().get_multiplexed_async_connection().await?;

        let keys: Vec<String> = user_ids
            .iter()
            .map(|id| format!("{}:{}", UNREAD_COUNT_KEY_PREFIX, id))
            .collect();

        connection.del::<_, ()>(&keys).await?;
        info!("Invalidated unread counts for {} users", user_ids.len());
        Ok(())
    }
}

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::UserRecord;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] fred::error::RedisError),
    #[error("failed to encode cached user: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("invalid cache endpoint `{0}`")]
    Endpoint(String),
}

/// Key/value store holding serialized users with a uniform TTL.
#[async_trait]
pub trait UserCacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<UserRecord>, CacheError>;

    async fn set(&self, key: &str, user: &UserRecord, ttl: Duration) -> Result<(), CacheError>;

    /// Replace the entry only when one is already present.
    async fn set_if_exists(
        &self,
        key: &str,
        user: &UserRecord,
        ttl: Duration,
    ) -> Result<(), CacheError>;
}

use std::time::Duration;

use async_trait::async_trait;
use fred::clients::RedisPool;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::{
    ConnectionConfig, Expiration, PerformanceConfig, RedisConfig, RedisValue, ServerConfig,
    SetOptions,
};
use tracing::info;

use crate::config::RedisSettings;
use crate::domain::entities::UserRecord;

use super::backend::{CacheError, UserCacheBackend};

const DEFAULT_REDIS_PORT: u16 = 6379;

/// Users stored as JSON strings under `SET key value EX ttl`.
pub struct RedisUserCache {
    pool: RedisPool,
}

impl RedisUserCache {
    pub async fn connect(settings: &RedisSettings) -> Result<Self, CacheError> {
        let hosts = settings
            .endpoints
            .iter()
            .map(|endpoint| parse_endpoint(endpoint))
            .collect::<Result<Vec<_>, _>>()?;

        let server = if settings.cluster {
            ServerConfig::new_clustered(hosts)
        } else {
            let (host, port) = hosts
                .into_iter()
                .next()
                .ok_or_else(|| CacheError::Endpoint(String::new()))?;
            ServerConfig::new_centralized(host, port)
        };

        let pool = RedisPool::new(
            RedisConfig {
                server,
                ..Default::default()
            },
            Some(PerformanceConfig {
                default_command_timeout: settings.command_timeout,
                ..Default::default()
            }),
            Some(ConnectionConfig {
                connection_timeout: settings.dial_timeout,
                ..Default::default()
            }),
            None,
            settings.pool_size.get(),
        )?;

        pool.connect();
        pool.wait_for_connect().await?;

        info!(
            target = "realworld::cache::redis",
            endpoints = ?settings.endpoints,
            cluster = settings.cluster,
            pool_size = settings.pool_size.get(),
            "connected to redis"
        );
        Ok(Self { pool })
    }

    async fn write(
        &self,
        key: &str,
        user: &UserRecord,
        ttl: Duration,
        options: Option<SetOptions>,
    ) -> Result<(), CacheError> {
        let value = serde_json::to_string(user)?;
        let seconds = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        self.pool
            .set::<RedisValue, _, _>(key, value, Some(Expiration::EX(seconds)), options, false)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl UserCacheBackend for RedisUserCache {
    async fn get(&self, key: &str) -> Result<Option<UserRecord>, CacheError> {
        let value = self.pool.get::<Option<String>, _>(key).await?;
        match value {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, user: &UserRecord, ttl: Duration) -> Result<(), CacheError> {
        self.write(key, user, ttl, None).await
    }

    async fn set_if_exists(
        &self,
        key: &str,
        user: &UserRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.write(key, user, ttl, Some(SetOptions::XX)).await
    }
}

/// `host[:port]`; the port defaults to 6379.
fn parse_endpoint(endpoint: &str) -> Result<(String, u16), CacheError> {
    let endpoint = endpoint.trim();
    let invalid = || CacheError::Endpoint(endpoint.to_string());

    match endpoint.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => {
            let port = port.parse::<u16>().map_err(|_| invalid())?;
            Ok((host.to_string(), port))
        }
        Some(_) => Err(invalid()),
        None if endpoint.is_empty() => Err(invalid()),
        None => Ok((endpoint.to_string(), DEFAULT_REDIS_PORT)),
    }
}

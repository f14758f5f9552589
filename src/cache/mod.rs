//! Optional user cache placed in front of the users store.
//!
//! Only lookups by id are cached. Writes go to the store first and refresh the cache
//! afterwards; a failing cache never fails a request.

mod backend;
mod memory;
mod redis;
mod single_flight;
mod users;

pub use backend::{CacheError, UserCacheBackend};
pub use memory::MemoryUserCache;
pub use redis::RedisUserCache;
pub use users::CachedUsersRepo;

use std::sync::Arc;

use tracing::info;

use crate::application::repos::UsersRepo;
use crate::config::{CacheKind, CacheSettings};

/// Wrap `store` in the configured cache, or return it unchanged when caching is off.
pub async fn users_repo<R>(
    settings: &CacheSettings,
    store: Arc<R>,
) -> Result<Arc<dyn UsersRepo>, CacheError>
where
    R: UsersRepo + 'static,
{
    if !settings.enabled {
        info!(target = "realworld::cache", "user cache disabled");
        let store: Arc<dyn UsersRepo> = store;
        return Ok(store);
    }

    let backend: Arc<dyn UserCacheBackend> = match settings.kind {
        CacheKind::Redis => Arc::new(RedisUserCache::connect(&settings.redis).await?),
        CacheKind::Memory => Arc::new(MemoryUserCache::new(settings.memory_capacity)),
    };

    info!(
        target = "realworld::cache",
        kind = settings.kind.as_str(),
        prefix = %settings.prefix,
        ttl_seconds = settings.ttl.as_secs(),
        "user cache enabled"
    );
    let cached: Arc<dyn UsersRepo> = Arc::new(CachedUsersRepo::new(
        store,
        backend,
        settings.prefix.clone(),
        settings.ttl,
    ));
    Ok(cached)
}

//! In-process backend, used when no Redis deployment is available.

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use lru::LruCache;
use tracing::warn;

use crate::domain::entities::UserRecord;

use super::backend::{CacheError, UserCacheBackend};

struct Entry {
    user: UserRecord,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

pub struct MemoryUserCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryUserCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn entries(&self, op: &'static str) -> MutexGuard<'_, LruCache<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!(
                    target = "realworld::cache::memory",
                    op,
                    result = "poisoned_recovered",
                    "Recovered from poisoned user cache lock"
                );
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl UserCacheBackend for MemoryUserCache {
    async fn get(&self, key: &str) -> Result<Option<UserRecord>, CacheError> {
        let now = Instant::now();
        let mut entries = self.entries("get");
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.user.clone())),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, user: &UserRecord, ttl: Duration) -> Result<(), CacheError> {
        let entry = Entry {
            user: user.clone(),
            expires_at: Instant::now() + ttl,
        };
        self.entries("set").put(key.to_string(), entry);
        Ok(())
    }

    async fn set_if_exists(
        &self,
        key: &str,
        user: &UserRecord,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries("set_if_exists");
        if let Some(entry) = entries.get_mut(key)
            && entry.is_live(now)
        {
            entry.user = user.clone();
            entry.expires_at = now + ttl;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    fn user(id: i64, bio: &str) -> UserRecord {
        UserRecord {
            id,
            email: format!("user{id}@example.com"),
            username: format!("user{id}"),
            password_hash: "hash".to_string(),
            bio: bio.to_string(),
            image: String::new(),
            disabled: false,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn cache() -> MemoryUserCache {
        MemoryUserCache::new(NonZeroUsize::new(4).expect("non-zero"))
    }

    #[tokio::test]
    async fn set_then_get_returns_user() {
        let cache = cache();
        cache
            .set("users.1", &user(1, ""), Duration::from_secs(60))
            .await
            .expect("set");
        let found = cache.get("users.1").await.expect("get");
        assert_eq!(found.map(|user| user.id), Some(1));
    }

    #[tokio::test]
    async fn set_if_exists_skips_missing_keys() {
        let cache = cache();
        cache
            .set_if_exists("users.2", &user(2, ""), Duration::from_secs(60))
            .await
            .expect("set");
        assert!(cache.get("users.2").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn set_if_exists_replaces_present_entry() {
        let cache = cache();
        let ttl = Duration::from_secs(60);
        cache.set("users.3", &user(3, "old"), ttl).await.expect("set");
        cache
            .set_if_exists("users.3", &user(3, "new"), ttl)
            .await
            .expect("replace");
        let found = cache.get("users.3").await.expect("get").expect("present");
        assert_eq!(found.bio, "new");
    }

    #[tokio::test]
    async fn expired_entries_are_dropped() {
        let cache = cache();
        cache
            .set("users.4", &user(4, ""), Duration::ZERO)
            .await
            .expect("set");
        assert!(cache.get("users.4").await.expect("get").is_none());
    }
}

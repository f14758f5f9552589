//! Read-through/write-through cache in front of a [`UsersRepo`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use metrics::counter;
use tracing::{debug, warn};

use crate::application::repos::{NewUser, RepoError, UsersRepo};
use crate::domain::entities::{UserId, UserRecord};
use crate::infra::telemetry::{USER_CACHE_HIT, USER_CACHE_MISS, USER_CACHE_SET_ERROR};

use super::backend::{CacheError, UserCacheBackend};
use super::single_flight::SingleFlight;

const SOURCE: &str = "realworld::cache::users";

/// Caches users by id; every other lookup goes straight to the delegate.
pub struct CachedUsersRepo<R> {
    inner: Arc<R>,
    cache: Arc<dyn UserCacheBackend>,
    prefix: String,
    ttl: Duration,
    flights: SingleFlight<UserRecord, RepoError>,
}

impl<R> CachedUsersRepo<R>
where
    R: UsersRepo + 'static,
{
    pub fn new(
        inner: Arc<R>,
        cache: Arc<dyn UserCacheBackend>,
        prefix: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        Self {
            inner,
            cache,
            prefix: prefix.into(),
            ttl,
            flights: SingleFlight::new(),
        }
    }

    fn key(&self, id: UserId) -> String {
        user_key(&self.prefix, id)
    }
}

pub(crate) fn user_key(prefix: &str, id: UserId) -> String {
    format!("{prefix}users.{id}")
}

fn record_set_error(op: &'static str, key: &str, err: &CacheError) {
    counter!(USER_CACHE_SET_ERROR).increment(1);
    warn!(target = SOURCE, op, key, error = %err, "failed to write user cache");
}

#[async_trait]
impl<R> UsersRepo for CachedUsersRepo<R>
where
    R: UsersRepo + 'static,
{
    async fn save(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let saved = self.inner.save(user).await?;
        let key = self.key(saved.id);
        if let Err(err) = self.cache.set(&key, &saved, self.ttl).await {
            record_set_error("save", &key, &err);
        }
        Ok(saved)
    }

    async fn update(&self, user: &UserRecord) -> Result<UserRecord, RepoError> {
        let updated = self.inner.update(user).await?;
        let key = self.key(updated.id);
        if let Err(err) = self.cache.set_if_exists(&key, &updated, self.ttl).await {
            record_set_error("update", &key, &err);
        }
        Ok(updated)
    }

    async fn find_by_id(&self, id: UserId) -> Result<UserRecord, RepoError> {
        let key = self.key(id);
        match self.cache.get(&key).await {
            Ok(Some(user)) => {
                counter!(USER_CACHE_HIT).increment(1);
                return Ok(user);
            }
            Ok(None) => {
                counter!(USER_CACHE_MISS).increment(1);
            }
            Err(err) => {
                counter!(USER_CACHE_MISS).increment(1);
                warn!(target = SOURCE, key = %key, error = %err, "user cache read failed");
            }
        }

        let inner = Arc::clone(&self.inner);
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;
        let fill_key = key.clone();
        self.flights
            .run(&key, move || {
                async move {
                    let user = inner.find_by_id(id).await?;
                    match cache.set(&fill_key, &user, ttl).await {
                        Ok(()) => debug!(target = SOURCE, key = %fill_key, "user cache filled"),
                        Err(err) => record_set_error("find_by_id", &fill_key, &err),
                    }
                    Ok::<_, RepoError>(user)
                }
                .boxed()
            })
            .await
    }

    async fn find_by_email(&self, email: &str) -> Result<UserRecord, RepoError> {
        self.inner.find_by_email(email).await
    }

    async fn find_by_name(&self, username: &str) -> Result<UserRecord, RepoError> {
        self.inner.find_by_name(username).await
    }

    async fn follow(&self, user_id: UserId, follow_id: UserId) -> Result<(), RepoError> {
        self.inner.follow(user_id, follow_id).await
    }

    async fn is_follow(&self, user_id: UserId, follow_id: UserId) -> Result<bool, RepoError> {
        self.inner.is_follow(user_id, follow_id).await
    }

    async fn is_follows(
        &self,
        user_id: UserId,
        follow_ids: &[UserId],
    ) -> Result<HashMap<UserId, bool>, RepoError> {
        self.inner.is_follows(user_id, follow_ids).await
    }

    async fn unfollow(&self, user_id: UserId, follow_id: UserId) -> Result<(), RepoError> {
        self.inner.unfollow(user_id, follow_id).await
    }

    async fn find_follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, RepoError> {
        self.inner.find_follower_ids(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use time::OffsetDateTime;

    use super::*;
    use crate::cache::memory::MemoryUserCache;

    /// Delegate that keeps users in memory and counts `find_by_id` calls.
    #[derive(Default)]
    struct CountingUsersRepo {
        users: Mutex<HashMap<UserId, UserRecord>>,
        next_id: AtomicUsize,
        find_by_id_calls: AtomicUsize,
    }

    impl CountingUsersRepo {
        fn find_calls(&self) -> usize {
            self.find_by_id_calls.load(Ordering::SeqCst)
        }

        fn stored(&self, id: UserId) -> Option<UserRecord> {
            self.users.lock().expect("users lock").get(&id).cloned()
        }
    }

    #[async_trait]
    impl UsersRepo for CountingUsersRepo {
        async fn save(&self, user: NewUser) -> Result<UserRecord, RepoError> {
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
            let record = UserRecord {
                id,
                email: user.email,
                username: user.username,
                password_hash: user.password_hash,
                bio: String::new(),
                image: String::new(),
                disabled: false,
                created_at: OffsetDateTime::UNIX_EPOCH,
                updated_at: OffsetDateTime::UNIX_EPOCH,
            };
            self.users
                .lock()
                .expect("users lock")
                .insert(id, record.clone());
            Ok(record)
        }

        async fn update(&self, user: &UserRecord) -> Result<UserRecord, RepoError> {
            let mut users = self.users.lock().expect("users lock");
            match users.get_mut(&user.id) {
                Some(stored) => {
                    *stored = user.clone();
                    Ok(user.clone())
                }
                None => Err(RepoError::NotFound),
            }
        }

        async fn find_by_id(&self, id: UserId) -> Result<UserRecord, RepoError> {
            self.find_by_id_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.stored(id).ok_or(RepoError::NotFound)
        }

        async fn find_by_email(&self, _email: &str) -> Result<UserRecord, RepoError> {
            Err(RepoError::NotFound)
        }

        async fn find_by_name(&self, _username: &str) -> Result<UserRecord, RepoError> {
            Err(RepoError::NotFound)
        }

        async fn follow(&self, _user_id: UserId, _follow_id: UserId) -> Result<(), RepoError> {
            Ok(())
        }

        async fn is_follow(&self, _user_id: UserId, _follow_id: UserId) -> Result<bool, RepoError> {
            Ok(false)
        }

        async fn is_follows(
            &self,
            _user_id: UserId,
            follow_ids: &[UserId],
        ) -> Result<HashMap<UserId, bool>, RepoError> {
            Ok(follow_ids.iter().map(|id| (*id, false)).collect())
        }

        async fn unfollow(&self, _user_id: UserId, _follow_id: UserId) -> Result<(), RepoError> {
            Err(RepoError::NotFound)
        }

        async fn find_follower_ids(&self, _user_id: UserId) -> Result<Vec<UserId>, RepoError> {
            Ok(Vec::new())
        }
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            email: format!("{name}@example.com"),
            username: name.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn cached(delegate: Arc<CountingUsersRepo>) -> CachedUsersRepo<CountingUsersRepo> {
        let backend = Arc::new(MemoryUserCache::new(NonZeroUsize::new(16).expect("capacity")));
        CachedUsersRepo::new(delegate, backend, "test-", Duration::from_secs(60))
    }

    #[test]
    fn key_joins_prefix_and_id() {
        assert_eq!(user_key("rewalworld-", 42), "rewalworld-users.42");
    }

    #[tokio::test]
    async fn find_after_save_is_served_from_cache() {
        let delegate = Arc::new(CountingUsersRepo::default());
        let repo = cached(delegate.clone());

        let saved = repo.save(new_user("jake")).await.expect("save");
        let found = repo.find_by_id(saved.id).await.expect("find");

        assert_eq!(found, saved);
        assert_eq!(delegate.find_calls(), 0);
    }

    #[tokio::test]
    async fn cold_update_leaves_cache_empty() {
        let delegate = Arc::new(CountingUsersRepo::default());
        let saved = delegate.save(new_user("jane")).await.expect("save");
        let repo = cached(delegate.clone());

        let mut changed = saved.clone();
        changed.bio = "updated".to_string();
        repo.update(&changed).await.expect("update");

        let found = repo.find_by_id(saved.id).await.expect("find");
        assert_eq!(found.bio, "updated");
        assert_eq!(delegate.find_calls(), 1);

        repo.find_by_id(saved.id).await.expect("find again");
        assert_eq!(delegate.find_calls(), 1);
    }

    #[tokio::test]
    async fn warm_update_replaces_cached_user() {
        let delegate = Arc::new(CountingUsersRepo::default());
        let repo = cached(delegate.clone());

        let saved = repo.save(new_user("ann")).await.expect("save");
        let mut changed = saved.clone();
        changed.image = "https://example.com/ann.png".to_string();
        repo.update(&changed).await.expect("update");

        let found = repo.find_by_id(saved.id).await.expect("find");
        assert_eq!(found.image, "https://example.com/ann.png");
        assert_eq!(delegate.find_calls(), 0);
    }

    #[tokio::test]
    async fn concurrent_cold_reads_hit_delegate_once() {
        let delegate = Arc::new(CountingUsersRepo::default());
        let saved = delegate.save(new_user("bob")).await.expect("save");
        let repo = cached(delegate.clone());

        let (first, second, third) = tokio::join!(
            repo.find_by_id(saved.id),
            repo.find_by_id(saved.id),
            repo.find_by_id(saved.id),
        );

        assert_eq!(first.expect("first"), saved);
        assert_eq!(second.expect("second"), saved);
        assert_eq!(third.expect("third"), saved);
        assert_eq!(delegate.find_calls(), 1);
    }

    #[tokio::test]
    async fn missing_user_is_not_cached() {
        let delegate = Arc::new(CountingUsersRepo::default());
        let repo = cached(delegate.clone());

        assert_eq!(repo.find_by_id(99).await, Err(RepoError::NotFound));
        assert_eq!(repo.find_by_id(99).await, Err(RepoError::NotFound));
        assert_eq!(delegate.find_calls(), 2);
    }
}

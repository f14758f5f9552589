use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::repos::{NewUser, RepoError, UsersRepo};
use crate::domain::entities::{UserId, UserRecord};

use super::{PostgresRepositories, map_sqlx_error};

const USER_COLUMNS: &str =
    "id, email, username, password_hash, bio, image, disabled, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    username: String,
    password_hash: String,
    bio: String,
    image: String,
    disabled: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            password_hash: row.password_hash,
            bio: row.bio,
            image: row.image,
            disabled: row.disabled,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl PostgresRepositories {
    /// Lookup by a single column; disabled accounts are reported as missing.
    async fn find_user_where(&self, column: &str, value: &str) -> Result<UserRecord, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1 AND NOT disabled");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(value)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }
}

#[async_trait]
impl UsersRepo for PostgresRepositories {
    async fn save(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "INSERT INTO users (email, username, password_hash) VALUES ($1, $2, $3) \
             RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        debug!(target = "realworld::db::users", user_id = row.id, "user saved");
        Ok(row.into())
    }

    async fn update(&self, user: &UserRecord) -> Result<UserRecord, RepoError> {
        let sql = format!(
            "UPDATE users SET email = $2, username = $3, password_hash = $4, bio = $5, \
             image = $6, disabled = $7, updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.bio)
            .bind(&user.image)
            .bind(user.disabled)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_by_id(&self, id: UserId) -> Result<UserRecord, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND NOT disabled");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_by_email(&self, email: &str) -> Result<UserRecord, RepoError> {
        self.find_user_where("email", email).await
    }

    async fn find_by_name(&self, username: &str) -> Result<UserRecord, RepoError> {
        self.find_user_where("username", username).await
    }

    async fn follow(&self, user_id: UserId, follow_id: UserId) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO follows (user_id, follow_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(follow_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn is_follow(&self, user_id: UserId, follow_id: UserId) -> Result<bool, RepoError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND follow_id = $2)",
        )
        .bind(user_id)
        .bind(follow_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)
    }

    async fn is_follows(
        &self,
        user_id: UserId,
        follow_ids: &[UserId],
    ) -> Result<HashMap<UserId, bool>, RepoError> {
        let mut result: HashMap<UserId, bool> = follow_ids.iter().map(|id| (*id, false)).collect();
        if follow_ids.is_empty() {
            return Ok(result);
        }

        let followed = sqlx::query_scalar::<_, i64>(
            "SELECT follow_id FROM follows WHERE user_id = $1 AND follow_id = ANY($2)",
        )
        .bind(user_id)
        .bind(follow_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        for id in followed {
            result.insert(id, true);
        }
        Ok(result)
    }

    async fn unfollow(&self, user_id: UserId, follow_id: UserId) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND follow_id = $2")
            .bind(user_id)
            .bind(follow_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn find_follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "SELECT follow_id FROM follows WHERE user_id = $1 ORDER BY follow_id",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)
    }
}

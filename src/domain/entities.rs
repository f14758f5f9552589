//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

pub type UserId = i64;
pub type ArticleId = i64;
pub type CommentId = i64;

/// A registered account. `password_hash` is an argon2 PHC string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub bio: String,
    pub image: String,
    pub disabled: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UserRecord {
    /// Public projection of the user; `following` is relative to the current viewer.
    pub fn profile(&self, following: bool) -> ProfileRecord {
        ProfileRecord {
            id: self.id,
            username: self.username.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
            following,
        }
    }
}

/// Author/profile projection. `following` is computed per request and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileRecord {
    pub id: UserId,
    pub username: String,
    pub bio: String,
    pub image: String,
    pub following: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleRecord {
    pub id: ArticleId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author: ProfileRecord,
    pub tags: Vec<String>,
    pub favorited: bool,
    pub favorites_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// One page of articles plus the total number of matches ignoring pagination.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ArticlePage {
    pub articles: Vec<ArticleRecord>,
    pub total: i64,
}

impl ArticlePage {
    pub fn empty() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: CommentId,
    pub article_id: ArticleId,
    pub body: String,
    pub author: ProfileRecord,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
}

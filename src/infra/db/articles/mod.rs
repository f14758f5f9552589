mod filter;
mod read;
mod write;

use time::OffsetDateTime;

use crate::domain::entities::{ArticleRecord, ProfileRecord};

use filter::ArticleFilter;

/// Tags are loaded for at most this many articles per statement.
const TAG_BATCH_SIZE: usize = 50;

const ARTICLE_COLUMNS: &str = "a.id, a.slug, a.title, a.description, a.body, \
     a.created_at, a.updated_at, \
     u.id AS author_id, u.username AS author_username, u.bio AS author_bio, u.image AS author_image";

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: i64,
    slug: String,
    title: String,
    description: String,
    body: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_id: i64,
    author_username: String,
    author_bio: String,
    author_image: String,
}

impl From<ArticleRow> for ArticleRecord {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            slug: row.slug,
            title: row.title,
            description: row.description,
            body: row.body,
            author: ProfileRecord {
                id: row.author_id,
                username: row.author_username,
                bio: row.author_bio,
                image: row.author_image,
                following: false,
            },
            tags: Vec::new(),
            favorited: false,
            favorites_count: 0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::repos::{CommentsRepo, NewComment, RepoError};
use crate::domain::entities::{ArticleId, CommentId, CommentRecord, ProfileRecord, UserId};

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_COLUMNS: &str = "c.id, c.article_id, c.body, c.created_at, c.updated_at, \
     u.id AS author_id, u.username AS author_username, u.bio AS author_bio, u.image AS author_image";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    article_id: i64,
    body: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_id: i64,
    author_username: String,
    author_bio: String,
    author_image: String,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            article_id: row.article_id,
            body: row.body,
            author: ProfileRecord {
                id: row.author_id,
                username: row.author_username,
                bio: row.author_bio,
                image: row.author_image,
                following: false,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn save_comment(&self, comment: NewComment) -> Result<CommentRecord, RepoError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO comments (body, article_id, author_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&comment.body)
        .bind(comment.article_id)
        .bind(comment.author_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM live_comments c \
             INNER JOIN users u ON u.id = c.author_id \
             WHERE c.id = $1"
        );
        let row = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(id)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(row.into())
    }

    async fn find_comments_by_article(
        &self,
        article_id: ArticleId,
    ) -> Result<Vec<CommentRecord>, RepoError> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM live_comments c \
             INNER JOIN users u ON u.id = c.author_id \
             WHERE c.article_id = $1 \
             ORDER BY c.created_at DESC, c.id DESC"
        );
        let rows = sqlx::query_as::<_, CommentRow>(&sql)
            .bind(article_id)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(rows.into_iter().map(CommentRecord::from).collect())
    }

    async fn delete_comment(
        &self,
        author_id: UserId,
        article_id: ArticleId,
        comment_id: CommentId,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE comments SET deleted_at = now() \
             WHERE id = $1 AND article_id = $2 AND author_id = $3 AND deleted_at IS NULL",
        )
        .bind(comment_id)
        .bind(article_id)
        .bind(author_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

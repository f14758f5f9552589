use tracing::{debug, info};

use crate::application::repos::{NewArticle, RepoError, UpdateArticleParams};
use crate::domain::entities::{ArticleId, UserId};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

impl PostgresRepositories {
    /// Create missing tags and the article in one READ COMMITTED transaction.
    pub(super) async fn insert_article(&self, article: NewArticle) -> Result<ArticleId, RepoError> {
        let NewArticle {
            slug,
            title,
            description,
            body,
            author_id,
            tags,
        } = article;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL READ COMMITTED")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        if !tags.is_empty() {
            sqlx::query(
                "INSERT INTO tags (name) SELECT UNNEST($1::text[]) ON CONFLICT (name) DO NOTHING",
            )
            .bind(&tags)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        let article_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO articles (slug, title, description, body, author_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING id",
        )
        .bind(&slug)
        .bind(&title)
        .bind(&description)
        .bind(&body)
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        if !tags.is_empty() {
            sqlx::query(
                "INSERT INTO article_tags (article_id, tag_id, ordinal) \
                 SELECT $1, t.id, submitted.ordinal \
                 FROM UNNEST($2::text[]) WITH ORDINALITY AS submitted(name, ordinal) \
                 INNER JOIN tags t ON t.name = submitted.name",
            )
            .bind(article_id)
            .bind(&tags)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        info!(
            target = "realworld::db::articles",
            article_id,
            author_id,
            slug = %slug,
            tags = tags.len(),
            "article created"
        );
        Ok(article_id)
    }

    /// The author id is part of the predicate, so a foreign author sees `NotFound`.
    pub(super) async fn update_article(&self, params: UpdateArticleParams) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE articles SET slug = $3, title = $4, description = $5, body = $6, \
             updated_at = now() \
             WHERE id = $1 AND author_id = $2 AND deleted_at IS NULL",
        )
        .bind(params.id)
        .bind(params.author_id)
        .bind(&params.slug)
        .bind(&params.title)
        .bind(&params.description)
        .bind(&params.body)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    pub(super) async fn soft_delete_article(
        &self,
        author_id: UserId,
        slug: &str,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE articles SET deleted_at = now() \
             WHERE slug = $1 AND author_id = $2 AND deleted_at IS NULL",
        )
        .bind(slug)
        .bind(author_id)
        .execute(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            debug!(
                target = "realworld::db::articles",
                author_id,
                slug,
                "delete matched no article owned by the caller"
            );
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    pub(super) async fn insert_favorite(
        &self,
        user_id: UserId,
        article_id: ArticleId,
    ) -> Result<(), RepoError> {
        sqlx::query("INSERT INTO article_favorites (user_id, article_id) VALUES ($1, $2)")
            .bind(user_id)
            .bind(article_id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    pub(super) async fn delete_favorite(
        &self,
        user_id: UserId,
        article_id: ArticleId,
    ) -> Result<(), RepoError> {
        let result =
            sqlx::query("DELETE FROM article_favorites WHERE user_id = $1 AND article_id = $2")
                .bind(user_id)
                .bind(article_id)
                .execute(self.pool())
                .await
                .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}

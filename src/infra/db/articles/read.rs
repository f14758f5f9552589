use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::debug;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    ArticleQueryFilter, ArticlesRepo, NewArticle, RepoError, UpdateArticleParams,
};
use crate::domain::entities::{ArticleId, ArticlePage, ArticleRecord, TagRecord, UserId};
use crate::infra::db::{PostgresRepositories, map_sqlx_error};

use super::{ARTICLE_COLUMNS, ArticleFilter, ArticleRow, TAG_BATCH_SIZE};

#[derive(sqlx::FromRow)]
struct ArticleTagRow {
    article_id: i64,
    name: String,
}

#[derive(sqlx::FromRow)]
struct FavoriteCountRow {
    article_id: i64,
    count: i64,
}

#[derive(sqlx::FromRow)]
struct TagRow {
    id: i64,
    name: String,
}

impl PostgresRepositories {
    /// Paged listing: ids first, then rows, tags and favorite state for that page only.
    async fn query_articles(
        &self,
        viewer: Option<UserId>,
        filter: &ArticleFilter,
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError> {
        if page.is_empty() {
            return Ok(ArticlePage::empty());
        }

        let ids: Vec<ArticleId> = filter
            .page_ids_query(page)
            .build_query_scalar()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let total: i64 = filter
            .count_query()
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if ids.is_empty() {
            return Ok(ArticlePage {
                articles: Vec::new(),
                total,
            });
        }

        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM live_articles a \
             INNER JOIN users u ON u.id = a.author_id \
             WHERE a.id = ANY($1) \
             ORDER BY a.created_at DESC, a.id DESC"
        );
        let rows = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(&ids)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        let articles = self.enrich_articles(viewer, rows).await?;
        debug!(
            target = "realworld::db::articles",
            predicates = filter.predicates().len(),
            returned = articles.len(),
            total,
            "articles listed"
        );
        Ok(ArticlePage { articles, total })
    }

    /// Attach tags, favorite counts and the viewer's favorite flag.
    async fn enrich_articles(
        &self,
        viewer: Option<UserId>,
        rows: Vec<ArticleRow>,
    ) -> Result<Vec<ArticleRecord>, RepoError> {
        let mut articles: Vec<ArticleRecord> = rows.into_iter().map(ArticleRecord::from).collect();
        let ids: Vec<ArticleId> = articles.iter().map(|article| article.id).collect();
        if ids.is_empty() {
            return Ok(articles);
        }

        let mut tags = self.load_tags(&ids).await?;
        let counts = self.favorite_counts(&ids).await?;
        let favorited = match viewer {
            Some(user_id) => self.favorited_ids(user_id, &ids).await?,
            None => HashSet::new(),
        };

        for article in &mut articles {
            article.tags = tags.remove(&article.id).unwrap_or_default();
            article.favorites_count = counts.get(&article.id).copied().unwrap_or(0);
            article.favorited = favorited.contains(&article.id);
        }
        Ok(articles)
    }

    async fn load_tags(
        &self,
        ids: &[ArticleId],
    ) -> Result<HashMap<ArticleId, Vec<String>>, RepoError> {
        let mut tags: HashMap<ArticleId, Vec<String>> = HashMap::new();
        for chunk in ids.chunks(TAG_BATCH_SIZE) {
            let rows = sqlx::query_as::<_, ArticleTagRow>(
                "SELECT at.article_id, t.name FROM article_tags at \
                 INNER JOIN tags t ON t.id = at.tag_id \
                 WHERE at.article_id = ANY($1) \
                 ORDER BY at.article_id, at.ordinal",
            )
            .bind(chunk)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

            for row in rows {
                tags.entry(row.article_id).or_default().push(row.name);
            }
        }
        Ok(tags)
    }

    async fn favorite_counts(&self, ids: &[ArticleId]) -> Result<HashMap<ArticleId, i64>, RepoError> {
        let rows = sqlx::query_as::<_, FavoriteCountRow>(
            "SELECT article_id, COUNT(*) AS count FROM article_favorites \
             WHERE article_id = ANY($1) GROUP BY article_id",
        )
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(|row| (row.article_id, row.count)).collect())
    }

    async fn favorited_ids(
        &self,
        user_id: UserId,
        ids: &[ArticleId],
    ) -> Result<HashSet<ArticleId>, RepoError> {
        let rows = sqlx::query_scalar::<_, i64>(
            "SELECT article_id FROM article_favorites WHERE user_id = $1 AND article_id = ANY($2)",
        )
        .bind(user_id)
        .bind(ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().collect())
    }
}

#[async_trait]
impl ArticlesRepo for PostgresRepositories {
    async fn save(&self, article: NewArticle) -> Result<ArticleId, RepoError> {
        self.insert_article(article).await
    }

    async fn update(&self, params: UpdateArticleParams) -> Result<(), RepoError> {
        self.update_article(params).await
    }

    async fn find_by_slug(
        &self,
        viewer: Option<UserId>,
        slug: &str,
    ) -> Result<ArticleRecord, RepoError> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM live_articles a \
             INNER JOIN users u ON u.id = a.author_id \
             WHERE a.slug = $1"
        );
        let row = sqlx::query_as::<_, ArticleRow>(&sql)
            .bind(slug)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        self.enrich_articles(viewer, vec![row])
            .await?
            .pop()
            .ok_or(RepoError::NotFound)
    }

    async fn delete_by_slug(&self, author_id: UserId, slug: &str) -> Result<(), RepoError> {
        self.soft_delete_article(author_id, slug).await
    }

    async fn favorite(&self, user_id: UserId, article_id: ArticleId) -> Result<(), RepoError> {
        self.insert_favorite(user_id, article_id).await
    }

    async fn unfavorite(&self, user_id: UserId, article_id: ArticleId) -> Result<(), RepoError> {
        self.delete_favorite(user_id, article_id).await
    }

    async fn find_tags(&self) -> Result<Vec<TagRecord>, RepoError> {
        let rows = sqlx::query_as::<_, TagRow>("SELECT id, name FROM tags ORDER BY id")
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Ok(rows
            .into_iter()
            .map(|row| TagRecord {
                id: row.id,
                name: row.name,
            })
            .collect())
    }

    async fn find_articles(
        &self,
        viewer: Option<UserId>,
        filter: &ArticleQueryFilter,
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError> {
        self.query_articles(viewer, &ArticleFilter::from_query(filter), page)
            .await
    }

    async fn find_articles_by_authors(
        &self,
        viewer: Option<UserId>,
        author_ids: &[UserId],
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError> {
        if author_ids.is_empty() {
            return Ok(ArticlePage::empty());
        }
        self.query_articles(viewer, &ArticleFilter::by_authors(author_ids), page)
            .await
    }
}

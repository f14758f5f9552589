//! Article, feed, favorite and tag use cases.

use std::collections::HashSet;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    ArticleQueryFilter, ArticlesRepo, NewArticle, RepoError, UpdateArticleParams, UsersRepo,
};
use crate::application::users::apply_following;
use crate::domain::entities::{ArticlePage, ArticleRecord, UserId};
use crate::domain::slug::{SlugError, derive_slug};

#[derive(Debug, Error)]
pub enum ArticleServiceError {
    #[error("article({0}) not found")]
    NotFound(String),
    #[error("duplicate title")]
    DuplicateTitle,
    #[error("already favorited article({0})")]
    AlreadyFavorited(String),
    #[error("not favorited article({0})")]
    NotFavorited(String),
    #[error("Title validation error. reason: {0}")]
    InvalidTitle(#[from] SlugError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateArticleCommand {
    pub title: String,
    pub description: String,
    pub body: String,
    pub tags: Vec<String>,
}

/// Partial update; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateArticleCommand {
    pub title: Option<String>,
    pub description: Option<String>,
    pub body: Option<String>,
}

#[derive(Clone)]
pub struct ArticleService {
    articles: Arc<dyn ArticlesRepo>,
    users: Arc<dyn UsersRepo>,
}

impl ArticleService {
    pub fn new(articles: Arc<dyn ArticlesRepo>, users: Arc<dyn UsersRepo>) -> Self {
        Self { articles, users }
    }

    pub async fn list(
        &self,
        viewer: Option<UserId>,
        filter: &ArticleQueryFilter,
        page: PageRequest,
    ) -> Result<ArticlePage, ArticleServiceError> {
        let mut result = self.articles.find_articles(viewer, filter, page).await?;

        if let Some(viewer) = viewer {
            apply_following(
                &*self.users,
                viewer,
                result.articles.iter_mut().map(|article| &mut article.author),
            )
            .await?;
        }

        Ok(result)
    }

    /// Articles written by the users `viewer` follows.
    pub async fn feed(
        &self,
        viewer: UserId,
        page: PageRequest,
    ) -> Result<ArticlePage, ArticleServiceError> {
        let followed = self.users.find_follower_ids(viewer).await?;
        if followed.is_empty() {
            debug!(
                target = "realworld::application::articles",
                user_id = viewer,
                "feed requested by user following nobody"
            );
            return Ok(ArticlePage::empty());
        }

        let mut result = self
            .articles
            .find_articles_by_authors(Some(viewer), &followed, page)
            .await?;

        // Every author in the page was selected from the followed set, so the
        // relation is not re-checked here. Revisit if the author query changes.
        for article in &mut result.articles {
            article.author.following = true;
        }

        Ok(result)
    }

    pub async fn get(
        &self,
        viewer: Option<UserId>,
        slug: &str,
    ) -> Result<ArticleRecord, ArticleServiceError> {
        let mut article = self.find_by_slug(viewer, slug).await?;
        if let Some(viewer) = viewer {
            apply_following(&*self.users, viewer, [&mut article.author]).await?;
        }
        Ok(article)
    }

    pub async fn create(
        &self,
        author_id: UserId,
        command: CreateArticleCommand,
    ) -> Result<ArticleRecord, ArticleServiceError> {
        let slug = derive_slug(&command.title)?;

        self.articles
            .save(NewArticle {
                slug: slug.clone(),
                title: command.title,
                description: command.description,
                body: command.body,
                author_id,
                tags: normalize_tags(command.tags),
            })
            .await
            .map_err(duplicate_title)?;

        self.find_by_slug(Some(author_id), &slug).await
    }

    /// Only the author may update; anyone else gets `NotFound` from the ownership predicate.
    pub async fn update(
        &self,
        author_id: UserId,
        slug: &str,
        command: UpdateArticleCommand,
    ) -> Result<ArticleRecord, ArticleServiceError> {
        let current = self.find_by_slug(Some(author_id), slug).await?;

        let (title, new_slug) = match command.title {
            Some(title) if title != current.title => {
                let derived = derive_slug(&title)?;
                (title, derived)
            }
            _ => (current.title.clone(), current.slug.clone()),
        };

        self.articles
            .update(UpdateArticleParams {
                id: current.id,
                author_id,
                slug: new_slug.clone(),
                title,
                description: command.description.unwrap_or(current.description),
                body: command.body.unwrap_or(current.body),
            })
            .await
            .map_err(|err| match err {
                RepoError::NotFound => ArticleServiceError::NotFound(slug.to_string()),
                other => duplicate_title(other),
            })?;

        self.find_by_slug(Some(author_id), &new_slug).await
    }

    pub async fn delete(&self, author_id: UserId, slug: &str) -> Result<(), ArticleServiceError> {
        self.articles
            .delete_by_slug(author_id, slug)
            .await
            .map_err(|err| not_found_as(err, slug))
    }

    pub async fn favorite(
        &self,
        user_id: UserId,
        slug: &str,
    ) -> Result<ArticleRecord, ArticleServiceError> {
        let article = self.find_by_slug(Some(user_id), slug).await?;
        self.articles
            .favorite(user_id, article.id)
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { .. } => {
                    ArticleServiceError::AlreadyFavorited(slug.to_string())
                }
                RepoError::ForeignKey { .. } => ArticleServiceError::NotFound(slug.to_string()),
                other => other.into(),
            })?;
        self.get(Some(user_id), slug).await
    }

    pub async fn unfavorite(
        &self,
        user_id: UserId,
        slug: &str,
    ) -> Result<ArticleRecord, ArticleServiceError> {
        let article = self.find_by_slug(Some(user_id), slug).await?;
        self.articles
            .unfavorite(user_id, article.id)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => ArticleServiceError::NotFavorited(slug.to_string()),
                other => other.into(),
            })?;
        self.get(Some(user_id), slug).await
    }

    pub async fn tags(&self) -> Result<Vec<String>, ArticleServiceError> {
        let tags = self.articles.find_tags().await?;
        Ok(tags.into_iter().map(|tag| tag.name).collect())
    }

    async fn find_by_slug(
        &self,
        viewer: Option<UserId>,
        slug: &str,
    ) -> Result<ArticleRecord, ArticleServiceError> {
        self.articles
            .find_by_slug(viewer, slug)
            .await
            .map_err(|err| not_found_as(err, slug))
    }
}

/// Trim, drop blanks and de-duplicate while keeping first-seen order.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .filter(|tag| seen.insert(tag.clone()))
        .collect()
}

fn not_found_as(err: RepoError, slug: &str) -> ArticleServiceError {
    match err {
        RepoError::NotFound => ArticleServiceError::NotFound(slug.to_string()),
        other => other.into(),
    }
}

fn duplicate_title(err: RepoError) -> ArticleServiceError {
    match err {
        RepoError::Duplicate { .. } => ArticleServiceError::DuplicateTitle,
        other => other.into(),
    }
}

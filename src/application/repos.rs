//! Repository traits describing persistence adapters.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::PageRequest;
use crate::domain::entities::{
    ArticleId, ArticlePage, ArticleRecord, CommentId, CommentRecord, TagRecord, UserId, UserRecord,
};

/// Stable error kinds surfaced by every store. Callers branch on these only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("foreign key constraint `{constraint}` violated")]
    ForeignKey { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn save(&self, user: NewUser) -> Result<UserRecord, RepoError>;

    /// Persist every mutable field of `user`; returns the stored row.
    async fn update(&self, user: &UserRecord) -> Result<UserRecord, RepoError>;

    async fn find_by_id(&self, id: UserId) -> Result<UserRecord, RepoError>;

    async fn find_by_email(&self, email: &str) -> Result<UserRecord, RepoError>;

    async fn find_by_name(&self, username: &str) -> Result<UserRecord, RepoError>;

    /// `user_id` starts following `follow_id`.
    async fn follow(&self, user_id: UserId, follow_id: UserId) -> Result<(), RepoError>;

    async fn is_follow(&self, user_id: UserId, follow_id: UserId) -> Result<bool, RepoError>;

    /// Follow state for every id in `follow_ids`; ids not followed map to `false`.
    async fn is_follows(
        &self,
        user_id: UserId,
        follow_ids: &[UserId],
    ) -> Result<HashMap<UserId, bool>, RepoError>;

    async fn unfollow(&self, user_id: UserId, follow_id: UserId) -> Result<(), RepoError>;

    /// Ids of the users that `user_id` follows.
    async fn find_follower_ids(&self, user_id: UserId) -> Result<Vec<UserId>, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
    pub author_id: UserId,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UpdateArticleParams {
    pub id: ArticleId,
    pub author_id: UserId,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub body: String,
}

/// Optional list filters; an absent field contributes no predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQueryFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited_by: Option<String>,
}

#[async_trait]
pub trait ArticlesRepo: Send + Sync {
    async fn save(&self, article: NewArticle) -> Result<ArticleId, RepoError>;

    async fn update(&self, params: UpdateArticleParams) -> Result<(), RepoError>;

    async fn find_by_slug(
        &self,
        viewer: Option<UserId>,
        slug: &str,
    ) -> Result<ArticleRecord, RepoError>;

    async fn delete_by_slug(&self, author_id: UserId, slug: &str) -> Result<(), RepoError>;

    async fn favorite(&self, user_id: UserId, article_id: ArticleId) -> Result<(), RepoError>;

    async fn unfavorite(&self, user_id: UserId, article_id: ArticleId) -> Result<(), RepoError>;

    async fn find_tags(&self) -> Result<Vec<TagRecord>, RepoError>;

    async fn find_articles(
        &self,
        viewer: Option<UserId>,
        filter: &ArticleQueryFilter,
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError>;

    async fn find_articles_by_authors(
        &self,
        viewer: Option<UserId>,
        author_ids: &[UserId],
        page: PageRequest,
    ) -> Result<ArticlePage, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: ArticleId,
    pub author_id: UserId,
    pub body: String,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn save_comment(&self, comment: NewComment) -> Result<CommentRecord, RepoError>;

    /// Live comments of an article, newest first.
    async fn find_comments_by_article(
        &self,
        article_id: ArticleId,
    ) -> Result<Vec<CommentRecord>, RepoError>;

    async fn delete_comment(
        &self,
        author_id: UserId,
        article_id: ArticleId,
        comment_id: CommentId,
    ) -> Result<(), RepoError>;
}

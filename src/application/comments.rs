use std::sync::Arc;

use thiserror::Error;

use crate::application::repos::{ArticlesRepo, CommentsRepo, NewComment, RepoError, UsersRepo};
use crate::application::users::apply_following;
use crate::domain::entities::{ArticleRecord, CommentId, CommentRecord, UserId};

#[derive(Debug, Error)]
pub enum CommentServiceError {
    #[error("article({0}) not found")]
    ArticleNotFound(String),
    #[error("comment({0}) not found")]
    NotFound(CommentId),
    #[error("Article validation error. reason: article does not exist")]
    MissingArticle,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct CommentService {
    comments: Arc<dyn CommentsRepo>,
    articles: Arc<dyn ArticlesRepo>,
    users: Arc<dyn UsersRepo>,
}

impl CommentService {
    pub fn new(
        comments: Arc<dyn CommentsRepo>,
        articles: Arc<dyn ArticlesRepo>,
        users: Arc<dyn UsersRepo>,
    ) -> Self {
        Self {
            comments,
            articles,
            users,
        }
    }

    pub async fn list(
        &self,
        viewer: Option<UserId>,
        slug: &str,
    ) -> Result<Vec<CommentRecord>, CommentServiceError> {
        let article = self.article(viewer, slug).await?;
        let mut comments = self.comments.find_comments_by_article(article.id).await?;

        if let Some(viewer) = viewer {
            apply_following(
                &*self.users,
                viewer,
                comments.iter_mut().map(|comment| &mut comment.author),
            )
            .await?;
        }

        Ok(comments)
    }

    pub async fn create(
        &self,
        author_id: UserId,
        slug: &str,
        body: String,
    ) -> Result<CommentRecord, CommentServiceError> {
        let article = self.article(Some(author_id), slug).await?;
        self.comments
            .save_comment(NewComment {
                article_id: article.id,
                author_id,
                body,
            })
            .await
            .map_err(|err| match err {
                RepoError::ForeignKey { .. } => CommentServiceError::MissingArticle,
                other => other.into(),
            })
    }

    /// Only the comment's author may delete it; other callers see `NotFound`.
    pub async fn delete(
        &self,
        author_id: UserId,
        slug: &str,
        comment_id: CommentId,
    ) -> Result<(), CommentServiceError> {
        let article = self.article(Some(author_id), slug).await?;
        self.comments
            .delete_comment(author_id, article.id, comment_id)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => CommentServiceError::NotFound(comment_id),
                other => other.into(),
            })
    }

    async fn article(
        &self,
        viewer: Option<UserId>,
        slug: &str,
    ) -> Result<ArticleRecord, CommentServiceError> {
        self.articles
            .find_by_slug(viewer, slug)
            .await
            .map_err(|err| match err {
                RepoError::NotFound => CommentServiceError::ArticleNotFound(slug.to_string()),
                other => other.into(),
            })
    }
}

use std::error::Error as StdError;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::articles::ArticleServiceError;
use crate::application::comments::CommentServiceError;
use crate::application::error::ErrorReport;
use crate::application::pagination::PaginationError;
use crate::application::repos::RepoError;
use crate::application::users::UserServiceError;

/// `{"errors":{"body":"<message>"}}`
#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub errors: ApiErrorMessage,
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub body: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    report: ErrorReport,
}

impl ApiError {
    pub fn new(source: &'static str, status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status,
            report: ErrorReport::from_message(source, status, message.clone()),
            message,
        }
    }

    /// Keep the full cause chain for the response logger; the body carries the top message.
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        Self {
            status,
            message: error.to_string(),
            report: ErrorReport::from_error(source, status, error),
        }
    }

    pub fn unauthorized() -> Self {
        Self::new("infra::http::api::auth", StatusCode::UNAUTHORIZED, "auth required")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("infra::http::api", StatusCode::NOT_FOUND, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new("infra::http::api", StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    /// `<Field> validation error. reason: <rule>`
    pub fn validation(field: &str, rule: &str) -> Self {
        Self::unprocessable(format!("{field} validation error. reason: {rule}"))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            errors: ApiErrorMessage { body: self.message },
        };
        let mut response = (self.status, Json(body)).into_response();
        self.report.attach(&mut response);
        response
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            "infra::http::api::bind",
            StatusCode::UNPROCESSABLE_ENTITY,
            rejection.body_text(),
        )
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(
            "infra::http::api::bind",
            StatusCode::UNPROCESSABLE_ENTITY,
            rejection.body_text(),
        )
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(
            "infra::http::api::bind",
            StatusCode::UNPROCESSABLE_ENTITY,
            rejection.body_text(),
        )
    }
}

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    const SOURCE: &str = "infra::http::api::repo";
    match err {
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::Duplicate { .. } | RepoError::ForeignKey { .. } => {
            ApiError::from_error(SOURCE, StatusCode::UNPROCESSABLE_ENTITY, &err)
        }
        RepoError::Timeout => ApiError::from_error(SOURCE, StatusCode::SERVICE_UNAVAILABLE, &err),
        RepoError::Persistence(_) => {
            ApiError::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, &err)
        }
    }
}

pub(crate) fn pagination_to_api(err: PaginationError) -> ApiError {
    ApiError::unprocessable(err.to_string())
}

pub(crate) fn users_to_api(err: UserServiceError) -> ApiError {
    const SOURCE: &str = "infra::http::api::users";
    match err {
        UserServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
        UserServiceError::DuplicateEmail(_)
        | UserServiceError::DuplicateUsername(_)
        | UserServiceError::PasswordMismatch
        | UserServiceError::AlreadyFollowing(_)
        | UserServiceError::NotFollowing(_) => ApiError::unprocessable(err.to_string()),
        UserServiceError::Password(_) | UserServiceError::Token(_) => {
            ApiError::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, &err)
        }
        UserServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn articles_to_api(err: ArticleServiceError) -> ApiError {
    match err {
        ArticleServiceError::NotFound(_) => ApiError::not_found(err.to_string()),
        ArticleServiceError::DuplicateTitle
        | ArticleServiceError::AlreadyFavorited(_)
        | ArticleServiceError::NotFavorited(_)
        | ArticleServiceError::InvalidTitle(_) => ApiError::unprocessable(err.to_string()),
        ArticleServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn comments_to_api(err: CommentServiceError) -> ApiError {
    match err {
        CommentServiceError::ArticleNotFound(_) | CommentServiceError::NotFound(_) => {
            ApiError::not_found(err.to_string())
        }
        CommentServiceError::MissingArticle => ApiError::unprocessable(err.to_string()),
        CommentServiceError::Repo(repo) => repo_to_api(repo),
    }
}

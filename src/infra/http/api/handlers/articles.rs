//! Article handlers: listing, feed, CRUD and favorites.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Extension, Path, Query, State};

use crate::application::auth::AuthPrincipal;
use crate::application::pagination::PageRequest;
use crate::application::repos::ArticleQueryFilter;
use crate::infra::http::api::error::{ApiError, articles_to_api, pagination_to_api};
use crate::infra::http::api::models::{
    ArticleListQuery, ArticleResponse, ArticlesResponse, CreateArticleRequest, FeedQuery,
    StatusResponse, UpdateArticleRequest,
};
use crate::infra::http::api::state::ApiState;

use super::viewer;

pub async fn list_articles(
    State(state): State<ApiState>,
    principal: Option<Extension<AuthPrincipal>>,
    query: Result<Query<ArticleListQuery>, QueryRejection>,
) -> Result<Json<ArticlesResponse>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::from_query(query.limit, query.offset).map_err(pagination_to_api)?;

    let filter = ArticleQueryFilter {
        tag: query.tag,
        author: query.author,
        favorited_by: query.favorited,
    };

    let articles = state
        .articles
        .list(viewer(principal), &filter, page)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(articles.into()))
}

pub async fn feed_articles(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<ArticlesResponse>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::from_query(query.limit, query.offset).map_err(pagination_to_api)?;

    let articles = state
        .articles
        .feed(principal.user_id, page)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(articles.into()))
}

pub async fn get_article(
    State(state): State<ApiState>,
    principal: Option<Extension<AuthPrincipal>>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .articles
        .get(viewer(principal), &slug)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(article.into()))
}

pub async fn create_article(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    payload: Result<Json<CreateArticleRequest>, JsonRejection>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let Json(request) = payload?;
    let command = request.into_command()?;

    let article = state
        .articles
        .create(principal.user_id, command)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(article.into()))
}

pub async fn update_article(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(slug): Path<String>,
    payload: Result<Json<UpdateArticleRequest>, JsonRejection>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let Json(request) = payload?;
    let command = request.into_command()?;

    let article = state
        .articles
        .update(principal.user_id, &slug, command)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(article.into()))
}

pub async fn delete_article(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(slug): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state
        .articles
        .delete(principal.user_id, &slug)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(StatusResponse::deleted()))
}

pub async fn favorite_article(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .articles
        .favorite(principal.user_id, &slug)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(article.into()))
}

pub async fn unfavorite_article(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(slug): Path<String>,
) -> Result<Json<ArticleResponse>, ApiError> {
    let article = state
        .articles
        .unfavorite(principal.user_id, &slug)
        .await
        .map_err(articles_to_api)?;
    Ok(Json(article.into()))
}

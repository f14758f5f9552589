use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};

use crate::application::auth::AuthPrincipal;
use crate::domain::entities::CommentId;
use crate::infra::http::api::error::{ApiError, comments_to_api};
use crate::infra::http::api::models::{
    CommentBody, CommentResponse, CommentsResponse, CreateCommentRequest, StatusResponse,
};
use crate::infra::http::api::state::ApiState;

use super::viewer;

pub async fn list_comments(
    State(state): State<ApiState>,
    principal: Option<Extension<AuthPrincipal>>,
    Path(slug): Path<String>,
) -> Result<Json<CommentsResponse>, ApiError> {
    let comments = state
        .comments
        .list(viewer(principal), &slug)
        .await
        .map_err(comments_to_api)?;
    Ok(Json(CommentsResponse {
        comments: comments.into_iter().map(CommentBody::from).collect(),
    }))
}

pub async fn create_comment(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(slug): Path<String>,
    payload: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<Json<CommentResponse>, ApiError> {
    let Json(request) = payload?;
    let body = request.into_body()?;

    let comment = state
        .comments
        .create(principal.user_id, &slug, body)
        .await
        .map_err(comments_to_api)?;
    Ok(Json(CommentResponse {
        comment: comment.into(),
    }))
}

pub async fn delete_comment(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path((slug, id)): Path<(String, String)>,
) -> Result<Json<StatusResponse>, ApiError> {
    let comment_id = parse_comment_id(&id)?;

    state
        .comments
        .delete(principal.user_id, &slug, comment_id)
        .await
        .map_err(comments_to_api)?;
    Ok(Json(StatusResponse::deleted()))
}

/// Ids are unsigned on the wire and stored as BIGSERIAL.
fn parse_comment_id(raw: &str) -> Result<CommentId, ApiError> {
    raw.parse::<u64>()
        .ok()
        .and_then(|id| CommentId::try_from(id).ok())
        .ok_or_else(|| ApiError::validation("id", "uint"))
}

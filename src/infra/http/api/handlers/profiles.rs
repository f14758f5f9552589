use axum::Json;
use axum::extract::{Extension, Path, State};

use crate::application::auth::AuthPrincipal;
use crate::infra::http::api::error::{ApiError, users_to_api};
use crate::infra::http::api::models::ProfileResponse;
use crate::infra::http::api::state::ApiState;

use super::viewer;

pub async fn get_profile(
    State(state): State<ApiState>,
    principal: Option<Extension<AuthPrincipal>>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .users
        .profile(viewer(principal), &username)
        .await
        .map_err(users_to_api)?;
    Ok(Json(profile.into()))
}

pub async fn follow_user(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .users
        .follow(principal.user_id, &username)
        .await
        .map_err(users_to_api)?;
    Ok(Json(profile.into()))
}

pub async fn unfollow_user(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    Path(username): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = state
        .users
        .unfollow(principal.user_id, &username)
        .await
        .map_err(users_to_api)?;
    Ok(Json(profile.into()))
}

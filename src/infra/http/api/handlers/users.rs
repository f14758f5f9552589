//! Registration, login and the current user.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};

use crate::application::auth::AuthPrincipal;
use crate::infra::http::api::error::{ApiError, users_to_api};
use crate::infra::http::api::models::{
    SignInRequest, SignUpRequest, UpdateUserRequest, UserResponse,
};
use crate::infra::http::api::state::ApiState;

pub async fn sign_up(
    State(state): State<ApiState>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    let command = request.into_command()?;

    let session = state.users.sign_up(command).await.map_err(users_to_api)?;
    Ok(Json(session.into()))
}

pub async fn sign_in(
    State(state): State<ApiState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    let credentials = request.into_credentials()?;

    let session = state
        .users
        .sign_in(&credentials.email, &credentials.password)
        .await
        .map_err(users_to_api)?;
    Ok(Json(session.into()))
}

pub async fn current_user(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
) -> Result<Json<UserResponse>, ApiError> {
    let session = state
        .users
        .current(principal.user_id)
        .await
        .map_err(users_to_api)?;
    Ok(Json(session.into()))
}

pub async fn update_user(
    State(state): State<ApiState>,
    Extension(principal): Extension<AuthPrincipal>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, ApiError> {
    let Json(request) = payload?;
    let command = request.into_command()?;

    let session = state
        .users
        .update(principal.user_id, command)
        .await
        .map_err(users_to_api)?;
    Ok(Json(session.into()))
}

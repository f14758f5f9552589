use axum::Json;
use axum::extract::State;

use crate::infra::http::api::error::{ApiError, articles_to_api};
use crate::infra::http::api::models::TagsResponse;
use crate::infra::http::api::state::ApiState;

pub async fn list_tags(State(state): State<ApiState>) -> Result<Json<TagsResponse>, ApiError> {
    let tags = state.articles.tags().await.map_err(articles_to_api)?;
    Ok(Json(TagsResponse { tags }))
}

//! Unauthenticated operational routes: health and the optional API docs page.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

use crate::application::error::ErrorReport;
use crate::infra::db::PostgresRepositories;

use super::{RouterState, db_health_response};

#[derive(Clone)]
pub struct HttpState {
    pub db: Arc<PostgresRepositories>,
    /// Static page served at `/docs`; `None` leaves the route unregistered.
    pub docs: Option<PathBuf>,
}

pub fn build_public_router(state: RouterState) -> Router<RouterState> {
    let mut router = Router::new().route("/health", get(health));
    if state.http.docs.is_some() {
        router = router.route("/docs", get(docs));
    }
    router.with_state(state)
}

async fn health(State(state): State<HttpState>) -> Response {
    db_health_response(state.db.health_check().await)
}

async fn docs(State(state): State<HttpState>) -> Response {
    let Some(path) = state.docs.as_ref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(path).first_or(mime_guess::mime::TEXT_HTML);
            let mut response = bytes.into_response();
            if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            response
        }
        Err(err) if err.kind() == ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            error!(
                target = "realworld::http::docs",
                path = %path.display(),
                error = %err,
                "failed to read docs page"
            );
            let mut response = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            ErrorReport::from_error(
                "infra::http::docs",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

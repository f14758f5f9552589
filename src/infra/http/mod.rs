pub mod api;
mod middleware;
mod public;

pub use api::{ApiState, build_api_router};
pub use middleware::{REQUEST_ID_HEADER, RequestContext};
pub use public::{HttpState, build_public_router};

use axum::Router;
use axum::extract::FromRef;
use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::response::{IntoResponse, Response};
use sqlx::Error as SqlxError;

use crate::application::error::ErrorReport;
use crate::config::ServerSettings;

fn db_health_response(result: Result<(), SqlxError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::db_health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub http: HttpState,
    pub api: ApiState,
}

impl FromRef<RouterState> for HttpState {
    fn from_ref(state: &RouterState) -> Self {
        state.http.clone()
    }
}

impl FromRef<RouterState> for ApiState {
    fn from_ref(state: &RouterState) -> Self {
        state.api.clone()
    }
}

/// Full application router with the shared middleware stack applied.
///
/// Layers run outermost first: request context, panic recovery, response logging,
/// then the per-request deadline.
pub fn build_router(state: RouterState, server: &ServerSettings) -> Router {
    build_public_router(state.clone())
        .merge(build_api_router(state.clone()))
        .with_state(state)
        .layer(axum_middleware::from_fn_with_state(
            server.request_timeout,
            middleware::enforce_deadline,
        ))
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::recover_panics))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

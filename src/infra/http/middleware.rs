use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use futures::FutureExt;
use metrics::counter;
use tracing::{Instrument, error, info_span, warn};
use uuid::Uuid;

use crate::application::auth::AuthPrincipal;
use crate::application::error::ErrorReport;
use crate::infra::telemetry::{HTTP_DEADLINE_EXCEEDED, HTTP_PANICS};

use super::api::error::ApiError;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Tags the request with an id, echoes it in `x-request-id` and opens a span for it.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

/// Turns a panicking handler into a 500 instead of dropping the connection.
pub async fn recover_panics(request: Request<Body>, next: Next) -> Response {
    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => response,
        Err(panic) => {
            let detail = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string());
            counter!(HTTP_PANICS).increment(1);
            error!(target = "realworld::http::recover", detail = %detail, "handler panicked");
            ApiError::new(
                "infra::http::recover",
                StatusCode::INTERNAL_SERVER_ERROR,
                detail,
            )
            .into_response()
        }
    }
}

/// Fails requests that outlive the configured deadline with 503.
pub async fn enforce_deadline(
    State(timeout): State<Duration>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match tokio::time::timeout(timeout, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            counter!(HTTP_DEADLINE_EXCEEDED).increment(1);
            ApiError::new(
                "infra::http::deadline",
                StatusCode::SERVICE_UNAVAILABLE,
                "request timed out",
            )
            .into_response()
        }
    }
}

/// Access log for failed requests: warn for 4xx, error for 5xx.
///
/// Runs inside the request span, so `request_id` is attached by the subscriber.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let mut response = next.run(request).await;
    let status = response.status();
    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let elapsed_ms = started.elapsed().as_millis();
    let user_id = response
        .extensions()
        .get::<AuthPrincipal>()
        .map(|principal| principal.user_id);
    let report = response
        .extensions_mut()
        .remove::<ErrorReport>()
        .unwrap_or_else(|| ErrorReport::from_message("unknown", status, String::new()));

    if status.is_server_error() {
        error!(
            target = "realworld::http::response",
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            user_id,
            source = report.source,
            detail = report.detail(),
            chain = ?report.chain,
            "request failed",
        );
    } else {
        warn!(
            target = "realworld::http::response",
            status = status.as_u16(),
            %method,
            %path,
            elapsed_ms,
            user_id,
            source = report.source,
            detail = report.detail(),
            "client request error",
        );
    }

    response
}

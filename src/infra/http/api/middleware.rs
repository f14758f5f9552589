use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, Request, header::AUTHORIZATION};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::application::auth::{AuthError, AuthPrincipal, TokenService};

use super::error::ApiError;
use super::state::ApiState;

const SOURCE: &str = "realworld::api::auth";

/// Rejects the request with 401 unless it carries a valid `Token` header.
pub async fn require_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers().get(AUTHORIZATION)) {
        Ok(principal) => {
            request.extensions_mut().insert(principal);
            with_principal(next.run(request).await, principal)
        }
        Err(err) => {
            debug!(target = SOURCE, error = %err, "rejected unauthenticated request");
            ApiError::unauthorized().into_response()
        }
    }
}

/// Attaches the principal when a token is present. A missing header continues
/// anonymously; a present but invalid token is still rejected.
pub async fn optional_auth(
    State(state): State<ApiState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let principal = match authenticate(&state, request.headers().get(AUTHORIZATION)) {
        Ok(principal) => Some(principal),
        Err(AuthError::Missing) => None,
        Err(err) => {
            debug!(target = SOURCE, error = %err, "rejected invalid token");
            return ApiError::unauthorized().into_response();
        }
    };

    match principal {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            with_principal(next.run(request).await, principal)
        }
        None => next.run(request).await,
    }
}

/// Copy the principal onto the response so outer layers can log who made the call.
fn with_principal(mut response: Response, principal: AuthPrincipal) -> Response {
    response.extensions_mut().insert(principal);
    response
}

fn authenticate(
    state: &ApiState,
    header: Option<&HeaderValue>,
) -> Result<AuthPrincipal, AuthError> {
    let token = extract_token(header)?;
    state.tokens.verify(token)
}

fn extract_token(header: Option<&HeaderValue>) -> Result<&str, AuthError> {
    let raw = header.ok_or(AuthError::Missing)?;
    let raw = raw.to_str().map_err(|_| AuthError::Invalid)?;
    TokenService::strip_scheme(raw).ok_or(AuthError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_scheme_is_required() {
        let header = HeaderValue::from_static("Bearer abc");
        assert_eq!(extract_token(Some(&header)), Err(AuthError::Invalid));

        let header = HeaderValue::from_static("Token abc");
        assert_eq!(extract_token(Some(&header)), Ok("abc"));

        assert_eq!(extract_token(None), Err(AuthError::Missing));
    }
}

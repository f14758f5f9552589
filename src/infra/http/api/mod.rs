pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod state;

pub use state::ApiState;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post, put},
};

use crate::infra::http::RouterState;

/// Routes under `/api`. Authentication is enforced per group: `optional` routes accept
/// anonymous callers, `protected` routes reject them with 401.
pub fn build_api_router(state: RouterState) -> Router<RouterState> {
    let api_state = state.api.clone();

    let public = Router::new()
        .route("/api/users", post(handlers::sign_up))
        .route("/api/users/login", post(handlers::sign_in))
        .route("/api/tags", get(handlers::list_tags));

    let optional = Router::new()
        .route("/api/profiles/{username}", get(handlers::get_profile))
        .route("/api/articles", get(handlers::list_articles))
        .route("/api/articles/{slug}", get(handlers::get_article))
        .route("/api/articles/{slug}/comments", get(handlers::list_comments))
        .layer(axum_middleware::from_fn_with_state(
            api_state.clone(),
            middleware::optional_auth,
        ));

    let protected = Router::new()
        .route(
            "/api/user",
            get(handlers::current_user).put(handlers::update_user),
        )
        .route(
            "/api/profiles/{username}/follow",
            post(handlers::follow_user).delete(handlers::unfollow_user),
        )
        .route("/api/articles", post(handlers::create_article))
        .route("/api/articles/feed", get(handlers::feed_articles))
        .route(
            "/api/articles/{slug}",
            put(handlers::update_article).delete(handlers::delete_article),
        )
        .route(
            "/api/articles/{slug}/favorite",
            post(handlers::favorite_article).delete(handlers::unfavorite_article),
        )
        .route(
            "/api/articles/{slug}/comments",
            post(handlers::create_comment),
        )
        .route(
            "/api/articles/{slug}/comments/{id}",
            delete(handlers::delete_comment),
        )
        .layer(axum_middleware::from_fn_with_state(
            api_state,
            middleware::require_auth,
        ));

    public.merge(optional).merge(protected).with_state(state)
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;

use realworld::application::articles::ArticleService;
use realworld::application::auth::TokenService;
use realworld::application::comments::CommentService;
use realworld::application::repos::{ArticlesRepo, CommentsRepo, UsersRepo};
use realworld::application::users::UserService;
use realworld::config::{DocsSettings, ServerSettings};
use realworld::infra::db::PostgresRepositories;
use realworld::infra::http::{self, ApiState, HttpState, RouterState};

fn build_app(pool: PgPool) -> Router {
    let repos = Arc::new(PostgresRepositories::new(pool));
    let tokens = Arc::new(
        TokenService::new(b"integration-secret", Duration::from_secs(3600)).expect("tokens"),
    );

    let users: Arc<dyn UsersRepo> = repos.clone();
    let articles: Arc<dyn ArticlesRepo> = repos.clone();
    let comments: Arc<dyn CommentsRepo> = repos.clone();

    let state = RouterState {
        http: HttpState {
            db: repos,
            docs: None,
        },
        api: ApiState {
            users: Arc::new(UserService::new(users.clone(), tokens.clone())),
            articles: Arc::new(ArticleService::new(articles.clone(), users.clone())),
            comments: Arc::new(CommentService::new(comments, articles, users)),
            tokens,
        },
    };

    let server = ServerSettings {
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        request_timeout: Duration::from_secs(5),
        graceful_shutdown: Duration::from_secs(1),
        docs: DocsSettings {
            enabled: false,
            path: PathBuf::new(),
        },
    };

    http::build_router(state, &server)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Token {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({
            "user": {
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "secret-password",
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["user"]["token"]
        .as_str()
        .expect("token")
        .to_string()
}

async fn publish(app: &Router, token: &str, title: &str, tags: &[&str]) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/articles",
        Some(token),
        Some(json!({
            "article": {
                "title": title,
                "description": "Ever wonder how?",
                "body": "You have to believe",
                "tagList": tags,
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body
}

#[sqlx::test(migrations = "./migrations")]
async fn sign_up_returns_token_and_empty_profile_fields(pool: PgPool) {
    let app = build_app(pool);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({
            "user": {"username": "jake", "email": "jake@jake.jake", "password": "jakejake"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "jake");
    assert_eq!(body["user"]["email"], "jake@jake.jake");
    assert_eq!(body["user"]["bio"], "");
    assert_eq!(body["user"]["image"], "");
    assert!(!body["user"]["token"].as_str().expect("token").is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn duplicate_email_is_unprocessable(pool: PgPool) {
    let app = build_app(pool);
    register(&app, "jake").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({
            "user": {"username": "other", "email": "jake@example.com", "password": "x"}
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["body"], "duplicate email: jake@example.com");
}

#[sqlx::test(migrations = "./migrations")]
async fn login_and_current_user(pool: PgPool) {
    let app = build_app(pool);
    register(&app, "jane").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"user": {"email": "jane@example.com", "password": "secret-password"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["user"]["token"].as_str().expect("token").to_string();

    let (status, body) = send(&app, Method::GET, "/api/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["username"], "jane");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"user": {"email": "jane@example.com", "password": "wrong"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"user": {"email": "nobody@example.com", "password": "x"}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn protected_routes_require_token(pool: PgPool) {
    let app = build_app(pool);

    let (status, body) = send(&app, Method::GET, "/api/user", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["errors"]["body"], "auth required");

    let (status, _) = send(&app, Method::GET, "/api/articles", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/api/articles", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[sqlx::test(migrations = "./migrations")]
async fn article_lifecycle_with_favorites(pool: PgPool) {
    let app = build_app(pool);
    let author = register(&app, "author").await;
    let reader = register(&app, "reader").await;

    let created = publish(&app, &author, "How to train your dragon", &["dragons", "training"]).await;
    let article = &created["article"];
    assert_eq!(article["slug"], "how-to-train-your-dragon");
    assert_eq!(article["favoritesCount"], 0);
    assert_eq!(article["favorited"], false);
    assert_eq!(article["author"]["username"], "author");
    let mut tags: Vec<String> = serde_json::from_value(article["tagList"].clone()).expect("tags");
    tags.sort();
    assert_eq!(tags, vec!["dragons", "training"]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/articles/how-to-train-your-dragon/favorite",
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["favorited"], true);
    assert_eq!(body["article"]["favoritesCount"], 1);

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/articles/how-to-train-your-dragon/favorite",
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/articles/how-to-train-your-dragon/favorite",
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["favorited"], false);
    assert_eq!(body["article"]["favoritesCount"], 0);

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/articles/how-to-train-your-dragon",
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/articles/how-to-train-your-dragon",
        Some(&author),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deleted");

    let (status, _) = send(
        &app,
        Method::GET,
        "/api/articles/how-to-train-your-dragon",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
async fn list_filters_and_counts(pool: PgPool) {
    let app = build_app(pool);
    let jake = register(&app, "jake").await;
    let jane = register(&app, "jane").await;

    publish(&app, &jake, "Dragons one", &["dragons"]).await;
    publish(&app, &jake, "Dragons two", &["dragons"]).await;
    publish(&app, &jane, "Cats", &["cats"]).await;

    let (status, body) = send(&app, Method::GET, "/api/articles?tag=dragons", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["articlesCount"], 2);
    assert_eq!(body["articles"][0]["slug"], "dragons-two");

    let (_, body) = send(
        &app,
        Method::GET,
        "/api/articles?tag=dragons&limit=1&offset=1",
        None,
        None,
    )
    .await;
    assert_eq!(body["articlesCount"], 2);
    assert_eq!(body["articles"].as_array().expect("articles").len(), 1);
    assert_eq!(body["articles"][0]["slug"], "dragons-one");

    let (_, body) = send(&app, Method::GET, "/api/articles?author=jane", None, None).await;
    assert_eq!(body["articlesCount"], 1);
    assert_eq!(body["articles"][0]["slug"], "cats");

    let (status, _) = send(&app, Method::POST, "/api/articles/cats/favorite", Some(&jake), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = send(&app, Method::GET, "/api/articles?favorited=jake", None, None).await;
    assert_eq!(body["articlesCount"], 1);
    assert_eq!(body["articles"][0]["favoritesCount"], 1);

    let (status, body) = send(&app, Method::GET, "/api/articles?limit=-1", None, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["body"], "limit must greater than or equals to 0");

    let (_, body) = send(&app, Method::GET, "/api/tags", None, None).await;
    let mut tags: Vec<String> = serde_json::from_value(body["tags"].clone()).expect("tags");
    tags.sort();
    assert_eq!(tags, vec!["cats", "dragons"]);
}

#[sqlx::test(migrations = "./migrations")]
async fn follow_drives_profile_and_feed(pool: PgPool) {
    let app = build_app(pool);
    let jake = register(&app, "jake").await;
    let jane = register(&app, "jane").await;
    publish(&app, &jane, "Jane writes", &[]).await;

    let (_, body) = send(&app, Method::GET, "/api/articles/feed", Some(&jake), None).await;
    assert_eq!(body["articlesCount"], 0);

    let (status, body) = send(&app, Method::POST, "/api/profiles/jane/follow", Some(&jake), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["following"], true);

    let (status, _) = send(&app, Method::POST, "/api/profiles/jane/follow", Some(&jake), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, body) = send(&app, Method::GET, "/api/profiles/jane", Some(&jake), None).await;
    assert_eq!(body["profile"]["following"], true);

    let (_, body) = send(&app, Method::GET, "/api/articles/feed", Some(&jake), None).await;
    assert_eq!(body["articlesCount"], 1);
    assert_eq!(body["articles"][0]["author"]["following"], true);

    let (status, body) =
        send(&app, Method::DELETE, "/api/profiles/jane/follow", Some(&jake), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["following"], false);

    let (status, _) =
        send(&app, Method::DELETE, "/api/profiles/jane/follow", Some(&jake), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, Method::GET, "/api/articles/feed", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn comments_are_owned_by_their_author(pool: PgPool) {
    let app = build_app(pool);
    let jake = register(&app, "jake").await;
    let jane = register(&app, "jane").await;
    publish(&app, &jake, "Commented", &[]).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/articles/commented/comments",
        Some(&jane),
        Some(json!({"comment": {"body": "Nice"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comment"]["body"], "Nice");
    assert_eq!(body["comment"]["author"]["username"], "jane");
    let id = body["comment"]["id"].as_i64().expect("comment id");

    let (_, body) = send(&app, Method::GET, "/api/articles/commented/comments", None, None).await;
    assert_eq!(body["comments"].as_array().expect("comments").len(), 1);

    let uri = format!("/api/articles/commented/comments/{id}");
    let (status, _) = send(&app, Method::DELETE, &uri, Some(&jake), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::DELETE, &uri, Some(&jane), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "deleted");

    let (status, body) = send(
        &app,
        Method::DELETE,
        "/api/articles/commented/comments/abc",
        Some(&jane),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["body"], "id validation error. reason: uint");

    let (_, body) = send(&app, Method::GET, "/api/articles/commented/comments", None, None).await;
    assert!(body["comments"].as_array().expect("comments").is_empty());
}

#[sqlx::test(migrations = "./migrations")]
async fn health_reports_database_status(pool: PgPool) {
    let app = build_app(pool);
    let (status, _) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "./migrations")]
async fn update_user_is_partial_and_checks_duplicates(pool: PgPool) {
    let app = build_app(pool);
    let jake = register(&app, "jake").await;
    register(&app, "jane").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        None,
        Some(json!({
            "user": {"username": "jake", "email": "fresh@example.com", "password": "x"}
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["body"], "duplicate username: jake");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/user",
        Some(&jake),
        Some(json!({"user": {"bio": "I like to skateboard"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["user"]["bio"], "I like to skateboard");
    assert_eq!(body["user"]["username"], "jake");
    assert_eq!(body["user"]["email"], "jake@example.com");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/user",
        Some(&jake),
        Some(json!({"user": {"username": "jane"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["body"], "duplicate username: jane");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/user",
        Some(&jake),
        Some(json!({"user": {"email": "jane@example.com"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["body"], "duplicate email: jane@example.com");

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/user",
        Some(&jake),
        Some(json!({"user": {"password": "rotated-password"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/login",
        None,
        Some(json!({"user": {"email": "jake@example.com", "password": "rotated-password"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["bio"], "I like to skateboard");
}

#[sqlx::test(migrations = "./migrations")]
async fn update_article_reslugs_and_enforces_ownership(pool: PgPool) {
    let app = build_app(pool);
    let author = register(&app, "author").await;
    let reader = register(&app, "reader").await;
    publish(&app, &author, "First draft", &[]).await;
    publish(&app, &author, "Taken", &[]).await;

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/articles/first-draft",
        Some(&reader),
        Some(json!({"article": {"body": "hijacked"}})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errors"]["body"], "article(first-draft) not found");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/articles/first-draft",
        Some(&author),
        Some(json!({"article": {"title": "Taken"}})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["body"], "duplicate title");

    let (status, body) = send(
        &app,
        Method::PUT,
        "/api/articles/first-draft",
        Some(&author),
        Some(json!({"article": {"title": "New title"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["article"]["slug"], "new-title");
    assert_eq!(body["article"]["title"], "New title");
    assert_eq!(body["article"]["description"], "Ever wonder how?");
    assert_eq!(body["article"]["body"], "You have to believe");

    let (status, _) = send(&app, Method::GET, "/api/articles/first-draft", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = send(&app, Method::GET, "/api/articles/new-title", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["article"]["body"], "You have to believe");
}

#[sqlx::test(migrations = "./migrations")]
async fn combined_filters_require_every_predicate(pool: PgPool) {
    let app = build_app(pool);
    let jake = register(&app, "jake").await;
    let jane = register(&app, "jane").await;

    publish(&app, &jake, "Match old", &["dragons"]).await;
    publish(&app, &jake, "Unfavorited", &["dragons"]).await;
    publish(&app, &jane, "Other author", &["dragons"]).await;
    publish(&app, &jake, "Other tag", &["cats"]).await;
    publish(&app, &jake, "Match new", &["dragons", "cats"]).await;

    for slug in ["match-old", "other-author", "other-tag", "match-new"] {
        let uri = format!("/api/articles/{slug}/favorite");
        let (status, _) = send(&app, Method::POST, &uri, Some(&jane), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    let query = "/api/articles?tag=dragons&author=jake&favorited=jane";
    let (status, body) = send(&app, Method::GET, &format!("{query}&limit=1"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["articlesCount"], 2);
    assert_eq!(body["articles"].as_array().expect("articles").len(), 1);
    assert_eq!(body["articles"][0]["slug"], "match-new");

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("{query}&limit=1&offset=1"),
        None,
        None,
    )
    .await;
    assert_eq!(body["articlesCount"], 2);
    assert_eq!(body["articles"][0]["slug"], "match-old");

    let (_, body) = send(&app, Method::GET, query, Some(&jane), None).await;
    let slugs: Vec<&str> = body["articles"]
        .as_array()
        .expect("articles")
        .iter()
        .map(|article| article["slug"].as_str().expect("slug"))
        .collect();
    assert_eq!(slugs, vec!["match-new", "match-old"]);
    assert_eq!(body["articles"][0]["favorited"], true);
}

#[sqlx::test(migrations = "./migrations")]
async fn tags_keep_submitted_order(pool: PgPool) {
    let app = build_app(pool);
    let jake = register(&app, "jake").await;
    publish(&app, &jake, "Earlier", &["tag1"]).await;

    let created = publish(&app, &jake, "Later", &["zzz", "tag1"]).await;
    assert_eq!(created["article"]["tagList"], json!(["zzz", "tag1"]));

    let (_, body) = send(&app, Method::GET, "/api/articles?author=jake", None, None).await;
    assert_eq!(body["articles"][0]["slug"], "later");
    assert_eq!(body["articles"][0]["tagList"], json!(["zzz", "tag1"]));
}

#[sqlx::test(migrations = "./migrations")]
async fn listing_spans_several_tag_batches(pool: PgPool) {
    let app = build_app(pool);
    let jake = register(&app, "jake").await;
    for n in 0..55 {
        publish(&app, &jake, &format!("Bulk {n}"), &["bulk", "batch"]).await;
    }

    let (status, body) = send(&app, Method::GET, "/api/articles?limit=60", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["articlesCount"], 55);
    let articles = body["articles"].as_array().expect("articles");
    assert_eq!(articles.len(), 55);
    for article in articles {
        assert_eq!(article["tagList"], json!(["bulk", "batch"]), "{}", article["slug"]);
    }
    assert_eq!(articles[0]["slug"], "bulk-54");
    assert_eq!(articles[54]["slug"], "bulk-0");
}

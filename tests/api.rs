use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use community_hub::{
    api::create_router,
    app_state::AppState,
    config::Config,
    infrastructure::{MemoryStore, SqliteStore, USER_ID_HEADER},
};

fn app() -> Router {
    let state = AppState::with_store(Config::default(), Arc::new(MemoryStore::default()), None);
    create_router(state)
}

async fn call(app: &Router, method: Method, uri: &str, user: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user);
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn test_health() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "memory");
    assert_eq!(body["pendingRepairs"], 0);
}

#[tokio::test]
async fn test_health_round_trips_to_sqlite() {
    let store = SqliteStore::new_in_memory(10).await.unwrap();
    let app = create_router(AppState::with_store(Config::default(), Arc::new(store), None));
    let (status, body) = call(&app, Method::GET, "/api/v1/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "sqlite");
}

#[tokio::test]
async fn test_signup_and_profile_edit() {
    let app = app();
    let (status, user) = call(&app, Method::POST, "/api/v1/users", Some("ada"), Some(json!({ "name": "Ada" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["id"], "ada");

    let (status, _) = call(&app, Method::PUT, "/api/v1/users/ada", Some("bob"), Some(json!({ "bio": "hi" }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, user) = call(&app, Method::PUT, "/api/v1/users/ada", Some("ada"), Some(json!({ "bio": "hi" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(user["bio"], "hi");

    let (_, users) = call(&app, Method::GET, "/api/v1/users", None, None).await;
    assert_eq!(users.as_array().unwrap().len(), 1);

    let (status, _) = call(&app, Method::GET, "/api/v1/users/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_follow_flow_and_feed() {
    let app = app();

    let (status, _) = call(&app, Method::POST, "/api/v1/users/bob/follow", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call(&app, Method::POST, "/api/v1/users/bob/follow", Some("ada"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["following"], true);

    let (_, body) = call(&app, Method::GET, "/api/v1/users/ada/following/bob", None, None).await;
    assert_eq!(body["following"], true);
    let (_, body) = call(&app, Method::GET, "/api/v1/users/bob/followers", None, None).await;
    assert_eq!(body, json!(["ada"]));
    let (_, body) = call(&app, Method::GET, "/api/v1/users/bob/follow-counts", None, None).await;
    assert_eq!(body, json!({ "following": 0, "followers": 1 }));

    let (status, _) = call(&app, Method::GET, "/api/v1/feed/following", Some("ada"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, post) = call(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some("bob"),
        Some(json!({ "title": "Hello", "content": "World", "tags": ["Intro"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(post["tags"], json!(["intro"]));

    let (_, feed) = call(&app, Method::GET, "/api/v1/feed/following", Some("ada"), None).await;
    assert_eq!(feed.as_array().unwrap().len(), 1);
    assert_eq!(feed[0]["id"], post["id"]);

    let (status, _) = call(&app, Method::DELETE, "/api/v1/users/bob/follow", Some("ada"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, feed) = call(&app, Method::GET, "/api/v1/feed/following", Some("ada"), None).await;
    assert_eq!(feed, json!([]));

    let (status, body) = call(&app, Method::POST, "/api/v1/users/ada/follow", Some("ada"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["following"], false);
}

#[tokio::test]
async fn test_post_views_reactions_and_comments() {
    let app = app();
    let (_, post) = call(
        &app,
        Method::POST,
        "/api/v1/posts",
        Some("bob"),
        Some(json!({ "title": "Hello", "content": "World" })),
    )
    .await;
    let id = post["id"].as_str().unwrap().to_string();

    let (status, fetched) = call(&app, Method::GET, &format!("/api/v1/posts/{}", id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["views"], 1);

    let (status, _) = call(&app, Method::POST, &format!("/api/v1/posts/{}/reactions", id), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(
        &app,
        Method::POST,
        &format!("/api/v1/posts/{}/comments", id),
        Some("ada"),
        Some(json!({ "content": "nice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, comments) = call(&app, Method::GET, &format!("/api/v1/posts/{}/comments", id), None, None).await;
    assert_eq!(comments.as_array().unwrap().len(), 1);

    let (_, trending) = call(&app, Method::GET, "/api/v1/posts/trending?limit=5", None, None).await;
    assert_eq!(trending[0]["reactions"], 1);
    assert_eq!(trending[0]["commentsCount"], 1);

    let (status, _) = call(&app, Method::GET, "/api/v1/posts/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_showcase_upvotes() {
    let app = app();
    let (status, showcase) = call(
        &app,
        Method::POST,
        "/api/v1/showcases",
        Some("ada"),
        Some(json!({ "title": "Engine", "description": "Analytical" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let uri = format!("/api/v1/showcases/{}/upvote", showcase["id"].as_str().unwrap());

    let (_, first) = call(&app, Method::POST, &uri, Some("bob"), None).await;
    let (_, second) = call(&app, Method::POST, &uri, Some("cy"), None).await;
    assert_eq!(first["upvotes"], 1);
    assert_eq!(second["upvotes"], 2);

    let (_, top) = call(&app, Method::GET, "/api/v1/showcases?sort=top", None, None).await;
    assert_eq!(top[0]["upvotes"], 2);

    let (status, _) = call(&app, Method::POST, "/api/v1/showcases/missing/upvote", Some("bob"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tag_suggestions_unconfigured() {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/v1/tags/suggest",
        None,
        Some(json!({ "postContent": "rust and tokio" })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_admin_reconcile_reports_stats() {
    let app = app();
    let (status, body) = call(&app, Method::POST, "/api/v1/admin/reconcile", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["applied"], 0);
    assert_eq!(body["stats"]["pending"], 0);
}

// HTTP surface under /api/v1

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::{
    app_state::AppState,
    error::{AppError, AppResult},
    infrastructure::{ReconciliationLog, ViewerContext},
    models::{Comment, FollowCounts, NewComment, NewPost, NewShowcase, NewUser, Post, ProfileUpdate, Showcase, User},
};

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ShowcaseListParams {
    /// `top` orders by upvotes; anything else lists newest first.
    pub sort: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestTagsRequest {
    pub post_content: String,
}

// Profiles

pub async fn create_user_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Json(req): Json<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user_id = viewer.require_user()?;
    let user = state.services.profiles.create_profile(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn list_users_handler(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    Ok(Json(state.services.profiles.list_profiles().await?))
}

pub async fn get_user_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<User>> {
    state
        .services
        .profiles
        .get_profile(&user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("profile {}", user_id)))
}

pub async fn update_user_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Path(user_id): Path<String>,
    Json(req): Json<ProfileUpdate>,
) -> AppResult<Json<User>> {
    let user = state
        .services
        .profiles
        .update_profile(&viewer, &user_id, req)
        .await?;
    Ok(Json(user))
}

// Follow graph

pub async fn following_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let ids = state.services.graph.following_ids(&user_id).await?;
    Ok(Json(ids.into_iter().collect()))
}

pub async fn followers_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<String>>> {
    let ids = state.services.graph.follower_ids(&user_id).await?;
    Ok(Json(ids.into_iter().collect()))
}

pub async fn follow_counts_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<FollowCounts>> {
    Ok(Json(state.services.graph.counts(&user_id).await?))
}

pub async fn is_following_handler(
    State(state): State<AppState>,
    Path((user_id, other)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let following = state.services.graph.is_following(&user_id, &other).await?;
    Ok(Json(json!({ "following": following })))
}

pub async fn follow_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Path(followee): Path<String>,
) -> AppResult<Json<Value>> {
    let follower = viewer.require_user()?;
    state.services.graph.follow(follower, &followee).await?;
    info!(follower, followee = %followee, request_id = %viewer.request_id, "followed");
    Ok(Json(json!({ "following": follower != followee })))
}

pub async fn unfollow_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Path(followee): Path<String>,
) -> AppResult<Json<Value>> {
    let follower = viewer.require_user()?;
    state.services.graph.unfollow(follower, &followee).await?;
    info!(follower, followee = %followee, request_id = %viewer.request_id, "unfollowed");
    Ok(Json(json!({ "following": false })))
}

// Posts and comments

pub async fn user_posts_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(state.services.posts.posts_by_author(&user_id).await?))
}

pub async fn create_post_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Json(req): Json<NewPost>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = state.services.posts.create_post(&viewer, req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn discover_feed_handler(State(state): State<AppState>) -> AppResult<Json<Vec<Post>>> {
    Ok(Json(state.services.feed.discover_feed().await?))
}

pub async fn trending_posts_handler(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<Vec<Post>>> {
    let limit = params.limit.unwrap_or(state.config.feed.trending_limit);
    Ok(Json(state.services.posts.trending_posts(limit).await?))
}

/// Fetching a post counts as a view.
pub async fn get_post_handler(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Post>> {
    let posts = &state.services.posts;
    let mut post = posts
        .get_post(&post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("post {}", post_id)))?;
    posts.record_view(&post_id).await?;
    post.views += 1;
    Ok(Json(post))
}

pub async fn react_handler(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<StatusCode> {
    state.services.posts.react(&post_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_comment_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Path(post_id): Path<String>,
    Json(req): Json<NewComment>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = state
        .services
        .comments
        .create_comment(&viewer, &post_id, req)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_comments_handler(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<Vec<Comment>>> {
    Ok(Json(state.services.comments.list_comments(&post_id).await?))
}

pub async fn following_feed_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
) -> AppResult<Json<Vec<Post>>> {
    let user_id = viewer.require_user()?;
    Ok(Json(state.services.feed.following_feed(user_id).await?))
}

// Showcases

pub async fn user_showcases_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<Vec<Showcase>>> {
    Ok(Json(state.services.showcases.showcases_by_user(&user_id).await?))
}

pub async fn create_showcase_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Json(req): Json<NewShowcase>,
) -> AppResult<(StatusCode, Json<Showcase>)> {
    let showcase = state.services.showcases.create_showcase(&viewer, req).await?;
    Ok((StatusCode::CREATED, Json(showcase)))
}

pub async fn list_showcases_handler(
    State(state): State<AppState>,
    Query(params): Query<ShowcaseListParams>,
) -> AppResult<Json<Vec<Showcase>>> {
    let showcases = &state.services.showcases;
    let list = match params.sort.as_deref() {
        Some("top") => {
            showcases
                .top_showcases(params.limit.unwrap_or(state.config.feed.trending_limit))
                .await?
        }
        _ => showcases.list_showcases().await?,
    };
    Ok(Json(list))
}

pub async fn upvote_handler(
    State(state): State<AppState>,
    viewer: ViewerContext,
    Path(showcase_id): Path<String>,
) -> AppResult<Json<Value>> {
    viewer.require_user()?;
    let upvotes = state.services.upvotes.upvote(&showcase_id).await?;
    Ok(Json(json!({ "id": showcase_id, "upvotes": upvotes })))
}

// Collaborators and operations

pub async fn suggest_tags_handler(
    State(state): State<AppState>,
    Json(req): Json<SuggestTagsRequest>,
) -> AppResult<Json<Value>> {
    let suggester = state.tag_suggester.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("tag suggestions are not configured".to_string())
    })?;
    let tags = suggester.suggest_tags(&req.post_content).await?;
    Ok(Json(json!({ "tags": tags })))
}

pub async fn reconcile_handler(State(state): State<AppState>) -> AppResult<Json<Value>> {
    let applied = state.services.graph.reconcile_pending().await;
    let stats = state.services.graph.reconciliation_log().stats().await;
    Ok(Json(json!({
        "applied": applied,
        "stats": ReconciliationLog::summary(&stats),
    })))
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let pending = state.services.graph.reconciliation_log().pending_count().await;
    let (status, label) = match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "ok"),
        Err(e) => {
            warn!(store = state.store.name(), error = %e, "store health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, "unavailable")
        }
    };
    (
        status,
        Json(json!({
            "status": label,
            "store": state.store.name(),
            "pendingRepairs": pending,
        })),
    )
}

pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        // Profiles and follow graph
        .route("/users", post(create_user_handler).get(list_users_handler))
        .route("/users/{id}", get(get_user_handler).put(update_user_handler))
        .route("/users/{id}/following", get(following_handler))
        .route("/users/{id}/followers", get(followers_handler))
        .route("/users/{id}/follow-counts", get(follow_counts_handler))
        .route("/users/{id}/following/{other}", get(is_following_handler))
        .route("/users/{id}/follow", post(follow_handler).delete(unfollow_handler))
        .route("/users/{id}/posts", get(user_posts_handler))
        .route("/users/{id}/showcases", get(user_showcases_handler))
        // Posts, comments, feeds
        .route("/posts", post(create_post_handler).get(discover_feed_handler))
        .route("/posts/trending", get(trending_posts_handler))
        .route("/posts/{id}", get(get_post_handler))
        .route("/posts/{id}/reactions", post(react_handler))
        .route(
            "/posts/{id}/comments",
            post(create_comment_handler).get(list_comments_handler),
        )
        .route("/feed/following", get(following_feed_handler))
        // Showcases
        .route("/showcases", post(create_showcase_handler).get(list_showcases_handler))
        .route("/showcases/{id}/upvote", post(upvote_handler))
        // Collaborators and operations
        .route("/tags/suggest", post(suggest_tags_handler))
        .route("/admin/reconcile", post(reconcile_handler))
        .route("/health", get(health_handler));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{LikeState, PostView};
use crate::db::posts::{self, Scope};
use crate::db::{likes, users};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery, CurrentUser, MaybeUser};
use crate::routes::{MessageResponse, PageQuery};
use crate::state::AppState;
use crate::validation;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
}

fn post_content(content: Option<&str>) -> AppResult<String> {
    validation::required_text(content, "Content", validation::POST_MAX_CHARS)
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub message: &'static str,
    pub post: PostView,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub message: &'static str,
    pub is_liked: bool,
    pub likes_count: i64,
}

impl LikeResponse {
    fn from_state(state: LikeState) -> Self {
        let message = if state.is_liked {
            "Post liked"
        } else {
            "Post unliked"
        };
        Self {
            message,
            is_liked: state.is_liked,
            likes_count: state.likes_count,
        }
    }
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(feed).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/user/{id}", get(by_author))
        .route("/liked/{id}", get(liked_by))
        .route("/{id}/like", post(toggle_like).put(like).delete(unlike))
}

// -- Handlers --

/// GET /api/posts: the caller's timeline, or every post when anonymous.
async fn feed(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    let page = query.page(state.config.feed.default_limit, state.config.feed.max_limit);
    let viewer = viewer.id();
    let feed = state
        .with_conn(move |conn| Ok(posts::feed(conn, viewer, page)?))
        .await?;
    Ok(Json(feed))
}

/// POST /api/posts
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<PostResponse>)> {
    let content = post_content(req.content.as_deref())?;
    let image = req
        .image
        .map(|image| image.trim().to_string())
        .filter(|image| !image.is_empty());

    let author = user.id;
    let post = state
        .with_conn(move |conn| {
            let id = posts::create_post(conn, author, &content, image.as_deref())?;
            posts::find_post(conn, id, Some(author))?
                .ok_or_else(|| AppError::Internal(format!("post {} vanished after insert", id)))
        })
        .await?;

    tracing::debug!(post_id = post.id, user_id = author, "Post created");

    Ok((
        StatusCode::CREATED,
        Json(PostResponse {
            message: "Post created successfully",
            post,
        }),
    ))
}

/// GET /api/posts/{id}
async fn show(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<PostView>> {
    let viewer = viewer.id();
    let post = state
        .with_conn(move |conn| Ok(posts::find_post(conn, id, viewer)?))
        .await?
        .ok_or(AppError::NotFound("Post not found"))?;
    Ok(Json(post))
}

/// PUT /api/posts/{id}
async fn update(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<UpdatePostRequest>,
) -> AppResult<Json<PostResponse>> {
    let content = post_content(req.content.as_deref())?;

    let post = state
        .with_conn(move |conn| {
            posts::update_post(conn, id, user.id, &content)?;
            posts::find_post(conn, id, Some(user.id))?.ok_or(AppError::NotFound("Post not found"))
        })
        .await?;

    Ok(Json(PostResponse {
        message: "Post updated successfully",
        post,
    }))
}

/// DELETE /api/posts/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    let owner = user.id;
    state
        .with_conn(move |conn| Ok(posts::delete_post(conn, id, owner)?))
        .await?;
    tracing::debug!(post_id = id, user_id = owner, "Post deleted");
    Ok(Json(MessageResponse::new("Post deleted successfully")))
}

/// GET /api/posts/user/{id}
async fn by_author(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiPath(author): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    list_scoped(&state, Scope::Author(author), viewer.id(), &query, author).await
}

/// GET /api/posts/liked/{id}
async fn liked_by(
    State(state): State<AppState>,
    viewer: MaybeUser,
    ApiPath(liker): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Vec<PostView>>> {
    list_scoped(&state, Scope::LikedBy(liker), viewer.id(), &query, liker).await
}

async fn list_scoped(
    state: &AppState,
    scope: Scope,
    viewer: Option<i64>,
    query: &PageQuery,
    subject: i64,
) -> AppResult<Json<Vec<PostView>>> {
    let page = query.page(state.config.feed.default_limit, state.config.feed.max_limit);
    let listed = state
        .with_conn(move |conn| {
            if !users::exists(conn, subject)? {
                return Err(AppError::NotFound("User not found"));
            }
            Ok(posts::list(conn, scope, viewer, page)?)
        })
        .await?;
    Ok(Json(listed))
}

/// POST /api/posts/{id}/like flips the caller's like.
async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<LikeResponse>> {
    let like = state
        .with_conn(move |conn| Ok(likes::toggle_like(conn, id, user.id)?))
        .await?;
    Ok(Json(LikeResponse::from_state(like)))
}

/// PUT /api/posts/{id}/like
async fn like(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<LikeResponse>> {
    let like = state
        .with_conn(move |conn| Ok(likes::like_post(conn, id, user.id)?))
        .await?;
    Ok(Json(LikeResponse::from_state(like)))
}

/// DELETE /api/posts/{id}/like
async fn unlike(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<LikeResponse>> {
    let like = state
        .with_conn(move |conn| Ok(likes::unlike_post(conn, id, user.id)?))
        .await?;
    Ok(Json(LikeResponse::from_state(like)))
}

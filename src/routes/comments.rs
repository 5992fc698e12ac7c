use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::CommentView;
use crate::db::comments;
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::routes::{MessageResponse, PageQuery};
use crate::state::AppState;
use crate::validation;

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    #[serde(alias = "postId")]
    pub post_id: Option<i64>,
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub message: &'static str,
    pub comment: CommentView,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        // GET takes a post id, DELETE a comment id.
        .route("/{id}", get(list).delete(remove))
}

/// GET /api/comments/{post_id}. An unknown post has no comments.
async fn list(
    State(state): State<AppState>,
    ApiPath(post_id): ApiPath<i64>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> AppResult<Json<Vec<CommentView>>> {
    let page = query.page(
        state.config.feed.comments_default_limit,
        state.config.feed.max_limit,
    );
    let thread = state
        .with_conn(move |conn| Ok(comments::list_for_post(conn, post_id, Some(page))?))
        .await?;
    Ok(Json(thread))
}

/// POST /api/comments
async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<CommentResponse>)> {
    let post_id = req
        .post_id
        .ok_or_else(|| AppError::BadRequest("Post id is required".into()))?;
    let content = validation::required_text(
        req.content.as_deref(),
        "Comment",
        validation::COMMENT_MAX_CHARS,
    )?;

    let comment = state
        .with_conn(move |conn| Ok(comments::create_comment(conn, post_id, user.id, &content)?))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            message: "Comment added successfully",
            comment,
        }),
    ))
}

/// DELETE /api/comments/{id}
async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<MessageResponse>> {
    let post_id = state
        .with_conn(move |conn| Ok(comments::delete_comment(conn, id, user.id)?))
        .await?;
    tracing::debug!(comment_id = id, post_id, "Comment deleted");
    Ok(Json(MessageResponse::new("Comment deleted successfully")))
}

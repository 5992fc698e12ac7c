pub mod auth;
pub mod comments;
pub mod posts;
pub mod users;

use axum::Router;
use serde::{Deserialize, Serialize};

use crate::db::Page;
use crate::state::AppState;

/// All JSON endpoints, mounted under `/api`.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/posts", posts::router())
        .nest("/comments", comments::router())
        .nest("/users", users::router())
}

/// Raw `limit`/`offset` query values. Kept as strings so bad input can be
/// clamped instead of rejected.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageQuery {
    pub fn page(&self, default_limit: i64, max_limit: i64) -> Page {
        Page::clamped(
            self.limit.as_deref(),
            self.offset.as_deref(),
            default_limit,
            max_limit,
        )
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub fn new(message: &'static str) -> Self {
        Self { message }
    }
}

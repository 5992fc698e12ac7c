use axum::extract::State;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{User, UserProfile, UserStats, UserSummary};
use crate::db::users::{self, ProfileUpdate};
use crate::db::{follows, Page};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, ApiPath, ApiQuery, CurrentUser};
use crate::routes::MessageResponse;
use crate::state::AppState;
use crate::validation;

const SEARCH_DEFAULT_LIMIT: i64 = 10;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ProfileRequest {
    #[serde(alias = "fullName")]
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub website: Option<String>,
}

impl ProfileRequest {
    fn validate(self) -> AppResult<ProfileUpdate> {
        Ok(ProfileUpdate {
            full_name: validation::optional_text(
                self.full_name.as_deref(),
                "Full name",
                validation::NAME_MAX_CHARS,
            )?,
            bio: validation::optional_text(self.bio.as_deref(), "Bio", validation::BIO_MAX_CHARS)?,
            location: validation::optional_text(
                self.location.as_deref(),
                "Location",
                validation::NAME_MAX_CHARS,
            )?,
            website: validation::optional_text(
                self.website.as_deref(),
                "Website",
                validation::NAME_MAX_CHARS,
            )?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CoverRequest {
    #[serde(alias = "coverPhoto")]
    pub cover_photo: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub message: &'static str,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct FollowResponse {
    pub message: &'static str,
    pub is_following: bool,
}

#[derive(Debug, Serialize)]
pub struct FollowStatus {
    pub is_following: bool,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", put(update_profile))
        .route("/profile/{id}", get(profile))
        .route("/avatar", put(update_avatar))
        .route("/cover", put(update_cover))
        .route("/me", delete(delete_account))
        .route(
            "/follow/{id}",
            post(toggle_follow).put(follow).delete(unfollow),
        )
        .route("/is-following/{id}", get(is_following))
        .route("/followers/{id}", get(followers))
        .route("/following/{id}", get(following))
        .route("/search", get(search))
        .route("/stats/{id}", get(stats))
}

// -- Handlers --

/// GET /api/users/profile/{id}
async fn profile(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<UserProfile>> {
    let card = state
        .with_conn(move |conn| Ok(users::profile(conn, id)?))
        .await?
        .ok_or(AppError::NotFound("User not found"))?;
    Ok(Json(card))
}

/// PUT /api/users/profile
async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<ProfileRequest>,
) -> AppResult<Json<UserResponse>> {
    let update = req.validate()?;
    let updated = state
        .with_conn(move |conn| Ok(users::update_profile(conn, user.id, &update)?))
        .await?;
    Ok(Json(UserResponse {
        message: "Profile updated successfully",
        user: updated,
    }))
}

fn image_reference(value: Option<String>) -> Option<String> {
    value
        .map(|image| image.trim().to_string())
        .filter(|image| !image.is_empty())
}

/// PUT /api/users/avatar
async fn update_avatar(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<AvatarRequest>,
) -> AppResult<Json<UserResponse>> {
    let avatar = image_reference(req.avatar);
    let updated = state
        .with_conn(move |conn| Ok(users::update_avatar(conn, user.id, avatar.as_deref())?))
        .await?;
    Ok(Json(UserResponse {
        message: "Avatar updated successfully",
        user: updated,
    }))
}

/// PUT /api/users/cover
async fn update_cover(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiJson(req): ApiJson<CoverRequest>,
) -> AppResult<Json<UserResponse>> {
    let cover = image_reference(req.cover_photo);
    let updated = state
        .with_conn(move |conn| Ok(users::update_cover_photo(conn, user.id, cover.as_deref())?))
        .await?;
    Ok(Json(UserResponse {
        message: "Cover photo updated successfully",
        user: updated,
    }))
}

/// DELETE /api/users/me
async fn delete_account(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<MessageResponse>> {
    let id = user.id;
    let deleted = state
        .with_conn(move |conn| Ok(users::delete_user(conn, id)?))
        .await?;
    if !deleted {
        return Err(AppError::NotFound("User not found"));
    }
    tracing::info!(user_id = user.id, username = %user.username, "Account deleted");
    Ok(Json(MessageResponse::new("Account deleted successfully")))
}

/// POST /api/users/follow/{id}
async fn toggle_follow(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(target): ApiPath<i64>,
) -> AppResult<Json<FollowResponse>> {
    let is_following = state
        .with_conn(move |conn| Ok(follows::toggle_follow(conn, user.id, target)?))
        .await?;
    let message = if is_following {
        "User followed"
    } else {
        "User unfollowed"
    };
    Ok(Json(FollowResponse {
        message,
        is_following,
    }))
}

/// PUT /api/users/follow/{id}
async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(target): ApiPath<i64>,
) -> AppResult<Json<FollowResponse>> {
    state
        .with_conn(move |conn| Ok(follows::follow(conn, user.id, target)?))
        .await?;
    Ok(Json(FollowResponse {
        message: "User followed",
        is_following: true,
    }))
}

/// DELETE /api/users/follow/{id}
async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(target): ApiPath<i64>,
) -> AppResult<Json<FollowResponse>> {
    state
        .with_conn(move |conn| Ok(follows::unfollow(conn, user.id, target)?))
        .await?;
    Ok(Json(FollowResponse {
        message: "User unfollowed",
        is_following: false,
    }))
}

/// GET /api/users/is-following/{id}
async fn is_following(
    State(state): State<AppState>,
    user: CurrentUser,
    ApiPath(target): ApiPath<i64>,
) -> AppResult<Json<FollowStatus>> {
    let is_following = state
        .with_conn(move |conn| Ok(follows::is_following(conn, user.id, target)?))
        .await?;
    Ok(Json(FollowStatus { is_following }))
}

/// GET /api/users/followers/{id}
async fn followers(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let listed = state
        .with_conn(move |conn| {
            if !users::exists(conn, id)? {
                return Err(AppError::NotFound("User not found"));
            }
            Ok(follows::followers(conn, id)?)
        })
        .await?;
    Ok(Json(listed))
}

/// GET /api/users/following/{id}
async fn following(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let listed = state
        .with_conn(move |conn| {
            if !users::exists(conn, id)? {
                return Err(AppError::NotFound("User not found"));
            }
            Ok(follows::following(conn, id)?)
        })
        .await?;
    Ok(Json(listed))
}

/// GET /api/users/search?q=&limit=
async fn search(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SearchQuery>,
) -> AppResult<Json<Vec<UserSummary>>> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if term.is_empty() {
        return Ok(Json(Vec::new()));
    }
    let page = Page::clamped(
        query.limit.as_deref(),
        None,
        SEARCH_DEFAULT_LIMIT,
        state.config.feed.max_limit,
    );
    let found = state
        .with_conn(move |conn| Ok(users::search(conn, &term, page.limit)?))
        .await?;
    Ok(Json(found))
}

/// GET /api/users/stats/{id}
async fn stats(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
) -> AppResult<Json<UserStats>> {
    let totals = state
        .with_conn(move |conn| {
            if !users::exists(conn, id)? {
                return Err(AppError::NotFound("User not found"));
            }
            Ok(users::stats(conn, id)?)
        })
        .await?;
    Ok(Json(totals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_profile_fields_clear_the_column() {
        let update = ProfileRequest {
            full_name: Some("  Alice  ".into()),
            bio: Some("   ".into()),
            location: None,
            website: Some("https://example.com".into()),
        }
        .validate()
        .unwrap();
        assert_eq!(update.full_name.as_deref(), Some("Alice"));
        assert_eq!(update.bio, None);
        assert_eq!(update.location, None);
        assert_eq!(update.website.as_deref(), Some("https://example.com"));
    }

    #[test]
    fn oversized_bio_is_rejected() {
        let err = ProfileRequest {
            full_name: None,
            bio: Some("b".repeat(validation::BIO_MAX_CHARS + 1)),
            location: None,
            website: None,
        }
        .validate()
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[test]
    fn image_reference_drops_blank_values() {
        assert_eq!(image_reference(Some("  ".into())), None);
        assert_eq!(
            image_reference(Some(" /a.png ".into())).as_deref(),
            Some("/a.png")
        );
        assert_eq!(image_reference(None), None);
    }
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{self, password, session};
use crate::db::models::User;
use crate::db::users::{self, NewUser};
use crate::error::{AppError, AppResult};
use crate::extractors::{ApiJson, CurrentUser};
use crate::routes::MessageResponse;
use crate::state::AppState;
use crate::validation;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    #[serde(alias = "fullName")]
    pub full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

struct Registration {
    username: String,
    email: String,
    password: String,
    full_name: Option<String>,
}

impl RegisterRequest {
    fn validate(self) -> AppResult<Registration> {
        if self.username.is_none() || self.email.is_none() || self.password.is_none() {
            return Err(AppError::BadRequest(
                "Username, email, and password are required".into(),
            ));
        }
        Ok(Registration {
            username: validation::required_text(
                self.username.as_deref(),
                "Username",
                validation::USERNAME_MAX_CHARS,
            )?,
            email: validation::email(self.email.as_deref())?,
            password: validation::password(self.password.as_deref())?,
            full_name: validation::optional_text(
                self.full_name.as_deref(),
                "Full name",
                validation::NAME_MAX_CHARS,
            )?,
        })
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub message: &'static str,
    pub user: User,
    pub token: String,
}

// -- Router --

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(me))
}

// -- Handlers --

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Registration {
        username,
        email,
        password,
        full_name,
    } = req.validate()?;
    let password_hash = password::hash_password(password, state.config.auth.bcrypt_cost).await?;
    let session_hours = state.config.auth.session_hours;

    let (user, token) = state
        .with_conn(move |conn| {
            let new = NewUser {
                username: &username,
                email: &email,
                password_hash: &password_hash,
                full_name: full_name.as_deref(),
            };
            Ok(auth::create_account(conn, &new, session_hours)?)
        })
        .await?;

    tracing::info!(user_id = user.id, username = %user.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "User created successfully",
            user,
            token,
        }),
    ))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let (email, password) = match (req.email.as_deref(), req.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (email.trim().to_string(), password)
        }
        _ => {
            return Err(AppError::BadRequest(
                "Email and password are required".into(),
            ))
        }
    };

    let user = state
        .with_conn(move |conn| Ok(users::find_by_email(conn, &email)?))
        .await?;
    let Some(user) = user else {
        return Err(AppError::Unauthorized("Invalid email or password"));
    };

    if !password::verify_password(password, user.password_hash.clone()).await? {
        return Err(AppError::Unauthorized("Invalid email or password"));
    }

    let (user_id, session_hours) = (user.id, state.config.auth.session_hours);
    let token = state
        .with_conn(move |conn| Ok(session::create_session(conn, user_id, session_hours)?))
        .await?;
    tracing::debug!(user_id, "User logged in");

    Ok(Json(AuthResponse {
        message: "Login successful",
        user,
        token,
    }))
}

/// POST /api/auth/logout. Ends the presented session only.
async fn logout(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<MessageResponse>> {
    state
        .with_conn(move |conn| Ok(session::delete_session(conn, &user.token)?))
        .await?;
    Ok(Json(MessageResponse::new("Logout successful")))
}

/// GET /api/auth/me
async fn me(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<User>> {
    let record = state
        .with_conn(move |conn| Ok(users::find_by_id(conn, user.id)?))
        .await?
        .ok_or(AppError::NotFound("User not found"))?;
    Ok(Json(record))
}

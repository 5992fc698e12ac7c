use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::session;
use crate::error::AppError;
use crate::state::AppState;

/// The caller behind a valid bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub token: String,
}

/// Extractor that requires authentication.
/// Returns 401 if the token is missing, unknown or expired.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or(AppError::Unauthorized("Access token required"))?
            .to_string();

        let lookup = token.clone();
        let (id, username) = state
            .with_conn(move |conn| Ok(session::resolve_session(conn, &lookup)?))
            .await?
            .ok_or(AppError::Unauthorized("Invalid or expired token"))?;

        Ok(CurrentUser {
            id,
            username,
            token,
        })
    }
}

/// Optional user extractor: `None` instead of 401 when the caller is
/// anonymous or presents a bad token. Storage failures still surface.
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|u| u.id)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized(_)) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// JSON body extractor whose rejections use the API's error shape, so a
/// malformed or mistyped payload is a 400 before any handler runs.
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(AppError::BadRequest(format!(
                "Invalid request body: {}",
                rejection.body_text()
            ))),
        }
    }
}

/// Path parameters, rejected as a JSON 400 like [`ApiJson`].
pub struct ApiPath<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    Path<T>: FromRequestParts<S, Rejection = PathRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(rejection) => Err(AppError::BadRequest(format!(
                "Invalid path parameter: {}",
                rejection.body_text()
            ))),
        }
    }
}

/// Query string, rejected as a JSON 400 like [`ApiJson`].
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    Query<T>: FromRequestParts<S, Rejection = QueryRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(AppError::BadRequest(format!(
                "Invalid query string: {}",
                rejection.body_text()
            ))),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(value) = auth {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_parses_scheme_case_insensitively() {
        assert_eq!(bearer_token(&parts_with(Some("Bearer abc"))), Some("abc"));
        assert_eq!(bearer_token(&parts_with(Some("bearer  abc "))), Some("abc"));
    }

    #[test]
    fn bearer_token_rejects_other_shapes() {
        assert_eq!(bearer_token(&parts_with(None)), None);
        assert_eq!(bearer_token(&parts_with(Some("Basic abc"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer"))), None);
        assert_eq!(bearer_token(&parts_with(Some("Bearer "))), None);
    }

    #[derive(Debug, serde::Deserialize)]
    struct Window {
        limit: Option<String>,
    }

    #[tokio::test]
    async fn query_rejection_is_a_bad_request() {
        let mut parts = HttpRequest::builder()
            .uri("/?limit=1&limit=2")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let result = ApiQuery::<Window>::from_request_parts(&mut parts, &()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let mut parts = HttpRequest::builder()
            .uri("/?limit=5")
            .body(())
            .unwrap()
            .into_parts()
            .0;
        let ApiQuery(window) = ApiQuery::<Window>::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(window.limit.as_deref(), Some("5"));
    }
}

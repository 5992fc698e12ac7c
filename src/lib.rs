// Library exports for Tambayan
// The binary and the integration tests build the same router from here.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod validation;

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::state::{AppState, DbPool};

/// Build the full HTTP application for the given state.
pub fn app(state: AppState) -> Router {
    let server = state.config.server.clone();

    let mut app = Router::new()
        .route("/health", get(health))
        .nest("/api", routes::api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(Duration::from_secs(
                    server.request_timeout_secs.max(1),
                ))),
        );

    if let Some(cors) = cors_layer(&server) {
        app = app.layer(cors);
    }

    app.with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

fn cors_layer(server: &ServerConfig) -> Option<CorsLayer> {
    if server.cors_origins.is_empty() {
        return None;
    }

    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]),
    )
}

/// Periodically delete expired sessions. The first sweep runs immediately.
pub fn spawn_session_sweeper(pool: DbPool, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            let pool = pool.clone();
            let swept = tokio::task::spawn_blocking(move || -> db::StoreResult<usize> {
                let conn = pool.get()?;
                auth::session::purge_expired(&conn)
            })
            .await;
            match swept {
                Ok(Ok(0)) => {}
                Ok(Ok(n)) => tracing::info!("Purged {} expired sessions", n),
                Ok(Err(e)) => tracing::error!("Session purge failed: {}", e),
                Err(e) => tracing::error!("Session purge task panicked: {}", e),
            }
        }
    })
}

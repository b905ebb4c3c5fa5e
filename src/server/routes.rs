//! Router configuration for the web server.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use super::handlers;
use super::AppState;
use crate::config::ServerConfig;

/// Room for multipart boundaries and headers on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.server.max_upload_bytes + MULTIPART_OVERHEAD_BYTES;
    let cors = cors_layer(&state.server);

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/documents/upload", post(handlers::upload_document))
        .route(
            "/api/documents/:document_id/analyze",
            post(handlers::analyze_document),
        )
        .route("/api/documents/:document_id", get(handlers::get_document))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .with_state(state)
}

/// CORS restricted to the configured origins.
fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

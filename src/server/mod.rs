//! HTTP API for uploading transcripts and retrieving their analyses.
//!
//! Routes:
//! - `POST /api/documents/upload` (multipart field `document`)
//! - `POST /api/documents/:id/analyze`
//! - `GET /api/documents/:id`
//! - `GET /api/health`

mod error;
mod handlers;
mod routes;

pub use error::ApiError;
pub use routes::create_router;

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::{ServerConfig, Settings};
use crate::services::DocumentLifecycle;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: DocumentLifecycle,
    pub server: Arc<ServerConfig>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        Ok(Self {
            lifecycle: DocumentLifecycle::open(settings).await?,
            server: Arc::new(settings.server.clone()),
        })
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let state = AppState::new(settings).await?;
    let app = create_router(state);

    let listener = bind_listener(host, port).await?;
    tracing::info!("Starting server at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Bind `host:port`, resolving hostnames such as `localhost`.
async fn bind_listener(host: &str, port: u16) -> anyhow::Result<TcpListener> {
    TcpListener::bind((host, port))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}:{}: {}", host, port, e))
}

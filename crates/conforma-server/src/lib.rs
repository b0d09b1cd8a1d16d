//! REST/SSE transport.
//!
//! Thin axum layer over the pipeline: document management routes plus a
//! streaming chat route that runs a full analysis and relays its events.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

use conforma_pipeline::AnalysisContext;

mod chat;
mod documents;
mod error;

pub use error::ApiError;

/// Shared per-request state: the pipeline context, whose store doubles as
/// the document-management backend.
#[derive(Clone)]
pub struct AppState {
    pub ctx: AnalysisContext,
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route(
            "/api/documents",
            get(documents::list).post(documents::upsert),
        )
        .route("/api/documents/:id", axum::routing::delete(documents::remove))
        .route("/api/chat", post(chat::stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");
    axum::serve(listener, router(state)).await
}

async fn health() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "status": "ok" }))
}

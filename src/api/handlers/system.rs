//! System endpoints: health check and indexing status.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::dto::StatusResponse;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, IndexerError};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /api/v1/status`: Indexing checkpoint.
///
/// # Errors
///
/// Returns [`IndexerError`] when the checkpoint cannot be read.
#[utoipa::path(
    get,
    path = "/api/v1/status",
    tag = "System",
    summary = "Indexing status",
    description = "Returns the next height the indexer will request. A stalled value is the visible symptom of a failing batch.",
    responses(
        (status = 200, description = "Current checkpoint", body = StatusResponse),
        (status = 500, description = "Store failure", body = ErrorResponse),
    )
)]
pub async fn status_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, IndexerError> {
    let checkpoint = state.store.load_checkpoint().await?;
    Ok(Json(StatusResponse {
        checkpoint,
        pairs: state.registry.len(),
    }))
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_handler))
}

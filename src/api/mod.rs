//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All resource endpoints are mounted under `/api/v1`. The API is read-only:
//! every handler answers from the analytical store and the pair registry.

pub mod dto;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// OpenAPI description of the query API.
#[derive(Debug, OpenApi)]
#[openapi(
    info(title = "oraidex-indexer", description = "Read-only access to indexed OraiDEX data"),
    paths(
        handlers::system::health_handler,
        handlers::system::status_handler,
        handlers::pool::list_pools,
        handlers::pool::latest_reserves,
        handlers::pool::liquidity_series,
        handlers::pool::candles,
        handlers::pool::volume,
        handlers::pool::apr,
    ),
    components(schemas(
        dto::StatusResponse,
        dto::PairDto,
        dto::ReserveDto,
        dto::LiquidityPointDto,
        dto::CandleDto,
        dto::VolumeDto,
        dto::AprDto,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "System", description = "Health and indexing status"),
        (name = "Pools", description = "Per-pair reserves, candles, volume and APR"),
    )
)]
pub struct ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );

    router
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::domain::{AssetInfo, PairMetadata, PairRegistry, PoolReserveSnapshot};
    use crate::persistence::AnalyticalStore;

    async fn app() -> Router {
        let Ok(store) = AnalyticalStore::in_memory().await else {
            panic!("store should open");
        };
        let snapshots = vec![PoolReserveSnapshot::new("orai1pair", 42, 7, 9, 100, 60)];
        assert!(store.insert_bulk(&snapshots).await.is_ok());
        assert!(store.save_checkpoint(101).await.is_ok());
        let registry = Arc::new(PairRegistry::new(vec![
            PairMetadata::new(AssetInfo::native("orai"), AssetInfo::token("usdt"), "ORAI", "USDT")
                .with_addresses("orai1pair", "orai1lp"),
        ]));
        build_router().with_state(AppState { store, registry })
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let Ok(request) = Request::builder().uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router is infallible");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should be readable");
        };
        (status, serde_json::from_slice(&bytes).unwrap_or_default())
    }

    #[tokio::test]
    async fn status_reports_checkpoint() {
        let (status, body) = get(app().await, "/api/v1/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("checkpoint"), Some(&serde_json::json!(101)));
    }

    #[tokio::test]
    async fn latest_reserves_are_strings() {
        let (status, body) = get(app().await, "/api/v1/pools/orai1pair/reserves/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("offer_pool_amount"), Some(&serde_json::json!("42")));
    }

    #[tokio::test]
    async fn unknown_pair_is_404() {
        let (status, body) = get(app().await, "/api/v1/pools/nope/volume").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.get("error").is_some());
    }

    #[tokio::test]
    async fn missing_apr_is_404() {
        let (status, _) = get(app().await, "/api/v1/pools/orai1pair/apr").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn volume_of_empty_range_is_zero() {
        let (status, body) = get(app().await, "/api/v1/pools/orai1pair/volume?from=0&to=100").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.get("base_volume"), Some(&serde_json::json!("0")));
        assert_eq!(body.get("pair_key"), Some(&serde_json::json!("orai-usdt")));
    }
}

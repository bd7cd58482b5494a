//! Read-only pool handlers: pairs, reserves, liquidity, candles, volume, APR.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    AprDto, CandleDto, LiquidityPointDto, PairDto, RangeParams, ReserveDto, SeriesParams,
    VolumeDto,
};
use crate::app_state::AppState;
use crate::domain::PairMetadata;
use crate::error::{ErrorResponse, IndexerError};

fn pair<'a>(state: &'a AppState, pair_addr: &str) -> Result<&'a PairMetadata, IndexerError> {
    state
        .registry
        .by_pair_addr(pair_addr)
        .ok_or_else(|| IndexerError::NotFound(format!("pair {pair_addr}")))
}

/// `GET /pools`: List curated pairs.
#[utoipa::path(
    get,
    path = "/api/v1/pools",
    tag = "Pools",
    summary = "List pairs",
    description = "Returns every curated pair with its contract addresses.",
    responses(
        (status = 200, description = "Pair list", body = Vec<PairDto>),
    )
)]
pub async fn list_pools(State(state): State<AppState>) -> impl IntoResponse {
    let pairs: Vec<PairDto> = state.registry.iter().map(PairDto::from).collect();
    Json(pairs)
}

/// `GET /pools/{pair_addr}/reserves/latest`: Most recent reserve snapshot.
///
/// # Errors
///
/// Returns [`IndexerError::NotFound`] for an unknown pair or a pair with no
/// history yet.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pair_addr}/reserves/latest",
    tag = "Pools",
    summary = "Latest reserves",
    params(("pair_addr" = String, Path, description = "Pair contract address")),
    responses(
        (status = 200, description = "Latest snapshot", body = ReserveDto),
        (status = 404, description = "Pair or history not found", body = ErrorResponse),
    )
)]
pub async fn latest_reserves(
    State(state): State<AppState>,
    Path(pair_addr): Path<String>,
) -> Result<impl IntoResponse, IndexerError> {
    pair(&state, &pair_addr)?;
    let snapshot = state
        .store
        .latest_reserve(&pair_addr)
        .await?
        .ok_or_else(|| IndexerError::NotFound(format!("reserves of {pair_addr}")))?;
    Ok(Json(ReserveDto::from(snapshot)))
}

/// `GET /pools/{pair_addr}/liquidity`: Bucketed reserve series.
///
/// # Errors
///
/// Returns [`IndexerError`] for an unknown pair or invalid range.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pair_addr}/liquidity",
    tag = "Pools",
    summary = "Liquidity series",
    description = "Returns the last reserve snapshot of every bucket in the range.",
    params(("pair_addr" = String, Path, description = "Pair contract address"), SeriesParams),
    responses(
        (status = 200, description = "Liquidity series", body = Vec<LiquidityPointDto>),
        (status = 400, description = "Invalid range or bucket", body = ErrorResponse),
        (status = 404, description = "Pair not found", body = ErrorResponse),
    )
)]
pub async fn liquidity_series(
    State(state): State<AppState>,
    Path(pair_addr): Path<String>,
    Query(params): Query<SeriesParams>,
) -> Result<impl IntoResponse, IndexerError> {
    pair(&state, &pair_addr)?;
    let (from, to) = params.range().resolve()?;
    let points = state
        .store
        .liquidity_series(&pair_addr, from, to, params.bucket)
        .await?;
    let points: Vec<LiquidityPointDto> = points.into_iter().map(LiquidityPointDto::from).collect();
    Ok(Json(points))
}

/// `GET /pools/{pair_addr}/candles`: OHLCV candles.
///
/// # Errors
///
/// Returns [`IndexerError`] for an unknown pair or invalid range.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pair_addr}/candles",
    tag = "Pools",
    summary = "OHLCV candles",
    params(("pair_addr" = String, Path, description = "Pair contract address"), RangeParams),
    responses(
        (status = 200, description = "Candles in time order", body = Vec<CandleDto>),
        (status = 404, description = "Pair not found", body = ErrorResponse),
    )
)]
pub async fn candles(
    State(state): State<AppState>,
    Path(pair_addr): Path<String>,
    Query(range): Query<RangeParams>,
) -> Result<impl IntoResponse, IndexerError> {
    let pair_key = pair(&state, &pair_addr)?.pair_key();
    let (from, to) = range.resolve()?;
    let candles = state.store.candles(&pair_key, from, to).await?;
    let candles: Vec<CandleDto> = candles.into_iter().map(CandleDto::from).collect();
    Ok(Json(candles))
}

/// `GET /pools/{pair_addr}/volume`: Aggregate swap volume.
///
/// # Errors
///
/// Returns [`IndexerError`] for an unknown pair or invalid range.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pair_addr}/volume",
    tag = "Pools",
    summary = "Swap volume",
    params(("pair_addr" = String, Path, description = "Pair contract address"), RangeParams),
    responses(
        (status = 200, description = "Exact base and quote volume", body = VolumeDto),
        (status = 404, description = "Pair not found", body = ErrorResponse),
    )
)]
pub async fn volume(
    State(state): State<AppState>,
    Path(pair_addr): Path<String>,
    Query(range): Query<RangeParams>,
) -> Result<impl IntoResponse, IndexerError> {
    let pair_key = pair(&state, &pair_addr)?.pair_key();
    let (from, to) = range.resolve()?;
    let totals = state.store.aggregate_volume(&pair_key, from, to).await?;
    Ok(Json(VolumeDto::new(pair_key, from, to, totals)))
}

/// `GET /pools/{pair_addr}/apr`: Latest APR record.
///
/// # Errors
///
/// Returns [`IndexerError::NotFound`] for an unknown pair or a pair with no
/// APR yet.
#[utoipa::path(
    get,
    path = "/api/v1/pools/{pair_addr}/apr",
    tag = "Pools",
    summary = "Latest APR",
    params(("pair_addr" = String, Path, description = "Pair contract address")),
    responses(
        (status = 200, description = "Latest APR", body = AprDto),
        (status = 404, description = "Pair or APR not found", body = ErrorResponse),
    )
)]
pub async fn apr(
    State(state): State<AppState>,
    Path(pair_addr): Path<String>,
) -> Result<impl IntoResponse, IndexerError> {
    pair(&state, &pair_addr)?;
    let record = state
        .store
        .latest_apr(&pair_addr)
        .await?
        .ok_or_else(|| IndexerError::NotFound(format!("apr of {pair_addr}")))?;
    Ok(Json(AprDto::from(record)))
}

/// Pool routes (mounted under `/api/v1`).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pools", get(list_pools))
        .route("/pools/{pair_addr}/reserves/latest", get(latest_reserves))
        .route("/pools/{pair_addr}/liquidity", get(liquidity_series))
        .route("/pools/{pair_addr}/candles", get(candles))
        .route("/pools/{pair_addr}/volume", get(volume))
        .route("/pools/{pair_addr}/apr", get(apr))
}

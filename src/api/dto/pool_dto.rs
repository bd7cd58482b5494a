//! Pool-related DTOs: pair metadata, reserves, candles, volume and APR.

use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{OhlcvCandle, PairMetadata, PoolAprRecord, PoolReserveSnapshot};
use crate::persistence::LiquidityPoint;
use crate::service::VolumeTotals;

/// Summary of one curated pair.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PairDto {
    /// Pair contract address.
    pub pair_addr: String,
    /// LP token contract address.
    pub liquidity_addr: String,
    /// `BASE/QUOTE`.
    pub symbol: String,
    /// Direction-independent pair key.
    pub pair_key: String,
    /// Base denom or cw20 address.
    pub base_denom: String,
    /// Quote denom or cw20 address.
    pub quote_denom: String,
    /// Base asset decimals.
    pub base_decimals: u32,
    /// Quote asset decimals.
    pub quote_decimals: u32,
    /// Commission rate as a decimal string.
    pub commission_rate: String,
}

impl From<&PairMetadata> for PairDto {
    fn from(pair: &PairMetadata) -> Self {
        Self {
            pair_addr: pair.pair_addr.clone(),
            liquidity_addr: pair.liquidity_addr.clone(),
            symbol: pair.symbol(),
            pair_key: pair.pair_key(),
            base_denom: pair.base.denom().to_string(),
            quote_denom: pair.quote.denom().to_string(),
            base_decimals: pair.base_decimals,
            quote_decimals: pair.quote_decimals,
            commission_rate: pair.commission_rate.clone(),
        }
    }
}

/// Pool reserves at a point in time.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReserveDto {
    /// Pair contract address.
    pub pair_addr: String,
    /// Base reserve.
    pub offer_pool_amount: String,
    /// Quote reserve.
    pub ask_pool_amount: String,
    /// LP share supply.
    pub total_share: String,
    /// Height of the last applied event.
    pub height: u64,
    /// Bucketed unix timestamp.
    pub timestamp: i64,
}

impl From<PoolReserveSnapshot> for ReserveDto {
    fn from(snapshot: PoolReserveSnapshot) -> Self {
        Self {
            pair_addr: snapshot.pair_addr,
            offer_pool_amount: snapshot.offer_pool_amount.to_string(),
            ask_pool_amount: snapshot.ask_pool_amount.to_string(),
            total_share: snapshot.total_share.to_string(),
            height: snapshot.height,
            timestamp: snapshot.timestamp,
        }
    }
}

/// One point of a liquidity series.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LiquidityPointDto {
    /// Bucket start.
    pub timestamp: i64,
    /// Base reserve at the end of the bucket.
    pub offer_pool_amount: String,
    /// Quote reserve at the end of the bucket.
    pub ask_pool_amount: String,
    /// LP share supply at the end of the bucket.
    pub total_share: String,
    /// Height of the snapshot.
    pub height: u64,
}

impl From<LiquidityPoint> for LiquidityPointDto {
    fn from(point: LiquidityPoint) -> Self {
        Self {
            timestamp: point.timestamp,
            offer_pool_amount: point.offer_pool_amount.to_string(),
            ask_pool_amount: point.ask_pool_amount.to_string(),
            total_share: point.total_share.to_string(),
            height: point.height,
        }
    }
}

/// OHLCV candle.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CandleDto {
    /// Bucket start.
    pub timestamp: i64,
    /// First price.
    pub open: f64,
    /// Highest price.
    pub high: f64,
    /// Lowest price.
    pub low: f64,
    /// Last price.
    pub close: f64,
    /// Base-asset volume.
    pub volume: String,
    /// Swaps in the bucket.
    pub swap_count: u64,
}

impl From<OhlcvCandle> for CandleDto {
    fn from(candle: OhlcvCandle) -> Self {
        Self {
            timestamp: candle.timestamp,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume.to_string(),
            swap_count: candle.swap_count,
        }
    }
}

/// Aggregate swap volume over a range.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VolumeDto {
    /// Pair key the volume is aggregated over.
    pub pair_key: String,
    /// Range start.
    pub from: i64,
    /// Range end.
    pub to: i64,
    /// Base-asset volume.
    pub base_volume: String,
    /// Quote-asset volume.
    pub quote_volume: String,
    /// Number of swaps.
    pub swaps: u64,
}

impl VolumeDto {
    /// Wraps store totals.
    #[must_use]
    pub fn new(pair_key: String, from: i64, to: i64, totals: VolumeTotals) -> Self {
        Self {
            pair_key,
            from,
            to,
            base_volume: totals.base.to_string(),
            quote_volume: totals.quote.to_string(),
            swaps: totals.swaps,
        }
    }
}

/// Latest APR of a pool.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AprDto {
    /// Pair contract address.
    pub pair_addr: String,
    /// Height the inputs were read at.
    pub height: u64,
    /// APR in percent.
    pub apr: f64,
    /// LP token supply.
    pub total_supply: String,
    /// LP tokens bonded.
    pub total_bond_amount: String,
    /// Reward assets per second, as stored.
    pub reward_per_sec: serde_json::Value,
}

impl From<PoolAprRecord> for AprDto {
    fn from(record: PoolAprRecord) -> Self {
        Self {
            reward_per_sec: serde_json::from_str(&record.reward_per_sec)
                .unwrap_or(serde_json::Value::Null),
            pair_addr: record.pair_addr,
            height: record.height,
            apr: record.apr,
            total_supply: record.total_supply.to_string(),
            total_bond_amount: record.total_bond_amount.to_string(),
        }
    }
}

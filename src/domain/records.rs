//! Derived records written to the analytical store.

use serde::Serialize;

use super::event::UniqueKeyed;

/// Running reserve state of one pool after applying a set of events.
///
/// Amounts are signed accumulations; they are only recomputed from scratch
/// when a pair is seeded from an on-chain pool query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolReserveSnapshot {
    /// Pair contract address.
    pub pair_addr: String,
    /// Base-asset reserve.
    pub offer_pool_amount: i128,
    /// Quote-asset reserve.
    pub ask_pool_amount: i128,
    /// Total LP share supply.
    pub total_share: i128,
    /// Height of the last event applied.
    pub height: u64,
    /// Bucketed unix timestamp of the last event applied.
    pub timestamp: i64,
    /// `timestamp-pairAddr`.
    pub unique_key: String,
}

impl PoolReserveSnapshot {
    /// Creates a snapshot and derives its unique key.
    #[must_use]
    pub fn new(
        pair_addr: &str,
        offer_pool_amount: i128,
        ask_pool_amount: i128,
        total_share: i128,
        height: u64,
        timestamp: i64,
    ) -> Self {
        Self {
            pair_addr: pair_addr.to_string(),
            offer_pool_amount,
            ask_pool_amount,
            total_share,
            height,
            timestamp,
            unique_key: format!("{timestamp}-{pair_addr}"),
        }
    }
}

impl UniqueKeyed for PoolReserveSnapshot {
    fn unique_key(&self) -> &str {
        &self.unique_key
    }
}

/// Open/high/low/close/volume candle of one pair over one time bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcvCandle {
    /// Direction-independent pair key (`baseDenom-quoteDenom`).
    pub pair: String,
    /// Bucket start, unix seconds.
    pub timestamp: i64,
    /// Price of the first swap in the bucket.
    pub open: f64,
    /// Highest price in the bucket.
    pub high: f64,
    /// Lowest price in the bucket.
    pub low: f64,
    /// Price of the last swap in the bucket.
    pub close: f64,
    /// Sum of base-equivalent swap amounts.
    pub volume: u128,
    /// Number of swaps folded into the candle.
    pub swap_count: u64,
    /// `timestamp-pair`.
    pub unique_key: String,
}

impl UniqueKeyed for OhlcvCandle {
    fn unique_key(&self) -> &str {
        &self.unique_key
    }
}

/// Annualized staking yield of one pool at a height.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolAprRecord {
    /// Pair contract address.
    pub pair_addr: String,
    /// Height the inputs were read at.
    pub height: u64,
    /// LP token total supply.
    pub total_supply: u128,
    /// LP tokens bonded in the staking contract.
    pub total_bond_amount: u128,
    /// Reward assets per second, serialized as JSON.
    pub reward_per_sec: String,
    /// Computed APR in percent.
    pub apr: f64,
    /// Unix timestamp of the batch that produced the record.
    pub timestamp: i64,
    /// `height-pairAddr`.
    pub unique_key: String,
}

impl UniqueKeyed for PoolAprRecord {
    fn unique_key(&self) -> &str {
        &self.unique_key
    }
}

/// Singleton holding the offset of the next chain segment to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CheckpointRecord {
    /// Next height to request.
    pub current_height: u64,
}

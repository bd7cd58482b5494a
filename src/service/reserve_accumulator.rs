//! Pool Reserve Accumulator.
//!
//! Folds ordered swap and liquidity events into per-pair reserve snapshots,
//! starting from a seed per pair. The seed is the latest stored snapshot
//! strictly below the batch's first event height; a pair with no history is
//! seeded from an on-chain pool query at `minHeight - 1`, and from zero when
//! that query fails.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures_util::future::join_all;

use crate::chain::ContractQuerier;
use crate::domain::{
    Direction, EventPosition, LiquidityEvent, LiquidityOp, PairRegistry, PoolReserveSnapshot,
    SwapEvent,
};
use crate::error::IndexerError;
use crate::extract::fee::PoolState;
use crate::persistence::AnalyticalStore;

/// Signed `(base, quote)` reserve change caused by a swap.
///
/// A sell adds the offered base and removes the returned quote; a buy adds
/// the offered quote and removes the returned base.
#[must_use]
pub fn swap_delta(swap: &SwapEvent) -> (i128, i128) {
    let offer = to_signed(swap.offer_amount);
    let ret = to_signed(swap.return_amount);
    match swap.direction {
        Direction::Sell => (offer, -ret),
        Direction::Buy => (-ret, offer),
    }
}

/// Signed `(base, quote)` reserve change caused by a provide or withdraw.
#[must_use]
pub fn liquidity_delta(event: &LiquidityEvent) -> (i128, i128) {
    let base = to_signed(event.base_amount);
    let quote = to_signed(event.quote_amount);
    match event.op_type {
        LiquidityOp::Provide => (base, quote),
        LiquidityOp::Withdraw => (-base, -quote),
    }
}

fn to_signed(amount: u128) -> i128 {
    i128::try_from(amount).unwrap_or(i128::MAX)
}

/// Total share after a liquidity change of `base_delta` against a pool
/// holding `offer_pool` base units. Falls back to the minted or burned share
/// when the pool is empty.
#[must_use]
pub fn next_total_share(
    total_share: i128,
    offer_pool: i128,
    base_delta: i128,
    event: &LiquidityEvent,
) -> i128 {
    if total_share > 0 && offer_pool > 0 {
        let change = total_share.saturating_mul(base_delta) / offer_pool;
        return total_share.saturating_add(change);
    }
    let share = to_signed(event.share);
    match event.op_type {
        LiquidityOp::Provide => total_share.saturating_add(share),
        LiquidityOp::Withdraw => total_share.saturating_sub(share),
    }
}

/// Event that moves a pool's reserves.
#[derive(Debug, Clone, Copy)]
enum PoolChange<'a> {
    Swap(&'a SwapEvent),
    Liquidity(&'a LiquidityEvent),
}

impl<'a> PoolChange<'a> {
    fn pair_addr(&self) -> &'a str {
        match *self {
            Self::Swap(swap) => &swap.pair_addr,
            Self::Liquidity(event) => &event.pair_addr,
        }
    }

    fn position(&self) -> EventPosition {
        match self {
            Self::Swap(swap) => swap.position(),
            Self::Liquidity(event) => event.position(),
        }
    }

    fn timestamp(&self) -> i64 {
        match self {
            Self::Swap(swap) => swap.timestamp,
            Self::Liquidity(event) => event.timestamp,
        }
    }
}

/// Accumulates reserves for the curated pairs of a [`PairRegistry`].
#[derive(Debug, Clone)]
pub struct ReserveAccumulator {
    registry: Arc<PairRegistry>,
}

impl ReserveAccumulator {
    /// Creates an accumulator over `registry`.
    #[must_use]
    pub fn new(registry: Arc<PairRegistry>) -> Self {
        Self { registry }
    }

    /// Lowest event height per pair address in the batch.
    #[must_use]
    pub fn min_heights(
        &self,
        swaps: &[SwapEvent],
        liquidity: &[LiquidityEvent],
    ) -> BTreeMap<String, u64> {
        let mut heights: BTreeMap<String, u64> = BTreeMap::new();
        let changes = swaps
            .iter()
            .map(|s| (s.pair_addr.as_str(), s.height))
            .chain(liquidity.iter().map(|l| (l.pair_addr.as_str(), l.height)));
        for (pair_addr, height) in changes {
            if self.registry.by_pair_addr(pair_addr).is_none() {
                continue;
            }
            heights
                .entry(pair_addr.to_string())
                .and_modify(|h| *h = (*h).min(height))
                .or_insert(height);
        }
        heights
    }

    /// Resolves the seed snapshot of every pair in `min_heights`: stored
    /// history first, then an on-chain pool query at `minHeight - 1`
    /// (issued in parallel), then zero.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] when the store lookup fails.
    /// On-chain query failures are logged and seed zero.
    pub async fn resolve_seeds<Q>(
        &self,
        store: &AnalyticalStore,
        querier: &Q,
        min_heights: &BTreeMap<String, u64>,
    ) -> Result<HashMap<String, PoolReserveSnapshot>, IndexerError>
    where
        Q: ContractQuerier + ?Sized,
    {
        let mut seeds = HashMap::with_capacity(min_heights.len());
        let mut cold = Vec::new();
        for (pair_addr, &min_height) in min_heights {
            match store.latest_reserve_before(pair_addr, min_height).await? {
                Some(snapshot) => {
                    seeds.insert(pair_addr.clone(), snapshot);
                }
                None => cold.push((pair_addr.as_str(), min_height)),
            }
        }

        let queried = join_all(cold.iter().map(|&(pair_addr, min_height)| async move {
            let seed_height = min_height.saturating_sub(1);
            (pair_addr, seed_height, querier.pool(pair_addr, Some(seed_height)).await)
        }))
        .await;

        for (pair_addr, seed_height, result) in queried {
            let Some(pair) = self.registry.by_pair_addr(pair_addr) else {
                continue;
            };
            let pool = match result {
                Ok(pool) => PoolState::from_response(pair, &pool),
                Err(e) => {
                    tracing::warn!(%pair_addr, seed_height, error = %e, "seed pool query failed, seeding zero");
                    PoolState::default()
                }
            };
            seeds.insert(
                pair_addr.to_string(),
                PoolReserveSnapshot::new(
                    pair_addr,
                    to_signed(pool.base_reserve),
                    to_signed(pool.quote_reserve),
                    to_signed(pool.total_share),
                    seed_height,
                    0,
                ),
            );
        }
        Ok(seeds)
    }

    /// Applies the batch's events on top of `seeds` in on-chain order
    /// (height, then transaction, then message) and returns one snapshot per
    /// `(pair, bucketed timestamp)`, the last state in that bucket winning.
    /// Pairs outside the registry are ignored.
    #[must_use]
    pub fn accumulate(
        &self,
        seeds: &HashMap<String, PoolReserveSnapshot>,
        swaps: &[SwapEvent],
        liquidity: &[LiquidityEvent],
    ) -> Vec<PoolReserveSnapshot> {
        let mut by_pair: BTreeMap<&str, Vec<PoolChange<'_>>> = BTreeMap::new();
        let changes = swaps
            .iter()
            .map(PoolChange::Swap)
            .chain(liquidity.iter().map(PoolChange::Liquidity));
        for change in changes {
            if self.registry.by_pair_addr(change.pair_addr()).is_none() {
                tracing::debug!(pair_addr = change.pair_addr(), "event for unknown pair ignored");
                continue;
            }
            by_pair.entry(change.pair_addr()).or_default().push(change);
        }

        let mut out = Vec::new();
        for (pair_addr, mut changes) in by_pair {
            changes.sort_by_key(PoolChange::position);
            let (mut offer, mut ask, mut total) = seeds.get(pair_addr).map_or((0, 0, 0), |s| {
                (s.offer_pool_amount, s.ask_pool_amount, s.total_share)
            });

            let mut buckets: BTreeMap<i64, PoolReserveSnapshot> = BTreeMap::new();
            for change in changes {
                let (height, _, _) = change.position();
                let timestamp = change.timestamp();
                match change {
                    PoolChange::Swap(swap) => {
                        let (base, quote) = swap_delta(swap);
                        offer = offer.saturating_add(base);
                        ask = ask.saturating_add(quote);
                    }
                    PoolChange::Liquidity(event) => {
                        let (base, quote) = liquidity_delta(event);
                        total = next_total_share(total, offer, base, event);
                        offer = offer.saturating_add(base);
                        ask = ask.saturating_add(quote);
                    }
                }
                buckets.insert(
                    timestamp,
                    PoolReserveSnapshot::new(pair_addr, offer, ask, total, height, timestamp),
                );
            }
            out.extend(buckets.into_values());
        }
        out
    }
}

//! USD pricing over the curated pair graph.
//!
//! Prices are derived from pool reserves. An asset is priced through the
//! first resolvable path: a direct USDT pair, then via ORAI, then via one
//! intermediate asset paired with ORAI. Unresolvable assets price as zero.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::join_all;

use crate::chain::ContractQuerier;
use crate::domain::pair::{ORAI_DENOM, USDT_CONTRACT};
use crate::domain::{PairMetadata, PairRegistry};
use crate::extract::fee::PoolState;

/// Point-in-time price oracle over a set of pool reserves.
#[derive(Debug, Clone)]
pub struct PriceOracle {
    registry: Arc<PairRegistry>,
    pools: HashMap<String, PoolState>,
}

impl PriceOracle {
    /// Creates an oracle from already-known reserves keyed by pair address.
    #[must_use]
    pub fn new(registry: Arc<PairRegistry>, pools: HashMap<String, PoolState>) -> Self {
        Self { registry, pools }
    }

    /// Queries the current reserves of every registered pair with a known
    /// address, in parallel. Pairs whose query fails are left out.
    pub async fn load<Q>(registry: Arc<PairRegistry>, querier: &Q) -> Self
    where
        Q: ContractQuerier + ?Sized,
    {
        let addressed = registry.iter().filter(|pair| !pair.pair_addr.is_empty());
        let results = join_all(addressed.map(|pair| async move {
            (pair, querier.pool(&pair.pair_addr, None).await)
        }))
        .await;

        let mut pools = HashMap::with_capacity(results.len());
        for (pair, result) in results {
            match result {
                Ok(pool) => {
                    pools.insert(pair.pair_addr.clone(), PoolState::from_response(pair, &pool));
                }
                Err(e) => {
                    tracing::warn!(pair = %pair.symbol(), error = %e, "pool query failed, pair left unpriced");
                }
            }
        }
        Self::new(registry, pools)
    }

    /// Reserves of `pair`, when known.
    #[must_use]
    pub fn pool(&self, pair: &PairMetadata) -> Option<&PoolState> {
        self.pools.get(&pair.pair_addr)
    }

    /// Price of one whole `from` token in whole `to` tokens, from the
    /// reserves of the pair holding both.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self, from: &str, to: &str) -> Option<f64> {
        let (pair, _) = self.registry.find(from, to)?;
        let pool = self.pool(pair)?;
        let reserve_of = |denom: &str| {
            if pair.base.denom() == denom {
                pool.base_reserve
            } else {
                pool.quote_reserve
            }
        };
        let from_amount = scaled(reserve_of(from), pair.decimals_of(from)?);
        let to_amount = scaled(reserve_of(to), pair.decimals_of(to)?);
        if from_amount <= 0.0 {
            return None;
        }
        Some(to_amount / from_amount)
    }

    /// USD price of one whole token of `denom`; zero when no path resolves.
    #[must_use]
    pub fn usd_price(&self, denom: &str) -> f64 {
        if let Some(price) = self.registry.price_override(denom) {
            return price;
        }
        if denom == USDT_CONTRACT {
            return 1.0;
        }
        if let Some(price) = self.ratio(denom, USDT_CONTRACT) {
            return price;
        }
        let Some(orai_usd) = self.ratio(ORAI_DENOM, USDT_CONTRACT) else {
            return 0.0;
        };
        if let Some(in_orai) = self.ratio(denom, ORAI_DENOM) {
            return in_orai * orai_usd;
        }
        self.registry
            .iter()
            .filter_map(|pair| pair.other_side(denom))
            .find_map(|mid| {
                let hop = self.ratio(denom, mid.denom())?;
                let mid_in_orai = self.ratio(mid.denom(), ORAI_DENOM)?;
                Some(hop * mid_in_orai * orai_usd)
            })
            .unwrap_or(0.0)
    }

    /// USD value of both reserves of `pair`; zero when the pool is unknown.
    #[must_use]
    pub fn liquidity_usd(&self, pair: &PairMetadata) -> f64 {
        let Some(pool) = self.pool(pair) else {
            return 0.0;
        };
        scaled(pool.base_reserve, pair.base_decimals) * self.usd_price(pair.base.denom())
            + scaled(pool.quote_reserve, pair.quote_decimals) * self.usd_price(pair.quote.denom())
    }
}

/// Converts a raw amount to whole tokens.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_wrap)]
pub(crate) fn scaled(amount: u128, decimals: u32) -> f64 {
    amount as f64 / 10f64.powi(decimals as i32)
}

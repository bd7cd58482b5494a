//! Pair discovery through the factory contracts.

use futures_util::future::join_all;

use crate::chain::{ContractQuerier, PairInfo};
use crate::domain::PairMetadata;

/// Completes `pairs` with contract addresses and commission from the first
/// factory in `factories` that knows each pair. Pairs no factory knows are
/// kept only if they already carry a pair address.
pub async fn discover_pairs<Q>(
    querier: &Q,
    factories: &[&str],
    pairs: Vec<PairMetadata>,
) -> Vec<PairMetadata>
where
    Q: ContractQuerier + ?Sized,
{
    let factories: Vec<&str> = factories.iter().copied().filter(|f| !f.is_empty()).collect();
    let lookups = join_all(pairs.iter().map(|pair| lookup(querier, &factories, pair))).await;

    let mut out = Vec::with_capacity(pairs.len());
    for (mut pair, info) in pairs.into_iter().zip(lookups) {
        match info {
            Some(info) => {
                pair.pair_addr = info.contract_addr;
                pair.liquidity_addr = info.liquidity_token;
                pair.oracle_addr = info.oracle_addr;
                if let Some(rate) = info.commission_rate {
                    pair.commission_rate = rate;
                }
                out.push(pair);
            }
            None if !pair.pair_addr.is_empty() => out.push(pair),
            None => {
                tracing::warn!(pair = %pair.symbol(), "pair unknown to every factory, dropped");
            }
        }
    }
    tracing::info!(pairs = out.len(), "pair discovery complete");
    out
}

async fn lookup<Q>(querier: &Q, factories: &[&str], pair: &PairMetadata) -> Option<PairInfo>
where
    Q: ContractQuerier + ?Sized,
{
    let asset_infos = [pair.base.clone(), pair.quote.clone()];
    for factory in factories {
        match querier.pair_info(factory, &asset_infos).await {
            Ok(info) => return Some(info),
            Err(e) => {
                tracing::debug!(pair = %pair.symbol(), %factory, error = %e, "factory lookup missed");
            }
        }
    }
    None
}

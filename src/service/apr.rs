//! APR Engine.
//!
//! APR is only recomputed for pairs whose inputs changed in the batch:
//! provides and withdraws move the LP supply, bonds and unbonds move the
//! bonded amount, and a reward-rate update invalidates every pair. Inputs
//! that were not triggered are carried over from the last stored record.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;

use super::price::{PriceOracle, scaled};
use crate::chain::ContractQuerier;
use crate::domain::{
    Asset, LiquidityEvent, PairMetadata, PairRegistry, PoolAprRecord, StakingAction, StakingEvent,
};
use crate::error::IndexerError;
use crate::persistence::AnalyticalStore;

/// Seconds in a 365-day year.
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Decimals assumed for reward assets outside the pair table.
const DEFAULT_DECIMALS: u32 = 6;

/// Which APR inputs a batch invalidated, keyed by pair address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AprTriggers {
    /// Pairs whose LP total supply must be refetched.
    pub total_supply: BTreeSet<String>,
    /// Pairs whose bonded amount must be refetched.
    pub total_bond: BTreeSet<String>,
    /// A reward rate changed: refetch everything for every pair.
    pub full_refetch: bool,
}

impl AprTriggers {
    /// Derives triggers from a batch's liquidity and staking events. Events
    /// on pairs outside `registry` trigger nothing.
    #[must_use]
    pub fn collect(
        registry: &PairRegistry,
        liquidity: &[LiquidityEvent],
        staking: &[StakingEvent],
    ) -> Self {
        let mut triggers = Self::default();
        for event in liquidity {
            if registry.by_pair_addr(&event.pair_addr).is_some() {
                triggers.total_supply.insert(event.pair_addr.clone());
            }
        }
        for event in staking {
            match event.action {
                StakingAction::UpdateRewardsPerSec => triggers.full_refetch = true,
                StakingAction::Bond | StakingAction::Unbond => {
                    if let Some(pair) = registry.by_lp_token(&event.staking_token) {
                        triggers.total_bond.insert(pair.pair_addr.clone());
                    }
                }
            }
        }
        triggers
    }

    /// Returns `true` when nothing needs recomputing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.full_refetch && self.total_supply.is_empty() && self.total_bond.is_empty()
    }

    fn touched<'a>(&self, registry: &'a PairRegistry) -> Vec<&'a PairMetadata> {
        registry
            .iter()
            .filter(|pair| !pair.pair_addr.is_empty() && !pair.liquidity_addr.is_empty())
            .filter(|pair| {
                self.full_refetch
                    || self.total_supply.contains(&pair.pair_addr)
                    || self.total_bond.contains(&pair.pair_addr)
            })
            .collect()
    }
}

/// `100 · rewardsPerYearUsd / bondValue` with
/// `bondValue = totalBond · liquidityUsd / totalSupply`; zero whenever a
/// denominator term is missing.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compute_apr(
    total_supply: u128,
    total_bond: u128,
    liquidity_usd: f64,
    rewards_per_year_usd: f64,
) -> f64 {
    if total_supply == 0 || total_bond == 0 || liquidity_usd <= 0.0 {
        return 0.0;
    }
    let bond_value = total_bond as f64 * liquidity_usd / total_supply as f64;
    if !bond_value.is_finite() || bond_value <= 0.0 {
        return 0.0;
    }
    100.0 * rewards_per_year_usd / bond_value
}

/// Inputs for one pair, either freshly queried or carried over.
#[derive(Debug, Clone, Default)]
struct AprInputs {
    total_supply: u128,
    total_bond: u128,
    rewards: Vec<Asset>,
}

/// Recomputes [`PoolAprRecord`]s for the pairs a batch touched.
#[derive(Debug, Clone)]
pub struct AprEngine {
    registry: Arc<PairRegistry>,
}

impl AprEngine {
    /// Creates an engine over `registry`.
    #[must_use]
    pub fn new(registry: Arc<PairRegistry>) -> Self {
        Self { registry }
    }

    /// USD value of one year of `rewards` emitted per second.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn rewards_per_year_usd(&self, oracle: &PriceOracle, rewards: &[Asset]) -> f64 {
        rewards
            .iter()
            .map(|reward| {
                let denom = reward.info.denom();
                let decimals = self
                    .registry
                    .iter()
                    .find_map(|pair| pair.decimals_of(denom))
                    .unwrap_or(DEFAULT_DECIMALS);
                SECONDS_PER_YEAR as f64 * scaled(reward.amount, decimals) * oracle.usd_price(denom)
            })
            .sum()
    }

    /// Refetches the triggered inputs, prices rewards and liquidity, and
    /// returns one record per touched pair keyed `height-pairAddr`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] when previous records cannot be
    /// read. Query failures fall back to the previous value.
    pub async fn refresh<Q>(
        &self,
        store: &AnalyticalStore,
        querier: &Q,
        triggers: &AprTriggers,
        height: u64,
        timestamp: i64,
    ) -> Result<Vec<PoolAprRecord>, IndexerError>
    where
        Q: ContractQuerier + ?Sized,
    {
        if triggers.is_empty() {
            return Ok(Vec::new());
        }
        let pairs = triggers.touched(&self.registry);
        if pairs.is_empty() {
            return Ok(Vec::new());
        }

        let mut previous = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            let prior = store.latest_apr(&pair.pair_addr).await?;
            previous.push(prior.map(|record| AprInputs {
                total_supply: record.total_supply,
                total_bond: record.total_bond_amount,
                rewards: serde_json::from_str(&record.reward_per_sec).unwrap_or_default(),
            }));
        }

        let inputs = join_all(pairs.iter().zip(previous).map(|(pair, prior)| {
            let refetch_all = triggers.full_refetch || prior.is_none();
            let supply = refetch_all || triggers.total_supply.contains(&pair.pair_addr);
            let bond = refetch_all || triggers.total_bond.contains(&pair.pair_addr);
            fetch_inputs(querier, pair, prior.unwrap_or_default(), supply, bond, refetch_all)
        }))
        .await;

        let oracle = PriceOracle::load(Arc::clone(&self.registry), querier).await;
        let mut records = Vec::with_capacity(pairs.len());
        for (pair, inputs) in pairs.into_iter().zip(inputs) {
            let liquidity_usd = oracle.liquidity_usd(pair);
            let rewards_usd = self.rewards_per_year_usd(&oracle, &inputs.rewards);
            let apr = compute_apr(
                inputs.total_supply,
                inputs.total_bond,
                liquidity_usd,
                rewards_usd,
            );
            let reward_per_sec = serde_json::to_string(&inputs.rewards)
                .map_err(|e| IndexerError::Internal(format!("reward encoding failed: {e}")))?;
            tracing::debug!(pair = %pair.symbol(), apr, liquidity_usd, rewards_usd, "apr recomputed");
            records.push(PoolAprRecord {
                pair_addr: pair.pair_addr.clone(),
                height,
                total_supply: inputs.total_supply,
                total_bond_amount: inputs.total_bond,
                reward_per_sec,
                apr,
                timestamp,
                unique_key: format!("{height}-{}", pair.pair_addr),
            });
        }
        Ok(records)
    }
}

async fn fetch_inputs<Q>(
    querier: &Q,
    pair: &PairMetadata,
    mut inputs: AprInputs,
    supply: bool,
    bond: bool,
    rewards: bool,
) -> AprInputs
where
    Q: ContractQuerier + ?Sized,
{
    let lp_token = pair.liquidity_addr.as_str();
    if supply {
        match querier.total_supply(lp_token).await {
            Ok(value) => inputs.total_supply = value,
            Err(e) => tracing::warn!(%lp_token, error = %e, "total supply query failed"),
        }
    }
    if bond {
        match querier.total_bond_amount(lp_token).await {
            Ok(value) => inputs.total_bond = value,
            Err(e) => tracing::warn!(%lp_token, error = %e, "bond amount query failed"),
        }
    }
    if rewards {
        match querier.rewards_per_sec(lp_token).await {
            Ok(value) => inputs.rewards = value,
            Err(e) => tracing::warn!(%lp_token, error = %e, "rewards per sec query failed"),
        }
    }
    inputs
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::chain::{PairInfo, PoolResponse};
    use crate::domain::pair::{ORAI_DENOM, USDT_CONTRACT};
    use crate::domain::{AssetInfo, LiquidityOp};

    fn registry() -> Arc<PairRegistry> {
        Arc::new(PairRegistry::new(vec![
            PairMetadata::new(
                AssetInfo::native(ORAI_DENOM),
                AssetInfo::token(USDT_CONTRACT),
                "ORAI",
                "USDT",
            )
            .with_addresses("pair-orai-usdt", "lp-orai-usdt"),
        ]))
    }

    fn staking(action: StakingAction, token: &str) -> StakingEvent {
        StakingEvent {
            action,
            staking_token: token.to_string(),
            amount: 1,
            tx_hash: "tx".to_string(),
            height: 1,
        }
    }

    fn provide(pair_addr: &str) -> LiquidityEvent {
        LiquidityEvent {
            tx_hash: "tx".to_string(),
            base_denom: ORAI_DENOM.to_string(),
            base_amount: 1,
            quote_denom: USDT_CONTRACT.to_string(),
            quote_amount: 1,
            base_reserve: 0,
            quote_reserve: 0,
            base_price: 1.0,
            op_type: LiquidityOp::Provide,
            protocol_fee: 0,
            share: 1,
            creator: "creator".to_string(),
            pair_addr: pair_addr.to_string(),
            height: 1,
            tx_index: 0,
            msg_index: 0,
            timestamp: 0,
            unique_key: "k".to_string(),
        }
    }

    /// 1 ORAI = 5 USDT; pool holds 1000 ORAI and 5000 USDT; 100 LP supply,
    /// 50 bonded; 1 micro-ORAI reward per second.
    #[derive(Default)]
    struct Chain {
        supply_calls: AtomicUsize,
        bond_calls: AtomicUsize,
    }

    #[async_trait]
    impl ContractQuerier for Chain {
        async fn pool(&self, _: &str, _: Option<u64>) -> Result<PoolResponse, IndexerError> {
            Ok(PoolResponse {
                assets: vec![
                    Asset {
                        info: AssetInfo::native(ORAI_DENOM),
                        amount: 1_000_000_000,
                    },
                    Asset {
                        info: AssetInfo::token(USDT_CONTRACT),
                        amount: 5_000_000_000,
                    },
                ],
                total_share: 100,
            })
        }

        async fn total_supply(&self, _: &str) -> Result<u128, IndexerError> {
            self.supply_calls.fetch_add(1, Ordering::SeqCst);
            Ok(100)
        }

        async fn total_bond_amount(&self, _: &str) -> Result<u128, IndexerError> {
            self.bond_calls.fetch_add(1, Ordering::SeqCst);
            Ok(50)
        }

        async fn rewards_per_sec(&self, _: &str) -> Result<Vec<Asset>, IndexerError> {
            Ok(vec![Asset {
                info: AssetInfo::native(ORAI_DENOM),
                amount: 1,
            }])
        }

        async fn pair_info(&self, _: &str, _: &[AssetInfo; 2]) -> Result<PairInfo, IndexerError> {
            Err(IndexerError::Query("no factory".to_string()))
        }
    }

    #[test]
    fn reward_update_invalidates_everything() {
        let registry = registry();
        let triggers = AprTriggers::collect(
            &registry,
            &[],
            &[staking(StakingAction::UpdateRewardsPerSec, "lp-orai-usdt")],
        );
        assert!(triggers.full_refetch);
        assert_eq!(triggers.touched(&registry).len(), 1);
    }

    #[test]
    fn triggers_are_scoped_to_known_pairs() {
        let registry = registry();
        let triggers = AprTriggers::collect(
            &registry,
            &[provide("pair-orai-usdt"), provide("pair-unknown")],
            &[
                staking(StakingAction::Bond, "lp-orai-usdt"),
                staking(StakingAction::Unbond, "lp-unknown"),
            ],
        );
        assert!(!triggers.full_refetch);
        assert_eq!(triggers.total_supply.len(), 1);
        assert!(triggers.total_bond.contains("pair-orai-usdt"));
        assert!(AprTriggers::default().is_empty());
    }

    #[test]
    fn missing_denominators_clamp_to_zero() {
        assert!(compute_apr(0, 10, 100.0, 5.0).abs() < f64::EPSILON);
        assert!(compute_apr(10, 0, 100.0, 5.0).abs() < f64::EPSILON);
        assert!(compute_apr(10, 10, 0.0, 5.0).abs() < f64::EPSILON);
        // bond value = 5 * 100 / 10 = 50; 100 * 5 / 50 = 10
        assert!((compute_apr(10, 5, 100.0, 5.0) - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refresh_prices_rewards_and_carries_untriggered_inputs() {
        let Ok(store) = AnalyticalStore::in_memory().await else {
            panic!("store should open");
        };
        let engine = AprEngine::new(registry());
        let chain = Chain::default();

        let full = AprTriggers {
            full_refetch: true,
            ..AprTriggers::default()
        };
        let Ok(records) = engine.refresh(&store, &chain, &full, 10, 600).await else {
            panic!("refresh should succeed");
        };
        let [record] = records.as_slice() else {
            panic!("one record expected");
        };
        assert_eq!(record.unique_key, "10-pair-orai-usdt");
        assert_eq!(record.total_supply, 100);
        assert_eq!(record.total_bond_amount, 50);
        // liquidity $10,000, bond value $5,000,
        // rewards 31.536 ORAI/year at $5 = $157.68
        assert!((record.apr - 3.1536).abs() < 1e-6);
        assert!(store.insert_bulk(&records).await.is_ok());

        let bond_only = AprTriggers {
            total_bond: BTreeSet::from(["pair-orai-usdt".to_string()]),
            ..AprTriggers::default()
        };
        let Ok(again) = engine.refresh(&store, &chain, &bond_only, 11, 660).await else {
            panic!("refresh should succeed");
        };
        assert_eq!(again.len(), 1);
        assert_eq!(chain.supply_calls.load(Ordering::SeqCst), 1);
        assert_eq!(chain.bond_calls.load(Ordering::SeqCst), 2);
        assert_eq!(again.first().map(|r| r.total_supply), Some(100));
    }

    #[tokio::test]
    async fn no_triggers_no_queries() {
        let Ok(store) = AnalyticalStore::in_memory().await else {
            panic!("store should open");
        };
        let chain = Chain::default();
        let engine = AprEngine::new(registry());
        let Ok(records) = engine
            .refresh(&store, &chain, &AprTriggers::default(), 1, 0)
            .await
        else {
            panic!("refresh should succeed");
        };
        assert!(records.is_empty());
        assert_eq!(chain.supply_calls.load(Ordering::SeqCst), 0);
    }
}

//! Chain access: raw transaction batches and read-only contract queries.
//!
//! The orchestrator only sees the [`ChainDataSource`] and
//! [`ContractQuerier`] traits. [`rpc`] provides Tendermint RPC backed
//! implementations; tests substitute scripted fakes.

pub mod proto;
pub mod query;
pub mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::asset::uint128;
use crate::domain::{Asset, AssetInfo};
use crate::error::IndexerError;

pub use query::RpcContractQuerier;
pub use rpc::{RpcChainSource, RpcClient};

/// One transaction as delivered by the chain data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    /// Transaction hash (hex).
    pub hash: String,
    /// Block height.
    pub height: u64,
    /// Position within the block.
    pub index: u32,
    /// ABCI result code; non-zero means the transaction failed on-chain.
    pub code: u32,
    /// JSON raw log.
    pub raw_log: String,
    /// Protobuf `TxRaw` bytes.
    pub tx: Vec<u8>,
    /// Block time, unix seconds.
    pub timestamp: i64,
}

/// A segment of chain data plus the offset of the next segment.
#[derive(Debug, Clone, Default)]
pub struct ChainBatch {
    /// Transactions in height order.
    pub transactions: Vec<RawTransaction>,
    /// Offset to request next. Equal to the requested offset when the chain
    /// has no new data.
    pub offset: u64,
}

/// Pull source of chain segments.
///
/// Implementations own their paging, parallelism and retry policy.
#[async_trait]
pub trait ChainDataSource: Send + Sync {
    /// Fetches the segment starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Chain`] when the segment cannot be fetched.
    async fn fetch_batch(&self, offset: u64) -> Result<ChainBatch, IndexerError>;
}

/// Reserves of a pair contract (`pool {}` query).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolResponse {
    /// Both reserves, in the contract's own asset order.
    pub assets: Vec<Asset>,
    /// Total LP share supply.
    #[serde(with = "uint128")]
    pub total_share: u128,
}

impl PoolResponse {
    /// Reserve amount of `denom`, zero when absent.
    #[must_use]
    pub fn amount_of(&self, denom: &str) -> u128 {
        self.assets
            .iter()
            .find(|asset| asset.info.denom() == denom)
            .map_or(0, |asset| asset.amount)
    }
}

/// Pair registration returned by a factory (`pair {asset_infos}` query).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairInfo {
    /// Assets in the factory's order.
    pub asset_infos: Vec<AssetInfo>,
    /// Pair contract address.
    pub contract_addr: String,
    /// LP token contract address.
    pub liquidity_token: String,
    /// Oracle contract, when the pair uses one.
    #[serde(default)]
    pub oracle_addr: Option<String>,
    /// Commission rate as a decimal string.
    #[serde(default)]
    pub commission_rate: Option<String>,
}

/// Read-only on-chain queries. Each call may fail independently; callers
/// treat a failure as "no data".
#[async_trait]
pub trait ContractQuerier: Send + Sync {
    /// Pool reserves, optionally at a historical height.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Query`] when the query fails.
    async fn pool(&self, pair_addr: &str, height: Option<u64>)
    -> Result<PoolResponse, IndexerError>;

    /// LP token total supply.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Query`] when the query fails.
    async fn total_supply(&self, lp_token: &str) -> Result<u128, IndexerError>;

    /// Total LP tokens bonded in the staking pool of `staking_token`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Query`] when the query fails.
    async fn total_bond_amount(&self, staking_token: &str) -> Result<u128, IndexerError>;

    /// Reward assets emitted per second to stakers of `staking_token`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Query`] when the query fails.
    async fn rewards_per_sec(&self, staking_token: &str) -> Result<Vec<Asset>, IndexerError>;

    /// Pair registration for `asset_infos` on `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Query`] when the factory has no such pair or
    /// the query fails.
    async fn pair_info(
        &self,
        factory: &str,
        asset_infos: &[AssetInfo; 2],
    ) -> Result<PairInfo, IndexerError>;
}

//! CosmWasm smart queries over ABCI.

use async_trait::async_trait;
use prost::Message;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;

use super::proto::{QuerySmartContractStateRequest, QuerySmartContractStateResponse, SMART_QUERY_PATH};
use super::rpc::RpcClient;
use super::{ContractQuerier, PairInfo, PoolResponse};
use crate::domain::asset::uint128;
use crate::domain::{Asset, AssetInfo};
use crate::error::IndexerError;

#[derive(Debug, Deserialize)]
struct TokenInfoResponse {
    #[serde(with = "uint128")]
    total_supply: u128,
}

#[derive(Debug, Deserialize)]
struct StakingPoolInfoResponse {
    #[serde(with = "uint128")]
    total_bond_amount: u128,
}

#[derive(Debug, Deserialize)]
struct RewardsPerSecResponse {
    assets: Vec<Asset>,
}

/// [`ContractQuerier`] issuing smart queries through a Tendermint node.
#[derive(Debug, Clone)]
pub struct RpcContractQuerier {
    client: RpcClient,
    staking_contract: String,
}

impl RpcContractQuerier {
    /// Creates a querier that resolves staking queries against
    /// `staking_contract`.
    #[must_use]
    pub fn new(client: RpcClient, staking_contract: &str) -> Self {
        Self {
            client,
            staking_contract: staking_contract.to_string(),
        }
    }

    async fn smart<T: DeserializeOwned>(
        &self,
        contract: &str,
        query: &serde_json::Value,
        height: Option<u64>,
    ) -> Result<T, IndexerError> {
        let request = QuerySmartContractStateRequest {
            address: contract.to_string(),
            query_data: serde_json::to_vec(query)
                .map_err(|e| IndexerError::Internal(format!("encode query: {e}")))?,
        };
        let raw = self
            .client
            .abci_query(SMART_QUERY_PATH, &request.encode_to_vec(), height)
            .await?;
        let response = QuerySmartContractStateResponse::decode(raw.as_slice())
            .map_err(|e| IndexerError::Query(format!("{contract}: {e}")))?;
        serde_json::from_slice(&response.data)
            .map_err(|e| IndexerError::Query(format!("{contract}: unexpected response: {e}")))
    }
}

#[async_trait]
impl ContractQuerier for RpcContractQuerier {
    async fn pool(
        &self,
        pair_addr: &str,
        height: Option<u64>,
    ) -> Result<PoolResponse, IndexerError> {
        self.smart(pair_addr, &json!({ "pool": {} }), height).await
    }

    async fn total_supply(&self, lp_token: &str) -> Result<u128, IndexerError> {
        let info: TokenInfoResponse = self
            .smart(lp_token, &json!({ "token_info": {} }), None)
            .await?;
        Ok(info.total_supply)
    }

    async fn total_bond_amount(&self, staking_token: &str) -> Result<u128, IndexerError> {
        let query = json!({ "pool_info": { "staking_token": staking_token } });
        let info: StakingPoolInfoResponse =
            self.smart(&self.staking_contract, &query, None).await?;
        Ok(info.total_bond_amount)
    }

    async fn rewards_per_sec(&self, staking_token: &str) -> Result<Vec<Asset>, IndexerError> {
        let query = json!({ "rewards_per_sec": { "staking_token": staking_token } });
        let rewards: RewardsPerSecResponse =
            self.smart(&self.staking_contract, &query, None).await?;
        Ok(rewards.assets)
    }

    async fn pair_info(
        &self,
        factory: &str,
        asset_infos: &[AssetInfo; 2],
    ) -> Result<PairInfo, IndexerError> {
        self.smart(factory, &json!({ "pair": { "asset_infos": asset_infos } }), None)
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn staking_responses_decode() {
        let Ok(info) =
            serde_json::from_str::<StakingPoolInfoResponse>(r#"{"total_bond_amount":"42","reward_index":"0"}"#)
        else {
            panic!("pool info should decode");
        };
        assert_eq!(info.total_bond_amount, 42);

        let json = r#"{"assets":[{"info":{"native_token":{"denom":"orai"}},"amount":"7"}]}"#;
        let Ok(rewards) = serde_json::from_str::<RewardsPerSecResponse>(json) else {
            panic!("rewards should decode");
        };
        assert_eq!(rewards.assets.first().map(|a| a.amount), Some(7));
    }

    #[test]
    fn pair_query_serializes_cosmwasm_asset_infos() {
        let infos = [AssetInfo::native("orai"), AssetInfo::token("orai1usdt")];
        let query = json!({ "pair": { "asset_infos": infos } });
        assert_eq!(
            query.to_string(),
            r#"{"pair":{"asset_infos":[{"native_token":{"denom":"orai"}},{"token":{"contract_addr":"orai1usdt"}}]}}"#
        );
    }
}

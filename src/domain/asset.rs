//! CosmWasm asset descriptors.
//!
//! [`AssetInfo`] mirrors the on-chain `{"native_token":{..}}` /
//! `{"token":{..}}` JSON so the same type is used for contract queries,
//! decoded messages and the pair table.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies an asset either by native bank denom or cw20 contract address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetInfo {
    /// Bank-module coin (`orai`, `ibc/...`).
    NativeToken {
        /// Bank denom.
        denom: String,
    },
    /// cw20 token contract.
    Token {
        /// Token contract address.
        contract_addr: String,
    },
}

impl AssetInfo {
    /// Builds a native asset descriptor.
    #[must_use]
    pub fn native(denom: impl Into<String>) -> Self {
        Self::NativeToken {
            denom: denom.into(),
        }
    }

    /// Builds a cw20 asset descriptor.
    #[must_use]
    pub fn token(contract_addr: impl Into<String>) -> Self {
        Self::Token {
            contract_addr: contract_addr.into(),
        }
    }

    /// Returns the denom or contract address, which is how event logs name
    /// the asset.
    #[must_use]
    pub fn denom(&self) -> &str {
        match self {
            Self::NativeToken { denom } => denom,
            Self::Token { contract_addr } => contract_addr,
        }
    }

    /// Returns `true` for bank-module coins.
    #[must_use]
    pub const fn is_native(&self) -> bool {
        matches!(self, Self::NativeToken { .. })
    }
}

impl fmt::Display for AssetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.denom())
    }
}

/// An amount of a given asset, as returned by pair and staking contracts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Asset descriptor.
    pub info: AssetInfo,
    /// Amount in the asset's smallest unit.
    #[serde(with = "uint128")]
    pub amount: u128,
}

/// Serde adapter for CosmWasm `Uint128`, which travels as a JSON string.
pub(crate) mod uint128 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decodes_cosmwasm_asset_json() {
        let json = r#"{"info":{"native_token":{"denom":"orai"}},"amount":"1000"}"#;
        let Ok(asset) = serde_json::from_str::<Asset>(json) else {
            panic!("asset should decode");
        };
        assert_eq!(asset.info, AssetInfo::native("orai"));
        assert_eq!(asset.amount, 1000);
        assert!(asset.info.is_native());
    }

    #[test]
    fn token_denom_is_contract_address() {
        let info = AssetInfo::token("orai12hzjxfh77wl572gdzct2fxv2arxcwh6gykc7qh");
        assert_eq!(info.denom(), "orai12hzjxfh77wl572gdzct2fxv2arxcwh6gykc7qh");
        assert!(!info.is_native());
    }
}

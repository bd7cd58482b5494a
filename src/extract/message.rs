//! Classification of contract execute messages.
//!
//! Each decoded `MsgExecuteContract` is classified once into a
//! [`DexMessage`]; the extractor dispatches on the variant. Anything that is
//! valid JSON but not a recognized shape becomes [`DexMessage::Other`].

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use super::SkipReason;
use crate::chain::proto::MsgExecuteContract;
use crate::domain::asset::uint128;

/// Execute message recognized by the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DexMessage {
    /// `swap` on a pair or `execute_swap_operations` on the router, sent
    /// directly or through a cw20 `send` hook.
    Swap,
    /// `provide_liquidity` on a pair.
    ProvideLiquidity,
    /// `withdraw_liquidity` hook carried by a `send` of LP tokens.
    WithdrawLiquidity {
        /// LP token being returned.
        lp_token: String,
        /// LP amount sent.
        share: u128,
    },
    /// `bond` hook carried by a `send` of LP tokens to the staking contract.
    Bond {
        /// LP token being bonded.
        staking_token: String,
        /// Amount bonded.
        amount: u128,
    },
    /// `unbond` on the staking contract.
    Unbond {
        /// LP token being unbonded.
        staking_token: String,
        /// Amount unbonded.
        amount: u128,
    },
    /// `update_rewards_per_sec` on the staking contract.
    UpdateRewardsPerSec {
        /// LP token whose reward rate changed.
        staking_token: String,
    },
    /// Anything else.
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ExecuteMsg {
    ExecuteSwapOperations {},
    Swap {},
    ProvideLiquidity {},
    Send(SendMsg),
    Unbond(UnbondMsg),
    UpdateRewardsPerSec(UpdateRewardsMsg),
}

#[derive(Debug, Deserialize)]
struct SendMsg {
    #[serde(with = "uint128")]
    amount: u128,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UnbondMsg {
    staking_token: String,
    #[serde(with = "uint128")]
    amount: u128,
}

#[derive(Debug, Deserialize)]
struct UpdateRewardsMsg {
    staking_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum HookMsg {
    ExecuteSwapOperations {},
    Swap {},
    WithdrawLiquidity {},
    Bond {},
}

/// Classifies one execute message.
///
/// # Errors
///
/// Returns [`SkipReason::UnparseableMessage`] when the message body, or the
/// base64 hook of a `send`, is not valid JSON.
pub fn classify(msg: &MsgExecuteContract, msg_index: usize) -> Result<DexMessage, SkipReason> {
    let value: serde_json::Value = serde_json::from_slice(&msg.msg)
        .map_err(|_| SkipReason::UnparseableMessage { msg_index })?;
    let Ok(execute) = serde_json::from_value::<ExecuteMsg>(value) else {
        return Ok(DexMessage::Other);
    };

    let classified = match execute {
        ExecuteMsg::ExecuteSwapOperations {} | ExecuteMsg::Swap {} => DexMessage::Swap,
        ExecuteMsg::ProvideLiquidity {} => DexMessage::ProvideLiquidity,
        ExecuteMsg::Unbond(unbond) => DexMessage::Unbond {
            staking_token: unbond.staking_token,
            amount: unbond.amount,
        },
        ExecuteMsg::UpdateRewardsPerSec(update) => DexMessage::UpdateRewardsPerSec {
            staking_token: update.staking_token,
        },
        ExecuteMsg::Send(send) => {
            let Some(encoded) = send.msg else {
                return Ok(DexMessage::Other);
            };
            let hook = STANDARD
                .decode(encoded.as_bytes())
                .ok()
                .and_then(|bytes| serde_json::from_slice::<serde_json::Value>(&bytes).ok())
                .ok_or(SkipReason::UnparseableMessage { msg_index })?;
            match serde_json::from_value::<HookMsg>(hook) {
                Ok(HookMsg::ExecuteSwapOperations {} | HookMsg::Swap {}) => DexMessage::Swap,
                Ok(HookMsg::WithdrawLiquidity {}) => DexMessage::WithdrawLiquidity {
                    lp_token: msg.contract.clone(),
                    share: send.amount,
                },
                Ok(HookMsg::Bond {}) => DexMessage::Bond {
                    staking_token: msg.contract.clone(),
                    amount: send.amount,
                },
                Err(_) => DexMessage::Other,
            }
        }
    };
    Ok(classified)
}

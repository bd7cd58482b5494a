//! Minimal protobuf messages for decoding Cosmos SDK transactions and
//! CosmWasm smart queries.
//!
//! Only the fields the indexer reads are declared; prost skips the rest.

use prost::Message;

use crate::error::IndexerError;

/// Type URL of a CosmWasm contract execution.
pub const MSG_EXECUTE_CONTRACT_TYPE_URL: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";

/// ABCI query path for CosmWasm smart queries.
pub const SMART_QUERY_PATH: &str = "/cosmwasm.wasm.v1.Query/SmartContractState";

/// `cosmos.tx.v1beta1.TxRaw`.
#[derive(Clone, PartialEq, Message)]
pub struct TxRaw {
    /// Encoded `TxBody`.
    #[prost(bytes = "vec", tag = "1")]
    pub body_bytes: Vec<u8>,
    /// Encoded `AuthInfo`.
    #[prost(bytes = "vec", tag = "2")]
    pub auth_info_bytes: Vec<u8>,
    /// Signatures, one per signer.
    #[prost(bytes = "vec", repeated, tag = "3")]
    pub signatures: Vec<Vec<u8>>,
}

/// `cosmos.tx.v1beta1.TxBody`.
#[derive(Clone, PartialEq, Message)]
pub struct TxBody {
    /// Messages in execution order.
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<prost_types::Any>,
    /// Free-form memo.
    #[prost(string, tag = "2")]
    pub memo: String,
    /// Timeout height.
    #[prost(uint64, tag = "3")]
    pub timeout_height: u64,
}

/// `cosmos.base.v1beta1.Coin`.
#[derive(Clone, PartialEq, Message)]
pub struct Coin {
    /// Bank denom.
    #[prost(string, tag = "1")]
    pub denom: String,
    /// Amount as a decimal string.
    #[prost(string, tag = "2")]
    pub amount: String,
}

/// `cosmwasm.wasm.v1.MsgExecuteContract`.
#[derive(Clone, PartialEq, Message)]
pub struct MsgExecuteContract {
    /// Signer executing the contract.
    #[prost(string, tag = "1")]
    pub sender: String,
    /// Contract being executed.
    #[prost(string, tag = "2")]
    pub contract: String,
    /// JSON execute message.
    #[prost(bytes = "vec", tag = "3")]
    pub msg: Vec<u8>,
    /// Funds attached to the execution.
    #[prost(message, repeated, tag = "5")]
    pub funds: Vec<Coin>,
}

/// `cosmwasm.wasm.v1.QuerySmartContractStateRequest`.
#[derive(Clone, PartialEq, Message)]
pub struct QuerySmartContractStateRequest {
    /// Contract to query.
    #[prost(string, tag = "1")]
    pub address: String,
    /// JSON query message.
    #[prost(bytes = "vec", tag = "2")]
    pub query_data: Vec<u8>,
}

/// `cosmwasm.wasm.v1.QuerySmartContractStateResponse`.
#[derive(Clone, PartialEq, Message)]
pub struct QuerySmartContractStateResponse {
    /// JSON query response.
    #[prost(bytes = "vec", tag = "1")]
    pub data: Vec<u8>,
}

/// Decodes raw transaction bytes into the contract executions they carry,
/// each with its position among all of the transaction's messages. Non-wasm
/// messages are dropped but still count towards positions.
///
/// # Errors
///
/// Returns [`IndexerError::Decode`] if the envelope or body is not valid
/// protobuf.
pub fn decode_execute_msgs(
    tx_bytes: &[u8],
) -> Result<Vec<(usize, MsgExecuteContract)>, IndexerError> {
    let raw = TxRaw::decode(tx_bytes).map_err(|e| IndexerError::Decode(format!("tx raw: {e}")))?;
    let body = TxBody::decode(raw.body_bytes.as_slice())
        .map_err(|e| IndexerError::Decode(format!("tx body: {e}")))?;

    body.messages
        .iter()
        .enumerate()
        .filter(|(_, any)| any.type_url == MSG_EXECUTE_CONTRACT_TYPE_URL)
        .map(|(idx, any)| {
            MsgExecuteContract::decode(any.value.as_slice())
                .map(|msg| (idx, msg))
                .map_err(|e| IndexerError::Decode(format!("execute msg: {e}")))
        })
        .collect()
}

/// Encodes contract executions into raw transaction bytes. Used to build
/// fixtures.
#[must_use]
pub fn encode_execute_msgs(msgs: &[MsgExecuteContract]) -> Vec<u8> {
    let body = TxBody {
        messages: msgs
            .iter()
            .map(|msg| prost_types::Any {
                type_url: MSG_EXECUTE_CONTRACT_TYPE_URL.to_string(),
                value: msg.encode_to_vec(),
            })
            .collect(),
        memo: String::new(),
        timeout_height: 0,
    };
    TxRaw {
        body_bytes: body.encode_to_vec(),
        auth_info_bytes: Vec::new(),
        signatures: Vec::new(),
    }
    .encode_to_vec()
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn decode_keeps_wasm_messages_with_their_tx_position() {
        let first = MsgExecuteContract {
            sender: "orai1sender".to_string(),
            contract: "orai1pair".to_string(),
            msg: br#"{"swap":{}}"#.to_vec(),
            funds: vec![],
        };
        let second = MsgExecuteContract {
            contract: "orai1router".to_string(),
            ..first.clone()
        };
        let body = TxBody {
            messages: vec![
                prost_types::Any {
                    type_url: MSG_EXECUTE_CONTRACT_TYPE_URL.to_string(),
                    value: first.encode_to_vec(),
                },
                prost_types::Any {
                    type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
                    value: vec![],
                },
                prost_types::Any {
                    type_url: MSG_EXECUTE_CONTRACT_TYPE_URL.to_string(),
                    value: second.encode_to_vec(),
                },
            ],
            memo: String::new(),
            timeout_height: 0,
        };
        let raw = TxRaw {
            body_bytes: body.encode_to_vec(),
            auth_info_bytes: vec![],
            signatures: vec![],
        };

        let Ok(msgs) = decode_execute_msgs(&raw.encode_to_vec()) else {
            panic!("tx should decode");
        };
        let decoded: Vec<(usize, &str)> = msgs
            .iter()
            .map(|(idx, m)| (*idx, m.contract.as_str()))
            .collect();
        assert_eq!(decoded, vec![(0, "orai1pair"), (2, "orai1router")]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let result = decode_execute_msgs(&[0xff, 0xff, 0xff]);
        assert!(matches!(result, Err(IndexerError::Decode(_))));
    }
}

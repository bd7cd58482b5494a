//! Raw log parsing and attribute extraction.

use std::collections::HashMap;

use serde::Deserialize;

use super::SkipReason;
use crate::chain::proto::MsgExecuteContract;

/// One entry of a transaction's JSON raw log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TxLog {
    /// Message index reported by the node, when present.
    #[serde(default)]
    pub msg_index: Option<u32>,
    /// Events emitted while executing the message.
    #[serde(default)]
    pub events: Vec<LogEvent>,
}

/// A typed event inside a log entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogEvent {
    /// Event type, e.g. `wasm`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Ordered attributes.
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

/// A key/value attribute.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Attribute {
    /// Attribute key.
    pub key: String,
    /// Attribute value.
    #[serde(default)]
    pub value: String,
}

impl TxLog {
    /// Iterates over the attributes of every `wasm` event, in order.
    pub fn wasm_attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.events
            .iter()
            .filter(|event| event.kind == "wasm")
            .flat_map(|event| event.attributes.iter())
    }
}

/// Parses a JSON raw log. An empty log yields no entries.
///
/// # Errors
///
/// Returns [`SkipReason::UnparseableLog`] when the log is not the expected
/// JSON array.
pub fn parse_raw_log(raw_log: &str) -> Result<Vec<TxLog>, SkipReason> {
    if raw_log.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw_log).map_err(|e| SkipReason::UnparseableLog(e.to_string()))
}

/// Pairs each decoded message with the log entry of the same message index.
///
/// Entries carrying `msg_index` match on it; entries without one take their
/// position in the log. Messages without a matching entry get `None`.
#[must_use]
pub fn pair_messages_with_logs<'a>(
    msgs: &'a [(usize, MsgExecuteContract)],
    logs: &'a [TxLog],
) -> Vec<(usize, &'a MsgExecuteContract, Option<&'a TxLog>)> {
    let by_index: HashMap<usize, &TxLog> = logs
        .iter()
        .enumerate()
        .map(|(pos, log)| {
            let idx = log
                .msg_index
                .and_then(|idx| usize::try_from(idx).ok())
                .unwrap_or(pos);
            (idx, log)
        })
        .collect();
    msgs.iter()
        .map(|(idx, msg)| (*idx, msg, by_index.get(idx).copied()))
        .collect()
}

/// One swap hop as reported by the pair contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapAttributes {
    /// Offered denom.
    pub offer_asset: String,
    /// Asked denom.
    pub ask_asset: String,
    /// Offered amount.
    pub offer_amount: u128,
    /// Returned amount.
    pub return_amount: u128,
    /// Tax amount.
    pub tax_amount: u128,
    /// Commission amount.
    pub commission_amount: u128,
    /// Spread amount.
    pub spread_amount: u128,
}

const SWAP_KEYS: [&str; 7] = [
    "offer_asset",
    "ask_asset",
    "offer_amount",
    "return_amount",
    "tax_amount",
    "commission_amount",
    "spread_amount",
];

/// Collects the repeated swap attribute groups of a log entry, one per hop.
///
/// # Errors
///
/// Returns [`SkipReason::MalformedSwapAttributes`] when the groups have
/// unequal lengths or an amount does not parse, and
/// [`SkipReason::MissingSwapAttributes`] when the entry holds no hop at all.
pub fn swap_attributes(log: &TxLog, msg_index: usize) -> Result<Vec<SwapAttributes>, SkipReason> {
    let mut columns: [Vec<&str>; 7] = Default::default();
    for attr in log.wasm_attributes() {
        let column = SWAP_KEYS
            .iter()
            .position(|key| *key == attr.key)
            .and_then(|pos| columns.get_mut(pos));
        if let Some(column) = column {
            column.push(attr.value.as_str());
        }
    }

    let [offer, ask, offer_amt, return_amt, tax, commission, spread] = &columns;
    let hops = offer.len();
    if columns.iter().any(|column| column.len() != hops) {
        return Err(SkipReason::MalformedSwapAttributes { msg_index });
    }
    if hops == 0 {
        return Err(SkipReason::MissingSwapAttributes { msg_index });
    }

    let amount = |raw: &str| -> Result<u128, SkipReason> {
        raw.parse()
            .map_err(|_| SkipReason::MalformedSwapAttributes { msg_index })
    };

    let mut out = Vec::with_capacity(hops);
    for hop in 0..hops {
        out.push(SwapAttributes {
            offer_asset: nth(offer, hop).to_string(),
            ask_asset: nth(ask, hop).to_string(),
            offer_amount: amount(nth(offer_amt, hop))?,
            return_amount: amount(nth(return_amt, hop))?,
            tax_amount: amount(nth(tax, hop))?,
            commission_amount: amount(nth(commission, hop))?,
            spread_amount: amount(nth(spread, hop))?,
        });
    }
    Ok(out)
}

fn nth<'a>(column: &[&'a str], hop: usize) -> &'a str {
    column.get(hop).copied().unwrap_or_default()
}

/// Attributes of one provide or withdraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidityAttributes {
    /// Pair contract that emitted the attributes.
    pub pair_addr: String,
    /// The two `(amount, denom)` legs in on-chain order.
    pub assets: [(u128, String); 2],
    /// LP shares minted or burned.
    pub share: Option<u128>,
}

/// Finds the liquidity attribute groups emitted for `action`
/// (`provide_liquidity` or `withdraw_liquidity`).
///
/// # Errors
///
/// Returns [`SkipReason::MalformedLiquidityAttributes`] when an action is
/// found but its asset list does not parse.
pub fn liquidity_attributes(
    log: &TxLog,
    action: &str,
    msg_index: usize,
) -> Result<Vec<LiquidityAttributes>, SkipReason> {
    let (assets_key, share_key) = if action == "withdraw_liquidity" {
        ("refund_assets", "withdrawn_share")
    } else {
        ("assets", "share")
    };

    let mut groups = Vec::new();
    let mut contract = "";
    let mut current: Option<(String, Option<&str>, Option<&str>)> = None;
    for attr in log.wasm_attributes() {
        match attr.key.as_str() {
            "_contract_address" => contract = attr.value.as_str(),
            "action" => {
                groups.extend(current.take());
                if attr.value == action {
                    current = Some((contract.to_string(), None, None));
                }
            }
            key if key == assets_key => {
                if let Some((_, assets, _)) = current.as_mut() {
                    *assets = Some(attr.value.as_str());
                }
            }
            key if key == share_key => {
                if let Some((_, _, share)) = current.as_mut() {
                    *share = Some(attr.value.as_str());
                }
            }
            _ => {}
        }
    }
    groups.extend(current);

    groups
        .into_iter()
        .map(|(pair_addr, assets, share)| {
            let malformed = || SkipReason::MalformedLiquidityAttributes { msg_index };
            let assets = parse_asset_pair(assets.ok_or_else(malformed)?).ok_or_else(malformed)?;
            let share = match share {
                Some(raw) => Some(raw.parse().map_err(|_| malformed())?),
                None => None,
            };
            Ok(LiquidityAttributes {
                pair_addr,
                assets,
                share,
            })
        })
        .collect()
}

/// Parses `"<amount><denom>"`.
#[must_use]
pub fn parse_asset(raw: &str) -> Option<(u128, String)> {
    let raw = raw.trim();
    let split = raw.find(|c: char| !c.is_ascii_digit())?;
    let (amount, denom) = raw.split_at(split);
    Some((amount.parse().ok()?, denom.to_string()))
}

/// Parses `"<amount><denom>, <amount><denom>"`.
#[must_use]
pub fn parse_asset_pair(raw: &str) -> Option<[(u128, String); 2]> {
    let mut legs = raw.split(',').map(parse_asset);
    let first = legs.next()??;
    let second = legs.next()??;
    if legs.next().is_some() {
        return None;
    }
    Some([first, second])
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::{Attribute, LogEvent, TxLog};

    /// Builds a log entry with one `wasm` event.
    pub(crate) fn wasm_log(attrs: &[(&str, &str)]) -> TxLog {
        TxLog {
            msg_index: None,
            events: vec![LogEvent {
                kind: "wasm".to_string(),
                attributes: attrs
                    .iter()
                    .map(|(key, value)| Attribute {
                        key: (*key).to_string(),
                        value: (*value).to_string(),
                    })
                    .collect(),
            }],
        }
    }
}

//! Event Extractor: raw transactions to typed DEX events.
//!
//! Extraction never fails a batch. A transaction that cannot be decoded,
//! a log that cannot be parsed, a malformed attribute group or a swap on an
//! unknown pair produces a [`SkipReason`] next to whatever events could be
//! extracted from the rest of the transaction.
//!
//! Liquidity events read the pool at their own height through the
//! [`ContractQuerier`], so they are extracted sequentially.

pub mod fee;
pub mod logs;
pub mod message;

use std::sync::Arc;

use crate::chain::proto::{MsgExecuteContract, decode_execute_msgs};
use crate::chain::{ContractQuerier, RawTransaction};
use crate::domain::{
    DexEvent, LiquidityEvent, LiquidityOp, Orientation, PairMetadata, PairRegistry,
    StakingAction, StakingEvent, SwapEvent, unique_key,
};
use fee::{PoolState, liquidity_fee};
use logs::{TxLog, liquidity_attributes, pair_messages_with_logs, parse_raw_log, swap_attributes};
use message::{DexMessage, classify};

/// Why (part of) a transaction produced no events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The transaction failed on-chain.
    FailedTransaction {
        /// ABCI result code.
        code: u32,
    },
    /// The transaction body is not valid protobuf.
    UndecodableTx(String),
    /// The raw log is not the expected JSON.
    UnparseableLog(String),
    /// A message body or its `send` hook is not valid JSON.
    UnparseableMessage {
        /// Position of the message in the transaction.
        msg_index: usize,
    },
    /// A recognized message has no log entry.
    MissingLog {
        /// Position of the message in the transaction.
        msg_index: usize,
    },
    /// A swap message's log entry holds no swap attributes.
    MissingSwapAttributes {
        /// Position of the message in the transaction.
        msg_index: usize,
    },
    /// Swap attribute groups have unequal lengths or bad amounts.
    MalformedSwapAttributes {
        /// Position of the message in the transaction.
        msg_index: usize,
    },
    /// Liquidity attributes are missing or do not parse.
    MalformedLiquidityAttributes {
        /// Position of the message in the transaction.
        msg_index: usize,
    },
    /// No configured pair holds both denoms.
    NoMatchingPair {
        /// First denom as seen on-chain.
        first: String,
        /// Second denom as seen on-chain.
        second: String,
    },
}

/// Events and skips produced from one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxExtraction {
    /// Extracted events in message order.
    pub events: Vec<DexEvent>,
    /// Tolerated data-quality failures.
    pub skipped: Vec<SkipReason>,
}

impl TxExtraction {
    fn skip(reason: SkipReason) -> Self {
        Self {
            events: Vec::new(),
            skipped: vec![reason],
        }
    }

    /// Swap events only.
    pub fn swaps(&self) -> impl Iterator<Item = &SwapEvent> {
        self.events.iter().filter_map(|event| match event {
            DexEvent::Swap(swap) => Some(swap),
            _ => None,
        })
    }

    /// Liquidity events only.
    pub fn liquidity(&self) -> impl Iterator<Item = &LiquidityEvent> {
        self.events.iter().filter_map(|event| match event {
            DexEvent::Liquidity(liquidity) => Some(liquidity),
            _ => None,
        })
    }
}

/// A recognized message together with the transaction and log it came from.
#[derive(Clone, Copy)]
struct LiquiditySource<'a> {
    tx: &'a RawTransaction,
    msg: &'a MsgExecuteContract,
    log: &'a TxLog,
    msg_index: usize,
}

/// Converts raw transactions into [`DexEvent`]s using the pair registry
/// for orientation.
#[derive(Debug, Clone)]
pub struct EventExtractor {
    registry: Arc<PairRegistry>,
}

impl EventExtractor {
    /// Creates an extractor over `registry`.
    #[must_use]
    pub fn new(registry: Arc<PairRegistry>) -> Self {
        Self { registry }
    }

    /// Extracts every recognized event from `tx`.
    pub async fn extract<Q>(&self, tx: &RawTransaction, querier: &Q) -> TxExtraction
    where
        Q: ContractQuerier + ?Sized,
    {
        if tx.code != 0 {
            return TxExtraction::skip(SkipReason::FailedTransaction { code: tx.code });
        }
        let msgs = match decode_execute_msgs(&tx.tx) {
            Ok(msgs) => msgs,
            Err(e) => return TxExtraction::skip(SkipReason::UndecodableTx(e.to_string())),
        };
        let logs = match parse_raw_log(&tx.raw_log) {
            Ok(logs) => logs,
            Err(reason) => return TxExtraction::skip(reason),
        };

        let mut out = TxExtraction::default();
        for (msg_index, msg, log) in pair_messages_with_logs(&msgs, &logs) {
            let classified = match classify(msg, msg_index) {
                Ok(classified) => classified,
                Err(reason) => {
                    out.skipped.push(reason);
                    continue;
                }
            };
            match classified {
                DexMessage::Other => {}
                DexMessage::Bond {
                    staking_token,
                    amount,
                } => out.events.push(staking(tx, StakingAction::Bond, staking_token, amount)),
                DexMessage::Unbond {
                    staking_token,
                    amount,
                } => out.events.push(staking(tx, StakingAction::Unbond, staking_token, amount)),
                DexMessage::UpdateRewardsPerSec { staking_token } => out.events.push(staking(
                    tx,
                    StakingAction::UpdateRewardsPerSec,
                    staking_token,
                    0,
                )),
                DexMessage::Swap => match log {
                    Some(log) => self.extract_swaps(tx, msg, log, msg_index, &mut out),
                    None => out.skipped.push(SkipReason::MissingLog { msg_index }),
                },
                DexMessage::ProvideLiquidity | DexMessage::WithdrawLiquidity { .. } => {
                    let Some(log) = log else {
                        out.skipped.push(SkipReason::MissingLog { msg_index });
                        continue;
                    };
                    let (op, sent_share) = match classified {
                        DexMessage::WithdrawLiquidity { share, .. } => {
                            (LiquidityOp::Withdraw, Some(share))
                        }
                        _ => (LiquidityOp::Provide, None),
                    };
                    let source = LiquiditySource {
                        tx,
                        msg,
                        log,
                        msg_index,
                    };
                    self.extract_liquidity(&source, op, sent_share, querier, &mut out)
                        .await;
                }
            }
        }

        for reason in &out.skipped {
            tracing::debug!(tx = %tx.hash, height = tx.height, ?reason, "skipped message");
        }
        out
    }

    fn extract_swaps(
        &self,
        tx: &RawTransaction,
        msg: &MsgExecuteContract,
        log: &TxLog,
        msg_index: usize,
        out: &mut TxExtraction,
    ) {
        let hops = match swap_attributes(log, msg_index) {
            Ok(hops) => hops,
            Err(reason) => {
                out.skipped.push(reason);
                return;
            }
        };
        for hop in hops {
            let Some((pair, direction)) = self.registry.swap_direction(&hop.offer_asset, &hop.ask_asset)
            else {
                out.skipped.push(SkipReason::NoMatchingPair {
                    first: hop.offer_asset,
                    second: hop.ask_asset,
                });
                continue;
            };
            out.events.push(DexEvent::Swap(SwapEvent {
                tx_hash: tx.hash.clone(),
                unique_key: unique_key(
                    tx.height,
                    &hop.offer_asset,
                    hop.offer_amount,
                    &hop.ask_asset,
                    hop.return_amount,
                ),
                offer_denom: hop.offer_asset,
                offer_amount: hop.offer_amount,
                ask_denom: hop.ask_asset,
                return_amount: hop.return_amount,
                tax_amount: hop.tax_amount,
                commission_amount: hop.commission_amount,
                spread_amount: hop.spread_amount,
                direction,
                pair_addr: pair.pair_addr.clone(),
                pair_key: pair.pair_key(),
                sender: msg.sender.clone(),
                height: tx.height,
                tx_index: tx.index,
                msg_index: msg_position(msg_index),
                timestamp: tx.timestamp,
            }));
        }
    }

    async fn extract_liquidity<Q>(
        &self,
        source: &LiquiditySource<'_>,
        op: LiquidityOp,
        sent_share: Option<u128>,
        querier: &Q,
        out: &mut TxExtraction,
    ) where
        Q: ContractQuerier + ?Sized,
    {
        let LiquiditySource {
            tx,
            msg,
            log,
            msg_index,
        } = *source;
        let action = match op {
            LiquidityOp::Provide => "provide_liquidity",
            LiquidityOp::Withdraw => "withdraw_liquidity",
        };
        let groups = match liquidity_attributes(log, action, msg_index) {
            Ok(groups) if !groups.is_empty() => groups,
            Ok(_) => {
                out.skipped
                    .push(SkipReason::MalformedLiquidityAttributes { msg_index });
                return;
            }
            Err(reason) => {
                out.skipped.push(reason);
                return;
            }
        };

        for group in groups {
            let [(first_amount, first_denom), (second_amount, second_denom)] = group.assets;
            let Some((pair, orientation)) = self.registry.find(&first_denom, &second_denom) else {
                out.skipped.push(SkipReason::NoMatchingPair {
                    first: first_denom,
                    second: second_denom,
                });
                continue;
            };
            let (base_amount, quote_amount) = match orientation {
                Orientation::Canonical => (first_amount, second_amount),
                Orientation::Reversed => (second_amount, first_amount),
            };
            let pair_addr = if group.pair_addr.is_empty() {
                pair.pair_addr.clone()
            } else {
                group.pair_addr
            };
            let share = group.share.or(sent_share).unwrap_or_default();
            let pool = pool_at(querier, pair, &pair_addr, tx.height).await;

            out.events.push(DexEvent::Liquidity(LiquidityEvent {
                tx_hash: tx.hash.clone(),
                unique_key: unique_key(
                    tx.height,
                    pair.base.denom(),
                    base_amount,
                    pair.quote.denom(),
                    quote_amount,
                ),
                base_denom: pair.base.denom().to_string(),
                base_amount,
                quote_denom: pair.quote.denom().to_string(),
                quote_amount,
                base_reserve: pool.base_reserve,
                quote_reserve: pool.quote_reserve,
                base_price: base_price(base_amount, quote_amount),
                op_type: op,
                protocol_fee: liquidity_fee(pair, &pool, share),
                share,
                creator: msg.sender.clone(),
                pair_addr,
                height: tx.height,
                tx_index: tx.index,
                msg_index: msg_position(msg_index),
                timestamp: tx.timestamp,
            }));
        }
    }
}

async fn pool_at<Q>(querier: &Q, pair: &PairMetadata, pair_addr: &str, height: u64) -> PoolState
where
    Q: ContractQuerier + ?Sized,
{
    match querier.pool(pair_addr, Some(height)).await {
        Ok(pool) => PoolState::from_response(pair, &pool),
        Err(e) => {
            tracing::warn!(%pair_addr, height, error = %e, "pool query failed, fee set to zero");
            PoolState::default()
        }
    }
}

fn msg_position(msg_index: usize) -> u32 {
    u32::try_from(msg_index).unwrap_or(u32::MAX)
}

#[allow(clippy::cast_precision_loss)]
fn base_price(base_amount: u128, quote_amount: u128) -> f64 {
    if base_amount == 0 {
        return 0.0;
    }
    quote_amount as f64 / base_amount as f64
}

fn staking(
    tx: &RawTransaction,
    action: StakingAction,
    staking_token: String,
    amount: u128,
) -> DexEvent {
    DexEvent::Staking(StakingEvent {
        action,
        staking_token,
        amount,
        tx_hash: tx.hash.clone(),
        height: tx.height,
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use prost::Message;

    use super::*;
    use crate::chain::proto::{MSG_EXECUTE_CONTRACT_TYPE_URL, TxBody, TxRaw, encode_execute_msgs};
    use crate::chain::{PairInfo, PoolResponse};
    use crate::domain::pair::{ORAI_DENOM, USDT_CONTRACT};
    use crate::domain::{Asset, AssetInfo, Direction};
    use crate::error::IndexerError;

    #[derive(Debug, Default)]
    struct FakeQuerier {
        pools: HashMap<String, PoolResponse>,
    }

    #[async_trait]
    impl ContractQuerier for FakeQuerier {
        async fn pool(
            &self,
            pair_addr: &str,
            _height: Option<u64>,
        ) -> Result<PoolResponse, IndexerError> {
            self.pools
                .get(pair_addr)
                .cloned()
                .ok_or_else(|| IndexerError::Query(format!("no pool {pair_addr}")))
        }

        async fn total_supply(&self, _lp_token: &str) -> Result<u128, IndexerError> {
            Ok(0)
        }

        async fn total_bond_amount(&self, _staking_token: &str) -> Result<u128, IndexerError> {
            Ok(0)
        }

        async fn rewards_per_sec(&self, _staking_token: &str) -> Result<Vec<Asset>, IndexerError> {
            Ok(Vec::new())
        }

        async fn pair_info(
            &self,
            _factory: &str,
            _asset_infos: &[AssetInfo; 2],
        ) -> Result<PairInfo, IndexerError> {
            Err(IndexerError::Query("unused".to_string()))
        }
    }

    fn extractor() -> EventExtractor {
        let pairs = vec![
            PairMetadata::new(
                AssetInfo::native(ORAI_DENOM),
                AssetInfo::token(USDT_CONTRACT),
                "ORAI",
                "USDT",
            )
            .with_addresses("orai1pair", "orai1lp"),
        ];
        EventExtractor::new(Arc::new(PairRegistry::new(pairs)))
    }

    fn tx(msgs: &[(&str, String)], raw_log: &str) -> RawTransaction {
        let msgs: Vec<MsgExecuteContract> = msgs
            .iter()
            .map(|(contract, json)| MsgExecuteContract {
                sender: "orai1trader".to_string(),
                contract: (*contract).to_string(),
                msg: json.as_bytes().to_vec(),
                funds: vec![],
            })
            .collect();
        RawTransaction {
            hash: "ABC".to_string(),
            height: 100,
            index: 0,
            code: 0,
            raw_log: raw_log.to_string(),
            tx: encode_execute_msgs(&msgs),
            timestamp: 1_700_000_005,
        }
    }

    fn wasm_log(attrs: &[(&str, &str)]) -> String {
        let attrs: Vec<serde_json::Value> = attrs
            .iter()
            .map(|(k, v)| serde_json::json!({ "key": k, "value": v }))
            .collect();
        serde_json::json!([{ "events": [{ "type": "wasm", "attributes": attrs }] }]).to_string()
    }

    #[tokio::test]
    async fn failed_transactions_yield_nothing() {
        let mut failed = tx(&[("orai1pair", r#"{"swap":{}}"#.to_string())], "");
        failed.code = 5;
        let out = extractor().extract(&failed, &FakeQuerier::default()).await;
        assert!(out.events.is_empty());
        assert_eq!(out.skipped, vec![SkipReason::FailedTransaction { code: 5 }]);
    }

    #[tokio::test]
    async fn swap_direction_follows_canonical_pair() {
        let log = wasm_log(&[
            ("offer_asset", USDT_CONTRACT),
            ("ask_asset", ORAI_DENOM),
            ("offer_amount", "300"),
            ("return_amount", "100"),
            ("tax_amount", "0"),
            ("commission_amount", "1"),
            ("spread_amount", "0"),
        ]);
        let raw = tx(&[("orai1router", r#"{"execute_swap_operations":{}}"#.to_string())], &log);
        let out = extractor().extract(&raw, &FakeQuerier::default()).await;
        let swaps: Vec<&SwapEvent> = out.swaps().collect();
        let Some(swap) = swaps.first() else {
            panic!("one swap expected");
        };
        assert_eq!(swap.direction, Direction::Buy);
        assert_eq!(swap.pair_addr, "orai1pair");
        assert_eq!(swap.unique_key, format!("100-{USDT_CONTRACT}-300-orai-100"));
        assert_eq!(swap.pair_key, format!("orai-{USDT_CONTRACT}"));
    }

    const ORAI_TO_USDT: [(&str, &str); 7] = [
        ("offer_asset", ORAI_DENOM),
        ("ask_asset", USDT_CONTRACT),
        ("offer_amount", "100"),
        ("return_amount", "250"),
        ("tax_amount", "0"),
        ("commission_amount", "1"),
        ("spread_amount", "0"),
    ];

    fn wasm_event(attrs: &[(&str, &str)]) -> serde_json::Value {
        let attrs: Vec<serde_json::Value> = attrs
            .iter()
            .map(|(k, v)| serde_json::json!({ "key": k, "value": v }))
            .collect();
        serde_json::json!({ "type": "wasm", "attributes": attrs })
    }

    /// A bank send followed by a swap on the pair.
    fn send_then_swap(raw_log: String) -> RawTransaction {
        let swap = MsgExecuteContract {
            sender: "orai1trader".to_string(),
            contract: "orai1pair".to_string(),
            msg: br#"{"swap":{}}"#.to_vec(),
            funds: vec![],
        };
        let body = TxBody {
            messages: vec![
                prost_types::Any {
                    type_url: "/cosmos.bank.v1beta1.MsgSend".to_string(),
                    value: vec![],
                },
                prost_types::Any {
                    type_url: MSG_EXECUTE_CONTRACT_TYPE_URL.to_string(),
                    value: swap.encode_to_vec(),
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
        RawTransaction {
            hash: "MIXED".to_string(),
            height: 100,
            index: 4,
            code: 0,
            raw_log,
            tx: raw.encode_to_vec(),
            timestamp: 1_700_000_005,
        }
    }

    #[tokio::test]
    async fn swap_after_bank_send_reads_its_own_log() {
        let transfer = serde_json::json!({
            "type": "transfer",
            "attributes": [{ "key": "amount", "value": "5orai" }],
        });
        let log = serde_json::json!([
            { "msg_index": 0, "events": [transfer] },
            { "msg_index": 1, "events": [wasm_event(&ORAI_TO_USDT)] },
        ]);
        let raw = send_then_swap(log.to_string());

        let out = extractor().extract(&raw, &FakeQuerier::default()).await;
        assert!(out.skipped.is_empty(), "unexpected skips: {:?}", out.skipped);
        let swaps: Vec<&SwapEvent> = out.swaps().collect();
        assert_eq!(swaps.len(), 1);
        let Some(swap) = swaps.first() else {
            panic!("one swap expected");
        };
        assert_eq!(swap.direction, Direction::Sell);
        assert_eq!((swap.offer_amount, swap.return_amount), (100, 250));
        assert_eq!(swap.position(), (100, 4, 1));
    }

    #[tokio::test]
    async fn swap_log_without_swap_attributes_is_reported() {
        let log = serde_json::json!([
            { "msg_index": 0, "events": [] },
            { "msg_index": 1, "events": [wasm_event(&[("action", "swap")])] },
        ]);
        let raw = send_then_swap(log.to_string());

        let out = extractor().extract(&raw, &FakeQuerier::default()).await;
        assert!(out.events.is_empty());
        assert_eq!(out.skipped, vec![SkipReason::MissingSwapAttributes { msg_index: 1 }]);
    }

    #[tokio::test]
    async fn malformed_swap_groups_are_dropped_but_reported() {
        let log = wasm_log(&[("offer_asset", ORAI_DENOM), ("offer_amount", "1")]);
        let raw = tx(&[("orai1pair", r#"{"swap":{}}"#.to_string())], &log);
        let out = extractor().extract(&raw, &FakeQuerier::default()).await;
        assert!(out.events.is_empty());
        assert_eq!(out.skipped, vec![SkipReason::MalformedSwapAttributes { msg_index: 0 }]);
    }

    #[tokio::test]
    async fn unknown_pairs_are_skipped() {
        let log = wasm_log(&[
            ("offer_asset", "foo"),
            ("ask_asset", "bar"),
            ("offer_amount", "1"),
            ("return_amount", "1"),
            ("tax_amount", "0"),
            ("commission_amount", "0"),
            ("spread_amount", "0"),
        ]);
        let raw = tx(&[("orai1pair", r#"{"swap":{}}"#.to_string())], &log);
        let out = extractor().extract(&raw, &FakeQuerier::default()).await;
        assert!(out.events.is_empty());
        assert!(matches!(out.skipped.first(), Some(SkipReason::NoMatchingPair { .. })));
    }

    #[tokio::test]
    async fn reversed_withdraw_is_normalized_and_taxed() {
        let log = wasm_log(&[
            ("_contract_address", "orai1pair"),
            ("action", "withdraw_liquidity"),
            ("withdrawn_share", "100"),
            ("refund_assets", &format!("400{USDT_CONTRACT}, 1003orai")),
        ]);
        let hook = STANDARD.encode(r#"{"withdraw_liquidity":{}}"#);
        let msg = format!(r#"{{"send":{{"contract":"orai1pair","amount":"100","msg":"{hook}"}}}}"#);
        let raw = tx(&[("orai1lp", msg)], &log);

        let mut querier = FakeQuerier::default();
        querier.pools.insert(
            "orai1pair".to_string(),
            PoolResponse {
                assets: vec![
                    Asset {
                        info: AssetInfo::native(ORAI_DENOM),
                        amount: 1_003,
                    },
                    Asset {
                        info: AssetInfo::token(USDT_CONTRACT),
                        amount: 400,
                    },
                ],
                total_share: 100,
            },
        );

        let out = extractor().extract(&raw, &querier).await;
        let events: Vec<&LiquidityEvent> = out.liquidity().collect();
        let Some(event) = events.first() else {
            panic!("one liquidity event expected");
        };
        assert_eq!(event.op_type, LiquidityOp::Withdraw);
        assert_eq!(event.base_denom, ORAI_DENOM);
        assert_eq!(event.base_amount, 1_003);
        assert_eq!(event.quote_amount, 400);
        assert_eq!(event.share, 100);
        // native ORAI refund of 1003 is taxed 3, cw20 USDT is not
        assert_eq!(event.protocol_fee, 3);
        assert_eq!(event.unique_key, format!("100-orai-1003-{USDT_CONTRACT}-400"));
    }

    #[tokio::test]
    async fn failed_pool_query_zeroes_fee() {
        let log = wasm_log(&[
            ("_contract_address", "orai1pair"),
            ("action", "provide_liquidity"),
            ("assets", &format!("10orai, 20{USDT_CONTRACT}")),
            ("share", "5"),
        ]);
        let raw = tx(&[("orai1pair", r#"{"provide_liquidity":{}}"#.to_string())], &log);
        let out = extractor().extract(&raw, &FakeQuerier::default()).await;
        let events: Vec<&LiquidityEvent> = out.liquidity().collect();
        assert_eq!(events.len(), 1);
        assert!(events.first().is_some_and(|e| e.protocol_fee == 0 && e.base_reserve == 0));
        assert!(events.first().is_some_and(|e| (e.base_price - 2.0).abs() < f64::EPSILON));
    }

    #[tokio::test]
    async fn staking_messages_need_no_log() {
        let raw = tx(
            &[(
                "orai1staking",
                r#"{"update_rewards_per_sec":{"staking_token":"orai1lp","assets":[]}}"#.to_string(),
            )],
            "",
        );
        let out = extractor().extract(&raw, &FakeQuerier::default()).await;
        assert!(matches!(
            out.events.first(),
            Some(DexEvent::Staking(StakingEvent {
                action: StakingAction::UpdateRewardsPerSec,
                ..
            }))
        ));
    }
}

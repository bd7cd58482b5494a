//! End-to-end tests of the sync loop over a scripted chain and an in-memory
//! store.

#![allow(clippy::panic)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use oraidex_indexer::chain::proto::{MsgExecuteContract, encode_execute_msgs};
use oraidex_indexer::chain::{
    ChainBatch, ChainDataSource, ContractQuerier, PairInfo, PoolResponse, RawTransaction,
};
use oraidex_indexer::config::IndexerConfig;
use oraidex_indexer::domain::pair::{ORAI_DENOM, USDT_CONTRACT};
use oraidex_indexer::domain::{Asset, AssetInfo, PairMetadata, PairRegistry};
use oraidex_indexer::error::IndexerError;
use oraidex_indexer::persistence::AnalyticalStore;
use oraidex_indexer::service::{BatchOutcome, SyncService};

const PAIR: &str = "orai1pair";
const LP: &str = "orai1lp";
/// 60-second aligned.
const BUCKET: i64 = 1_700_000_040;

/// Serves fixed batches by offset; unknown offsets report no new data.
#[derive(Default)]
struct ScriptedSource {
    batches: HashMap<u64, ChainBatch>,
    fail: AtomicBool,
}

impl ScriptedSource {
    fn with(mut self, from: u64, to: u64, transactions: Vec<RawTransaction>) -> Self {
        self.batches.insert(
            from,
            ChainBatch {
                transactions,
                offset: to,
            },
        );
        self
    }
}

#[async_trait]
impl ChainDataSource for ScriptedSource {
    async fn fetch_batch(&self, offset: u64) -> Result<ChainBatch, IndexerError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(IndexerError::Chain("node unreachable".to_string()));
        }
        Ok(self.batches.get(&offset).cloned().unwrap_or(ChainBatch {
            transactions: Vec::new(),
            offset,
        }))
    }
}

/// Pool holds 1000 ORAI / 2000 USDT / 1000 shares at every height.
#[derive(Default)]
struct MockChain {
    pool_calls: AtomicUsize,
}

#[async_trait]
impl ContractQuerier for MockChain {
    async fn pool(&self, _: &str, _: Option<u64>) -> Result<PoolResponse, IndexerError> {
        self.pool_calls.fetch_add(1, Ordering::SeqCst);
        Ok(PoolResponse {
            assets: vec![
                Asset {
                    info: AssetInfo::native(ORAI_DENOM),
                    amount: 1_000,
                },
                Asset {
                    info: AssetInfo::token(USDT_CONTRACT),
                    amount: 2_000,
                },
            ],
            total_share: 1_000,
        })
    }

    async fn total_supply(&self, _: &str) -> Result<u128, IndexerError> {
        Ok(1_000)
    }

    async fn total_bond_amount(&self, _: &str) -> Result<u128, IndexerError> {
        Ok(500)
    }

    async fn rewards_per_sec(&self, _: &str) -> Result<Vec<Asset>, IndexerError> {
        Ok(Vec::new())
    }

    async fn pair_info(&self, _: &str, _: &[AssetInfo; 2]) -> Result<PairInfo, IndexerError> {
        Err(IndexerError::Query("no factory".to_string()))
    }
}

fn registry() -> Arc<PairRegistry> {
    Arc::new(PairRegistry::new(vec![
        PairMetadata::new(
            AssetInfo::native(ORAI_DENOM),
            AssetInfo::token(USDT_CONTRACT),
            "ORAI",
            "USDT",
        )
        .with_addresses(PAIR, LP),
    ]))
}

fn pair_key() -> String {
    format!("{ORAI_DENOM}-{USDT_CONTRACT}")
}

fn raw_log(attrs: &[(&str, String)]) -> String {
    let attrs: Vec<serde_json::Value> = attrs
        .iter()
        .map(|(key, value)| serde_json::json!({ "key": key, "value": value }))
        .collect();
    serde_json::json!([{ "events": [{ "type": "wasm", "attributes": attrs }] }]).to_string()
}

fn raw_tx(hash: &str, height: u64, timestamp: i64, msg: &str, log: String) -> RawTransaction {
    let msgs = [MsgExecuteContract {
        sender: "orai1trader".to_string(),
        contract: PAIR.to_string(),
        msg: msg.as_bytes().to_vec(),
        funds: Vec::new(),
    }];
    RawTransaction {
        hash: hash.to_string(),
        height,
        index: 0,
        code: 0,
        raw_log: log,
        tx: encode_execute_msgs(&msgs),
        timestamp,
    }
}

fn swap_tx(
    hash: &str,
    height: u64,
    timestamp: i64,
    (offer_asset, offer_amount): (&str, &str),
    (ask_asset, return_amount): (&str, &str),
) -> RawTransaction {
    let log = raw_log(&[
        ("offer_asset", offer_asset.to_string()),
        ("ask_asset", ask_asset.to_string()),
        ("offer_amount", offer_amount.to_string()),
        ("return_amount", return_amount.to_string()),
        ("tax_amount", "0".to_string()),
        ("commission_amount", "0".to_string()),
        ("spread_amount", "0".to_string()),
    ]);
    raw_tx(hash, height, timestamp, r#"{"swap":{}}"#, log)
}

fn provide_tx(hash: &str, height: u64, timestamp: i64) -> RawTransaction {
    let log = raw_log(&[
        ("_contract_address", PAIR.to_string()),
        ("action", "provide_liquidity".to_string()),
        ("assets", format!("10{ORAI_DENOM}, 20{USDT_CONTRACT}")),
        ("share", "9".to_string()),
    ]);
    raw_tx(hash, height, timestamp, r#"{"provide_liquidity":{}}"#, log)
}

/// Sell 100 ORAI for 250 USDT twice (same unique key), then provide.
fn first_batch() -> Vec<RawTransaction> {
    vec![
        swap_tx("A", 150, BUCKET + 5, (ORAI_DENOM, "100"), (USDT_CONTRACT, "250")),
        swap_tx("B", 150, BUCKET + 6, (ORAI_DENOM, "100"), (USDT_CONTRACT, "250")),
        provide_tx("C", 160, BUCKET + 10),
    ]
}

async fn store() -> AnalyticalStore {
    let Ok(store) = AnalyticalStore::in_memory().await else {
        panic!("in-memory store should open");
    };
    store
}

fn service(
    store: &AnalyticalStore,
    source: ScriptedSource,
    chain: &Arc<MockChain>,
) -> SyncService<ScriptedSource, MockChain> {
    SyncService::new(
        &IndexerConfig::for_tests(100),
        store.clone(),
        registry(),
        source,
        Arc::clone(chain),
    )
}

async fn count(store: &AnalyticalStore, table: &str) -> u64 {
    let Ok(n) = store.count(table).await else {
        panic!("count of {table} should succeed");
    };
    n
}

#[tokio::test]
async fn batch_produces_events_reserves_candles_and_checkpoint() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    let mut sync = service(&store, ScriptedSource::default().with(100, 200, first_batch()), &chain);

    let Ok(BatchOutcome::Applied(summary)) = sync.run_once().await else {
        panic!("batch should apply");
    };
    assert_eq!(summary.transactions, 3);
    assert_eq!(summary.swaps, 1);
    assert_eq!(summary.liquidity, 1);
    assert_eq!(summary.aprs, 1);

    assert_eq!(count(&store, "swap_ops_data").await, 1);
    assert_eq!(count(&store, "lp_ops_data").await, 1);
    assert!(matches!(store.load_checkpoint().await, Ok(Some(200))));

    // seed (1000, 2000, 1000) from the pool at height 149; sell +100/-250;
    // provide +10/+20 mints 1000 * 10 / 1100 = 9 shares
    let Ok(Some(reserve)) = store.latest_reserve(PAIR).await else {
        panic!("snapshot expected");
    };
    assert_eq!(
        (reserve.offer_pool_amount, reserve.ask_pool_amount, reserve.total_share),
        (1_110, 1_770, 1_009)
    );
    assert_eq!(reserve.height, 160);
    assert_eq!(reserve.timestamp, BUCKET);
    assert_eq!(count(&store, "pool_amount_history").await, 1);

    let Ok(candles) = store.candles(&pair_key(), 0, i64::MAX).await else {
        panic!("candles should load");
    };
    let [candle] = candles.as_slice() else {
        panic!("one candle expected");
    };
    assert_eq!(candle.timestamp, BUCKET);
    assert_eq!(candle.swap_count, 1);
    assert_eq!(candle.volume, 100);
    assert!((candle.open - 0.4).abs() < 1e-12);

    let Ok(volume) = store.aggregate_volume(&pair_key(), 0, i64::MAX).await else {
        panic!("volume should aggregate");
    };
    assert_eq!((volume.base, volume.quote, volume.swaps), (100, 250, 1));

    let Ok(Some(apr)) = store.latest_apr(PAIR).await else {
        panic!("apr expected");
    };
    assert_eq!(apr.unique_key, format!("160-{PAIR}"));
    assert_eq!(apr.total_supply, 1_000);
}

#[tokio::test]
async fn same_block_events_apply_in_tx_order() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    // the swap is listed first but executed second in block 150
    let mut swap = swap_tx("S", 150, BUCKET + 5, (ORAI_DENOM, "100"), (USDT_CONTRACT, "250"));
    swap.index = 1;
    let provide = provide_tx("P", 150, BUCKET + 5);
    let source = ScriptedSource::default().with(100, 200, vec![swap, provide]);
    let mut sync = service(&store, source, &chain);
    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::Applied(_))));

    // provide first mints 1000 * 10 / 1000 = 10 shares, then the sell
    let Ok(Some(reserve)) = store.latest_reserve(PAIR).await else {
        panic!("snapshot expected");
    };
    assert_eq!(
        (reserve.offer_pool_amount, reserve.ask_pool_amount, reserve.total_share),
        (1_110, 1_770, 1_010)
    );
}

#[tokio::test]
async fn unchanged_offset_writes_nothing() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    let mut sync = service(&store, ScriptedSource::default().with(100, 200, first_batch()), &chain);

    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::Applied(_))));
    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::NoNewData)));
    assert_eq!(sync.checkpoint(), Some(200));
    assert_eq!(count(&store, "swap_ops_data").await, 1);
    assert_eq!(count(&store, "swap_ohlcv").await, 1);
}

#[tokio::test]
async fn replaying_a_batch_is_idempotent() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    let mut sync = service(&store, ScriptedSource::default().with(100, 200, first_batch()), &chain);
    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::Applied(_))));
    let Ok(Some(before)) = store.latest_reserve(PAIR).await else {
        panic!("snapshot expected");
    };

    // rewind and replay the same segment
    tokio_test::assert_ok!(store.save_checkpoint(100).await);
    let mut replay = service(&store, ScriptedSource::default().with(100, 200, first_batch()), &chain);
    assert!(matches!(replay.run_once().await, Ok(BatchOutcome::Applied(_))));

    for table in ["swap_ops_data", "lp_ops_data", "pool_amount_history", "swap_ohlcv", "pool_apr"] {
        assert_eq!(count(&store, table).await, 1, "{table} duplicated on replay");
    }
    let Ok(Some(after)) = store.latest_reserve(PAIR).await else {
        panic!("snapshot expected");
    };
    assert_eq!(before, after);
}

#[tokio::test]
async fn later_batches_seed_from_history() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    let source = ScriptedSource::default()
        .with(
            100,
            200,
            vec![swap_tx("A", 150, BUCKET + 5, (ORAI_DENOM, "100"), (USDT_CONTRACT, "250"))],
        )
        .with(
            200,
            300,
            // buy: 50 USDT in, 20 ORAI out, same bucket as the first swap
            vec![swap_tx("D", 250, BUCKET + 30, (USDT_CONTRACT, "50"), (ORAI_DENOM, "20"))],
        );
    let mut sync = service(&store, source, &chain);

    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::Applied(_))));
    let seeded_from_chain = chain.pool_calls.load(Ordering::SeqCst);
    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::Applied(_))));
    assert_eq!(chain.pool_calls.load(Ordering::SeqCst), seeded_from_chain);

    let Ok(Some(reserve)) = store.latest_reserve(PAIR).await else {
        panic!("snapshot expected");
    };
    assert_eq!((reserve.offer_pool_amount, reserve.ask_pool_amount), (1_080, 1_800));
    assert_eq!(reserve.height, 250);

    // the bucket's candle is rebuilt from both swaps
    let Ok(candles) = store.candles(&pair_key(), BUCKET, BUCKET).await else {
        panic!("candles should load");
    };
    let [candle] = candles.as_slice() else {
        panic!("one candle expected");
    };
    assert_eq!(candle.swap_count, 2);
    assert_eq!(candle.volume, 120);
    assert!((candle.open - 0.4).abs() < 1e-12);
    assert!((candle.close - 0.4).abs() < 1e-12);
    assert!(matches!(store.load_checkpoint().await, Ok(Some(300))));
}

#[tokio::test]
async fn failed_batches_leave_the_checkpoint_alone() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    let source = ScriptedSource::default()
        .with(100, 200, first_batch())
        .with(
            200,
            300,
            vec![
                swap_tx("E", 250, BUCKET + 60, (ORAI_DENOM, "1"), (USDT_CONTRACT, "2")),
                swap_tx(
                    "F",
                    251,
                    BUCKET + 60,
                    (ORAI_DENOM, "99999999999999999999"),
                    (USDT_CONTRACT, "1"),
                ),
            ],
        );
    let mut sync = service(&store, source, &chain);
    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::Applied(_))));

    let Err(IndexerError::SchemaMismatch { table, .. }) = sync.run_once().await else {
        panic!("oversized amount should be rejected");
    };
    assert_eq!(table, "swap_ops_data");
    assert!(matches!(store.load_checkpoint().await, Ok(Some(200))));
    assert_eq!(sync.checkpoint(), Some(200));
    assert_eq!(count(&store, "swap_ops_data").await, 1);
    assert_eq!(count(&store, "pool_amount_history").await, 1);
}

#[tokio::test]
async fn source_errors_are_retried_from_the_same_offset() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    let mut sync = service(&store, ScriptedSource::default().with(100, 200, first_batch()), &chain);
    let Ok(start) = sync.start().await else {
        panic!("start should succeed");
    };
    assert_eq!(start, 100);

    let failing = ScriptedSource::default();
    failing.fail.store(true, Ordering::SeqCst);
    let mut broken = service(&store, failing, &chain);
    assert!(matches!(broken.run_once().await, Err(IndexerError::Chain(_))));
    assert!(matches!(store.load_checkpoint().await, Ok(None)));

    assert!(matches!(sync.run_once().await, Ok(BatchOutcome::Applied(_))));
    assert!(matches!(store.load_checkpoint().await, Ok(Some(200))));
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let store = store().await;
    let chain = Arc::new(MockChain::default());
    let sync = service(&store, ScriptedSource::default().with(100, 200, first_batch()), &chain);
    let (tx, rx) = tokio::sync::watch::channel(false);

    let handle = tokio::spawn(sync.run(rx));
    // first batch applies, then the loop idles on the unchanged offset
    for _ in 0..200 {
        if matches!(store.load_checkpoint().await, Ok(Some(200))) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    tokio_test::assert_ok!(tx.send(true));
    let Ok(Ok(())) = handle.await else {
        panic!("loop should stop cleanly");
    };
    assert!(matches!(store.load_checkpoint().await, Ok(Some(200))));
}

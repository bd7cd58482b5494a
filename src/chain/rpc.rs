//! Tendermint RPC client and the RPC-backed chain data source.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use futures_util::future::join_all;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use super::{ChainBatch, ChainDataSource, RawTransaction};
use crate::error::IndexerError;

/// Page size accepted by `tx_search`.
const TX_SEARCH_PER_PAGE: u32 = 100;
/// Maximum span of a single `/blockchain` call.
const BLOCKCHAIN_SPAN: u64 = 20;

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct StatusResult {
    sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
struct SyncInfo {
    latest_block_height: String,
}

#[derive(Debug, Deserialize)]
struct TxSearchResult {
    #[serde(default)]
    txs: Vec<TxResultEnvelope>,
    total_count: String,
}

#[derive(Debug, Deserialize)]
struct TxResultEnvelope {
    hash: String,
    height: String,
    #[serde(default)]
    index: u32,
    tx_result: TxResult,
    tx: String,
}

#[derive(Debug, Deserialize)]
struct TxResult {
    #[serde(default)]
    code: u32,
    #[serde(default)]
    log: String,
}

#[derive(Debug, Deserialize)]
struct BlockchainResult {
    #[serde(default)]
    block_metas: Vec<BlockMeta>,
}

#[derive(Debug, Deserialize)]
struct BlockMeta {
    header: BlockHeader,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    height: String,
    time: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AbciQueryResult {
    pub(crate) response: AbciResponse,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AbciResponse {
    #[serde(default)]
    pub(crate) code: u32,
    #[serde(default)]
    pub(crate) log: String,
    #[serde(default)]
    pub(crate) value: Option<String>,
}

/// Thin JSON-RPC-over-GET client for a Tendermint node.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    base_url: String,
}

impl RpcClient {
    /// Creates a client for `base_url` (e.g. `https://rpc.orai.io`).
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(
        &self,
        route: &str,
        params: &[(&str, String)],
    ) -> Result<T, IndexerError> {
        let url = format!("{}/{route}", self.base_url);
        let envelope: RpcEnvelope<T> = self
            .http
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| IndexerError::Chain(format!("{route}: {e}")))?
            .error_for_status()
            .map_err(|e| IndexerError::Chain(format!("{route}: {e}")))?
            .json()
            .await
            .map_err(|e| IndexerError::Chain(format!("{route}: invalid body: {e}")))?;

        if let Some(error) = envelope.error {
            return Err(IndexerError::Chain(format!("{route}: {error}")));
        }
        envelope
            .result
            .ok_or_else(|| IndexerError::Chain(format!("{route}: empty result")))
    }

    /// Returns the latest committed block height.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Chain`] on transport or decode failure.
    pub async fn latest_height(&self) -> Result<u64, IndexerError> {
        let status: StatusResult = self.get("status", &[]).await?;
        parse_u64(&status.sync_info.latest_block_height)
    }

    /// Runs an ABCI query and returns the raw response value.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Query`] when the node rejects the query or
    /// returns a non-zero code.
    pub(crate) async fn abci_query(
        &self,
        path: &str,
        data: &[u8],
        height: Option<u64>,
    ) -> Result<Vec<u8>, IndexerError> {
        let mut params = vec![
            ("path", format!("\"{path}\"")),
            ("data", format!("0x{}", hex::encode(data))),
        ];
        if let Some(h) = height {
            params.push(("height", h.to_string()));
        }
        let result: AbciQueryResult = self
            .get("abci_query", &params)
            .await
            .map_err(|e| IndexerError::Query(e.to_string()))?;
        if result.response.code != 0 {
            return Err(IndexerError::Query(result.response.log));
        }
        let value = result.response.value.unwrap_or_default();
        STANDARD
            .decode(value)
            .map_err(|e| IndexerError::Query(format!("abci value: {e}")))
    }

    /// Fetches every transaction in `[from, to]`, paging through
    /// `tx_search`. Block times are left at zero.
    async fn search_txs(&self, from: u64, to: u64) -> Result<Vec<RawTransaction>, IndexerError> {
        let query = format!("\"tx.height>={from} AND tx.height<={to}\"");
        let mut collected = Vec::new();
        let mut page = 1u32;
        loop {
            let result: TxSearchResult = self
                .get(
                    "tx_search",
                    &[
                        ("query", query.clone()),
                        ("page", page.to_string()),
                        ("per_page", TX_SEARCH_PER_PAGE.to_string()),
                        ("order_by", "\"asc\"".to_string()),
                    ],
                )
                .await?;
            let total = parse_u64(&result.total_count)?;
            let fetched = result.txs.len();
            for envelope in result.txs {
                collected.push(RawTransaction {
                    hash: envelope.hash,
                    height: parse_u64(&envelope.height)?,
                    index: envelope.index,
                    code: envelope.tx_result.code,
                    raw_log: envelope.tx_result.log,
                    tx: STANDARD
                        .decode(envelope.tx)
                        .map_err(|e| IndexerError::Chain(format!("tx base64: {e}")))?,
                    timestamp: 0,
                });
            }
            if fetched == 0 || collected.len() as u64 >= total {
                break;
            }
            page = page.saturating_add(1);
        }
        Ok(collected)
    }

    /// Resolves block times (unix seconds) for the given heights.
    async fn block_times(
        &self,
        heights: &BTreeSet<u64>,
    ) -> Result<HashMap<u64, i64>, IndexerError> {
        let mut times = HashMap::with_capacity(heights.len());
        for &height in heights {
            if times.contains_key(&height) {
                continue;
            }
            let max = height.saturating_add(BLOCKCHAIN_SPAN - 1);
            let result: BlockchainResult = self
                .get(
                    "blockchain",
                    &[("minHeight", height.to_string()), ("maxHeight", max.to_string())],
                )
                .await?;
            for meta in result.block_metas {
                let time = DateTime::parse_from_rfc3339(&meta.header.time)
                    .map_err(|e| IndexerError::Chain(format!("block time: {e}")))?;
                times.insert(parse_u64(&meta.header.height)?, time.timestamp());
            }
            if !times.contains_key(&height) {
                return Err(IndexerError::Chain(format!("no block meta for height {height}")));
            }
        }
        Ok(times)
    }
}

fn parse_u64(raw: &str) -> Result<u64, IndexerError> {
    raw.parse()
        .map_err(|e| IndexerError::Chain(format!("invalid integer {raw:?}: {e}")))
}

/// Splits `[offset, offset + limit * threads)` into inclusive windows of
/// `limit` heights, capped at `latest`.
#[must_use]
pub fn plan_windows(offset: u64, latest: u64, limit: u64, threads: u64) -> Vec<(u64, u64)> {
    let mut windows = Vec::new();
    let mut start = offset;
    for _ in 0..threads {
        if start > latest {
            break;
        }
        let end = start.saturating_add(limit).saturating_sub(1).min(latest);
        windows.push((start, end));
        start = end.saturating_add(1);
    }
    windows
}

/// [`ChainDataSource`] that pages `tx_search` over parallel height windows.
#[derive(Debug, Clone)]
pub struct RpcChainSource {
    client: RpcClient,
    limit: u64,
    max_thread_level: u64,
}

impl RpcChainSource {
    /// Creates a source fetching `max_thread_level` windows of `limit`
    /// heights per batch.
    #[must_use]
    pub fn new(client: RpcClient, limit: u64, max_thread_level: u64) -> Self {
        Self {
            client,
            limit: limit.max(1),
            max_thread_level: max_thread_level.max(1),
        }
    }
}

#[async_trait]
impl ChainDataSource for RpcChainSource {
    async fn fetch_batch(&self, offset: u64) -> Result<ChainBatch, IndexerError> {
        let latest = self.client.latest_height().await?;
        let windows = plan_windows(offset, latest, self.limit, self.max_thread_level);
        let Some(&(_, last_end)) = windows.last() else {
            return Ok(ChainBatch {
                transactions: Vec::new(),
                offset,
            });
        };

        let results = join_all(
            windows
                .iter()
                .map(|&(from, to)| self.client.search_txs(from, to)),
        )
        .await;
        let mut transactions = Vec::new();
        for window in results {
            transactions.extend(window?);
        }

        let heights: BTreeSet<u64> = transactions.iter().map(|tx| tx.height).collect();
        let times = self.client.block_times(&heights).await?;
        for tx in &mut transactions {
            tx.timestamp = times.get(&tx.height).copied().unwrap_or_default();
        }
        transactions.sort_by_key(|tx| (tx.height, tx.index));

        tracing::debug!(
            from = offset,
            to = last_end,
            txs = transactions.len(),
            "fetched chain segment"
        );
        Ok(ChainBatch {
            transactions,
            offset: last_end.saturating_add(1),
        })
    }
}

//! Sync Orchestrator.
//!
//! A single loop pulls one chain segment at a time from the checkpoint
//! offset, derives every record from it and persists the records together
//! with the next checkpoint in one transaction. Nothing from segment `N + 1`
//! is fetched before segment `N` is persisted or has failed.

use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::apr::{AprEngine, AprTriggers};
use super::dedup::{bucket_events, dedup_by_key};
use super::ohlcv::build_candles;
use super::reserve_accumulator::ReserveAccumulator;
use crate::chain::{ChainDataSource, ContractQuerier, RawTransaction};
use crate::config::IndexerConfig;
use crate::domain::{DexEvent, OhlcvCandle, PairRegistry, SwapEvent};
use crate::error::IndexerError;
use crate::extract::EventExtractor;
use crate::persistence::{AnalyticalStore, BatchWrite};

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Waiting for the next poll.
    Idle,
    /// Requesting the next segment.
    FetchingBatch,
    /// Deriving records from a segment.
    Processing,
    /// Writing records and the checkpoint.
    Persisting,
    /// The last batch failed; it will be retried.
    Failed,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::FetchingBatch => "fetching_batch",
            Self::Processing => "processing",
            Self::Persisting => "persisting",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Counts of what one applied batch produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Checkpoint the batch started from.
    pub from: u64,
    /// Checkpoint written at the end of the batch.
    pub to: u64,
    /// Transactions in the segment.
    pub transactions: usize,
    /// Swaps after de-duplication.
    pub swaps: usize,
    /// Provides and withdraws after de-duplication.
    pub liquidity: usize,
    /// Staking events seen.
    pub staking: usize,
    /// Reserve snapshots written.
    pub snapshots: usize,
    /// Candles rewritten.
    pub candles: usize,
    /// APR records written.
    pub aprs: usize,
    /// Tolerated extraction failures.
    pub skipped: usize,
}

/// Result of one pass of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// The source returned the current checkpoint; nothing was written.
    NoNewData,
    /// A segment was processed and persisted.
    Applied(BatchSummary),
}

/// Drives extraction, accumulation and persistence for one chain.
#[derive(Debug)]
pub struct SyncService<C, Q: ?Sized> {
    source: C,
    querier: Arc<Q>,
    store: AnalyticalStore,
    registry: Arc<PairRegistry>,
    extractor: EventExtractor,
    accumulator: ReserveAccumulator,
    apr: AprEngine,
    initial_sync_height: u64,
    bucket_secs: i64,
    poll_interval: Duration,
    retry_interval: Duration,
    checkpoint: Option<u64>,
    state: SyncState,
}

impl<C, Q> SyncService<C, Q>
where
    C: ChainDataSource,
    Q: ContractQuerier + ?Sized,
{
    /// Creates a service; call [`start`](Self::start) or
    /// [`run`](Self::run) to begin.
    #[must_use]
    pub fn new(
        config: &IndexerConfig,
        store: AnalyticalStore,
        registry: Arc<PairRegistry>,
        source: C,
        querier: Arc<Q>,
    ) -> Self {
        Self {
            source,
            querier,
            store,
            extractor: EventExtractor::new(Arc::clone(&registry)),
            accumulator: ReserveAccumulator::new(Arc::clone(&registry)),
            apr: AprEngine::new(Arc::clone(&registry)),
            registry,
            initial_sync_height: config.initial_sync_height,
            bucket_secs: config.bucket_secs,
            poll_interval: config.poll_interval,
            retry_interval: config.retry_interval,
            checkpoint: None,
            state: SyncState::Idle,
        }
    }

    /// Current loop state.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    /// Offset of the next segment, once started.
    #[must_use]
    pub const fn checkpoint(&self) -> Option<u64> {
        self.checkpoint
    }

    /// Loads the checkpoint, falling back to the configured initial height.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] when the checkpoint cannot be
    /// read.
    pub async fn start(&mut self) -> Result<u64, IndexerError> {
        let height = match self.store.load_checkpoint().await? {
            Some(height) => height,
            None => {
                tracing::info!(height = self.initial_sync_height, "no checkpoint, starting from initial height");
                self.initial_sync_height
            }
        };
        self.checkpoint = Some(height);
        tracing::info!(height, pairs = self.registry.len(), "sync service started");
        Ok(height)
    }

    /// Fetches, processes and persists one segment.
    ///
    /// # Errors
    ///
    /// Returns the source, query or store error that aborted the batch. The
    /// checkpoint is unchanged in that case.
    pub async fn run_once(&mut self) -> Result<BatchOutcome, IndexerError> {
        let offset = match self.checkpoint {
            Some(offset) => offset,
            None => self.start().await?,
        };

        self.transition(SyncState::FetchingBatch);
        let batch = self.source.fetch_batch(offset).await?;

        self.transition(SyncState::Processing);
        if batch.offset == offset {
            self.transition(SyncState::Idle);
            return Ok(BatchOutcome::NoNewData);
        }
        let (write, mut summary) = self.process(&batch.transactions, batch.offset).await?;
        summary.from = offset;

        self.transition(SyncState::Persisting);
        self.store.persist_batch(&write).await?;
        self.checkpoint = Some(batch.offset);
        self.transition(SyncState::Idle);
        Ok(BatchOutcome::Applied(summary))
    }

    /// Runs batches until `shutdown` turns `true` or its sender is dropped.
    /// Shutdown is observed between batches and during waits only.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] when the initial checkpoint
    /// cannot be read. Batch failures are logged and retried.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), IndexerError> {
        self.start().await?;
        loop {
            let stop = *shutdown.borrow();
            if stop {
                break;
            }
            let wait = match self.run_once().await {
                Ok(BatchOutcome::Applied(summary)) => {
                    tracing::info!(
                        from = summary.from,
                        to = summary.to,
                        txs = summary.transactions,
                        swaps = summary.swaps,
                        liquidity = summary.liquidity,
                        snapshots = summary.snapshots,
                        candles = summary.candles,
                        aprs = summary.aprs,
                        skipped = summary.skipped,
                        "batch applied"
                    );
                    continue;
                }
                Ok(BatchOutcome::NoNewData) => self.poll_interval,
                Err(e) => {
                    self.transition(SyncState::Failed);
                    tracing::error!(
                        checkpoint = ?self.checkpoint,
                        error = %e,
                        transient = e.is_transient(),
                        "batch failed, retrying"
                    );
                    self.retry_interval
                }
            };
            tokio::select! {
                () = tokio::time::sleep(wait) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        tracing::info!(checkpoint = ?self.checkpoint, "sync service stopped");
        Ok(())
    }

    fn transition(&mut self, next: SyncState) {
        if self.state != next {
            tracing::debug!(from = %self.state, to = %next, "sync state");
            self.state = next;
        }
    }

    async fn process(
        &self,
        transactions: &[RawTransaction],
        next_offset: u64,
    ) -> Result<(BatchWrite, BatchSummary), IndexerError> {
        let querier = &*self.querier;
        let mut swaps = Vec::new();
        let mut liquidity = Vec::new();
        let mut staking = Vec::new();
        let mut skipped = 0;
        for tx in transactions {
            let extraction = self.extractor.extract(tx, querier).await;
            for reason in &extraction.skipped {
                tracing::debug!(tx = %tx.hash, height = tx.height, ?reason, "transaction skipped");
            }
            skipped += extraction.skipped.len();
            for event in extraction.events {
                match event {
                    DexEvent::Swap(swap) => swaps.push(swap),
                    DexEvent::Liquidity(event) => liquidity.push(event),
                    DexEvent::Staking(event) => staking.push(event),
                }
            }
        }

        let mut swaps = dedup_by_key(swaps);
        let mut liquidity = dedup_by_key(liquidity);
        bucket_events(&mut swaps, self.bucket_secs);
        bucket_events(&mut liquidity, self.bucket_secs);

        let min_heights = self.accumulator.min_heights(&swaps, &liquidity);
        let seeds = self
            .accumulator
            .resolve_seeds(&self.store, querier, &min_heights)
            .await?;
        let snapshots = self.accumulator.accumulate(&seeds, &swaps, &liquidity);
        let candles = self.recompute_candles(&swaps).await?;

        let triggers = AprTriggers::collect(&self.registry, &liquidity, &staking);
        let (height, timestamp) = transactions
            .iter()
            .map(|tx| (tx.height, tx.timestamp))
            .max()
            .unwrap_or((next_offset.saturating_sub(1), 0));
        let aprs = self
            .apr
            .refresh(&self.store, querier, &triggers, height, timestamp)
            .await?;

        let summary = BatchSummary {
            from: 0,
            to: next_offset,
            transactions: transactions.len(),
            swaps: swaps.len(),
            liquidity: liquidity.len(),
            staking: staking.len(),
            snapshots: snapshots.len(),
            candles: candles.len(),
            aprs: aprs.len(),
            skipped,
        };
        let write = BatchWrite {
            swaps,
            liquidity,
            snapshots,
            candles,
            aprs,
            checkpoint: next_offset,
        };
        Ok((write, summary))
    }

    /// Rebuilds the candle of every `(pair, bucket)` the batch touched from
    /// the stored swaps of that bucket plus the batch's new swaps.
    async fn recompute_candles(&self, swaps: &[SwapEvent]) -> Result<Vec<OhlcvCandle>, IndexerError> {
        if swaps.is_empty() {
            return Ok(Vec::new());
        }
        let buckets: Vec<(String, i64)> = swaps
            .iter()
            .map(|swap| (swap.pair_key.clone(), swap.timestamp))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut merged = self.store.swaps_in_buckets(&buckets).await?;
        let stored: HashSet<String> = merged.iter().map(|swap| swap.unique_key.clone()).collect();
        merged.extend(
            swaps
                .iter()
                .filter(|swap| !stored.contains(&swap.unique_key))
                .cloned(),
        );
        Ok(build_candles(&merged))
    }
}

//! SQLite-backed analytical store.

use std::collections::BTreeMap;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqliteConnection};

use super::models::{
    ALL_TABLES, CHECKPOINT_TABLE, LiquidityPoint, PairRow, Record, SqlValue,
};
use crate::domain::{
    Direction, LiquidityEvent, OhlcvCandle, PairMetadata, PoolAprRecord, PoolReserveSnapshot,
    SwapEvent,
};
use crate::error::IndexerError;
use crate::service::ohlcv::VolumeTotals;

/// Rows per multi-row `INSERT`.
const INSERT_CHUNK: usize = 500;

/// Every row derived from one batch, plus the checkpoint to advance to.
#[derive(Debug, Clone, Default)]
pub struct BatchWrite {
    /// De-duplicated swaps.
    pub swaps: Vec<SwapEvent>,
    /// De-duplicated provides and withdraws.
    pub liquidity: Vec<LiquidityEvent>,
    /// Reserve snapshots.
    pub snapshots: Vec<PoolReserveSnapshot>,
    /// Recomputed candles.
    pub candles: Vec<OhlcvCandle>,
    /// Refreshed APR records.
    pub aprs: Vec<PoolAprRecord>,
    /// Offset of the next segment.
    pub checkpoint: u64,
}

/// Embedded analytical store. Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct AnalyticalStore {
    pool: SqlitePool,
}

const SWAP_SELECT: &str = "SELECT tx_hash, offer_denom, offer_amount, ask_denom, return_amount, \
     tax_amount, commission_amount, spread_amount, direction, pair_addr, pair_key, sender, \
     tx_height, tx_index, msg_index, timestamp, unique_key FROM swap_ops_data";

fn to_u128(value: i64) -> Result<u128, IndexerError> {
    u128::try_from(value)
        .map_err(|_| IndexerError::Persistence(format!("negative amount {value} in store")))
}

fn to_u64(value: i64) -> Result<u64, IndexerError> {
    u64::try_from(value)
        .map_err(|_| IndexerError::Persistence(format!("negative height {value} in store")))
}

fn to_u32(value: i64) -> Result<u32, IndexerError> {
    u32::try_from(value)
        .map_err(|_| IndexerError::Persistence(format!("index {value} out of range in store")))
}

fn swap_from_row(row: &SqliteRow) -> Result<SwapEvent, IndexerError> {
    let amount = |column: &str| -> Result<u128, IndexerError> { to_u128(row.try_get(column)?) };
    let direction: String = row.try_get("direction")?;
    Ok(SwapEvent {
        tx_hash: row.try_get("tx_hash")?,
        offer_denom: row.try_get("offer_denom")?,
        offer_amount: amount("offer_amount")?,
        ask_denom: row.try_get("ask_denom")?,
        return_amount: amount("return_amount")?,
        tax_amount: amount("tax_amount")?,
        commission_amount: amount("commission_amount")?,
        spread_amount: amount("spread_amount")?,
        direction: Direction::from_str(&direction).map_err(IndexerError::Persistence)?,
        pair_addr: row.try_get("pair_addr")?,
        pair_key: row.try_get("pair_key")?,
        sender: row.try_get("sender")?,
        height: to_u64(row.try_get("tx_height")?)?,
        tx_index: to_u32(row.try_get("tx_index")?)?,
        msg_index: to_u32(row.try_get("msg_index")?)?,
        timestamp: row.try_get("timestamp")?,
        unique_key: row.try_get("unique_key")?,
    })
}

fn snapshot_from_row(
    (pair_addr, offer, ask, total, height, timestamp, unique_key): (
        String,
        i64,
        i64,
        i64,
        i64,
        i64,
        String,
    ),
) -> Result<PoolReserveSnapshot, IndexerError> {
    Ok(PoolReserveSnapshot {
        pair_addr,
        offer_pool_amount: i128::from(offer),
        ask_pool_amount: i128::from(ask),
        total_share: i128::from(total),
        height: to_u64(height)?,
        timestamp,
        unique_key,
    })
}

impl AnalyticalStore {
    /// Opens (creating if missing) the store at `path`. `:memory:` opens a
    /// private in-memory database held by a single connection.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] when the database cannot be
    /// opened.
    pub async fn connect(path: &str, max_connections: u32) -> Result<Self, IndexerError> {
        let in_memory = path == ":memory:";
        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
        };
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };
        let pool = pool_options.connect_with(options).await?;
        tracing::info!(%path, "analytical store opened");
        Ok(Self { pool })
    }

    /// Opens a fresh in-memory store with all tables created.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on failure.
    pub async fn in_memory() -> Result<Self, IndexerError> {
        let store = Self::connect(":memory:", 1).await?;
        store.create_tables().await?;
        Ok(store)
    }

    /// Creates every table that does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn create_tables(&self) -> Result<(), IndexerError> {
        for schema in ALL_TABLES {
            sqlx::query(&schema.create_sql()).execute(&self.pool).await?;
        }
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {CHECKPOINT_TABLE} (current_height INTEGER NOT NULL) STRICT"
        ))
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS swap_ops_bucket ON swap_ops_data (pair_key, timestamp)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS pool_amount_pair_height \
             ON pool_amount_history (pair_addr, height)",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Inserts `rows` atomically, honoring the table's conflict policy.
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::SchemaMismatch`] if any value does not match
    /// its column (nothing is written), or [`IndexerError::Persistence`] on
    /// database failure.
    pub async fn insert_bulk<R: Record>(&self, rows: &[R]) -> Result<u64, IndexerError> {
        let encoded = encode_rows(rows)?;
        let mut tx = self.pool.begin().await?;
        let written = insert_encoded::<R>(&mut tx, &encoded).await?;
        tx.commit().await?;
        Ok(written)
    }

    /// Writes every row of a batch and then the checkpoint, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::SchemaMismatch`] or
    /// [`IndexerError::Persistence`]; in both cases nothing is written.
    pub async fn persist_batch(&self, batch: &BatchWrite) -> Result<(), IndexerError> {
        let swaps = encode_rows(&batch.swaps)?;
        let liquidity = encode_rows(&batch.liquidity)?;
        let snapshots = encode_rows(&batch.snapshots)?;
        let candles = encode_rows(&batch.candles)?;
        let aprs = encode_rows(&batch.aprs)?;

        let mut tx = self.pool.begin().await?;
        insert_encoded::<SwapEvent>(&mut tx, &swaps).await?;
        insert_encoded::<LiquidityEvent>(&mut tx, &liquidity).await?;
        insert_encoded::<PoolReserveSnapshot>(&mut tx, &snapshots).await?;
        insert_encoded::<OhlcvCandle>(&mut tx, &candles).await?;
        insert_encoded::<PoolAprRecord>(&mut tx, &aprs).await?;
        write_checkpoint(&mut tx, batch.checkpoint).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Reads the stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn load_checkpoint(&self) -> Result<Option<u64>, IndexerError> {
        let row: Option<(i64,)> = sqlx::query_as(&format!(
            "SELECT current_height FROM {CHECKPOINT_TABLE} LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(height,)| to_u64(height)).transpose()
    }

    /// Replaces the stored checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn save_checkpoint(&self, height: u64) -> Result<(), IndexerError> {
        let mut tx = self.pool.begin().await?;
        write_checkpoint(&mut tx, height).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Latest snapshot of `pair_addr` strictly below `height`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn latest_reserve_before(
        &self,
        pair_addr: &str,
        height: u64,
    ) -> Result<Option<PoolReserveSnapshot>, IndexerError> {
        let height = i64::try_from(height).unwrap_or(i64::MAX);
        let row = sqlx::query_as::<_, (String, i64, i64, i64, i64, i64, String)>(
            "SELECT pair_addr, offer_pool_amount, ask_pool_amount, total_share, height, timestamp, \
             unique_key FROM pool_amount_history WHERE pair_addr = ? AND height < ? \
             ORDER BY height DESC, timestamp DESC LIMIT 1",
        )
        .bind(pair_addr)
        .bind(height)
        .fetch_optional(&self.pool)
        .await?;
        row.map(snapshot_from_row).transpose()
    }

    /// Latest snapshot of `pair_addr`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn latest_reserve(
        &self,
        pair_addr: &str,
    ) -> Result<Option<PoolReserveSnapshot>, IndexerError> {
        self.latest_reserve_before(pair_addr, u64::MAX).await
    }

    /// Stored swaps of the given `(pair_key, bucket timestamp)` groups, in
    /// on-chain order.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn swaps_in_buckets(
        &self,
        buckets: &[(String, i64)],
    ) -> Result<Vec<SwapEvent>, IndexerError> {
        let mut out = Vec::new();
        for (pair_key, timestamp) in buckets {
            let rows = sqlx::query(&format!(
                "{SWAP_SELECT} WHERE pair_key = ? AND timestamp = ? \
                 ORDER BY tx_height, tx_index, msg_index, rowid"
            ))
            .bind(pair_key)
            .bind(timestamp)
            .fetch_all(&self.pool)
            .await?;
            for row in &rows {
                out.push(swap_from_row(row)?);
            }
        }
        Ok(out)
    }

    /// Stored swaps of `pair_key` with bucketed timestamps in `[from, to]`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn swaps_between(
        &self,
        pair_key: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<SwapEvent>, IndexerError> {
        let rows = sqlx::query(&format!(
            "{SWAP_SELECT} WHERE pair_key = ? AND timestamp BETWEEN ? AND ? \
             ORDER BY tx_height, tx_index, msg_index, rowid"
        ))
        .bind(pair_key)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(swap_from_row).collect()
    }

    /// Exact base and quote swap volume of `pair_key` over `[from, to]`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn aggregate_volume(
        &self,
        pair_key: &str,
        from: i64,
        to: i64,
    ) -> Result<VolumeTotals, IndexerError> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT direction, offer_amount, return_amount FROM swap_ops_data \
             WHERE pair_key = ? AND timestamp BETWEEN ? AND ?",
        )
        .bind(pair_key)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = VolumeTotals::default();
        for (direction, offer, ret) in rows {
            let (offer, ret) = (to_u128(offer)?, to_u128(ret)?);
            let (base, quote) = match Direction::from_str(&direction) {
                Ok(Direction::Sell) => (offer, ret),
                Ok(Direction::Buy) => (ret, offer),
                Err(e) => return Err(IndexerError::Persistence(e)),
            };
            totals.base = totals.base.saturating_add(base);
            totals.quote = totals.quote.saturating_add(quote);
            totals.swaps = totals.swaps.saturating_add(1);
        }
        Ok(totals)
    }

    /// Reserve series of `pair_addr` over `[from, to]`, one point per
    /// `bucket_secs` bucket holding the last snapshot in that bucket.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::InvalidRequest`] for a non-positive bucket or
    /// [`IndexerError::Persistence`] on database failure.
    pub async fn liquidity_series(
        &self,
        pair_addr: &str,
        from: i64,
        to: i64,
        bucket_secs: i64,
    ) -> Result<Vec<LiquidityPoint>, IndexerError> {
        if bucket_secs <= 0 {
            return Err(IndexerError::InvalidRequest(
                "bucket must be a positive number of seconds".to_string(),
            ));
        }
        let rows = sqlx::query_as::<_, (String, i64, i64, i64, i64, i64, String)>(
            "SELECT pair_addr, offer_pool_amount, ask_pool_amount, total_share, height, timestamp, \
             unique_key FROM pool_amount_history \
             WHERE pair_addr = ? AND timestamp BETWEEN ? AND ? ORDER BY height, timestamp",
        )
        .bind(pair_addr)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        let mut points: BTreeMap<i64, LiquidityPoint> = BTreeMap::new();
        for row in rows {
            let snapshot = snapshot_from_row(row)?;
            let bucket = crate::service::dedup::round_time(snapshot.timestamp, bucket_secs);
            points.insert(
                bucket,
                LiquidityPoint {
                    timestamp: bucket,
                    offer_pool_amount: snapshot.offer_pool_amount,
                    ask_pool_amount: snapshot.ask_pool_amount,
                    total_share: snapshot.total_share,
                    height: snapshot.height,
                },
            );
        }
        Ok(points.into_values().collect())
    }

    /// Candles of `pair_key` with timestamps in `[from, to]`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn candles(
        &self,
        pair_key: &str,
        from: i64,
        to: i64,
    ) -> Result<Vec<OhlcvCandle>, IndexerError> {
        let rows = sqlx::query_as::<_, (String, i64, f64, f64, f64, f64, i64, i64, String)>(
            "SELECT pair, timestamp, open, high, low, close, volume, swap_count, unique_key \
             FROM swap_ohlcv WHERE pair = ? AND timestamp BETWEEN ? AND ? ORDER BY timestamp",
        )
        .bind(pair_key)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(
                |(pair, timestamp, open, high, low, close, volume, swap_count, unique_key)|
                 -> Result<OhlcvCandle, IndexerError> {
                    Ok(OhlcvCandle {
                        pair,
                        timestamp,
                        open,
                        high,
                        low,
                        close,
                        volume: to_u128(volume)?,
                        swap_count: to_u64(swap_count)?,
                        unique_key,
                    })
                },
            )
            .collect()
    }

    /// Most recent APR record of `pair_addr`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn latest_apr(&self, pair_addr: &str) -> Result<Option<PoolAprRecord>, IndexerError> {
        let row = sqlx::query_as::<_, (String, i64, i64, i64, String, f64, i64, String)>(
            "SELECT pair_addr, height, total_supply, total_bond_amount, reward_per_sec, apr, \
             timestamp, unique_key FROM pool_apr WHERE pair_addr = ? \
             ORDER BY height DESC LIMIT 1",
        )
        .bind(pair_addr)
        .fetch_optional(&self.pool)
        .await?;

        row.map(
            |(pair_addr, height, supply, bond, reward_per_sec, apr, timestamp, unique_key)|
             -> Result<PoolAprRecord, IndexerError> {
                Ok(PoolAprRecord {
                    pair_addr,
                    height: to_u64(height)?,
                    total_supply: to_u128(supply)?,
                    total_bond_amount: to_u128(bond)?,
                    reward_per_sec,
                    apr,
                    timestamp,
                    unique_key,
                })
            },
        )
        .transpose()
    }

    /// Number of rows in `table`.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::InvalidRequest`] for a table the store does
    /// not manage, or [`IndexerError::Persistence`] on database failure.
    pub async fn count(&self, table: &str) -> Result<u64, IndexerError> {
        let known = ALL_TABLES.iter().any(|schema| schema.name == table) || table == CHECKPOINT_TABLE;
        if !known {
            return Err(IndexerError::InvalidRequest(format!("unknown table {table}")));
        }
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&self.pool)
            .await?;
        to_u64(count)
    }

    /// Writes the pair table, replacing rows with the same pair address.
    /// Pairs without an address are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn upsert_pairs(&self, pairs: &[PairMetadata]) -> Result<u64, IndexerError> {
        let known: Vec<PairMetadata> = pairs
            .iter()
            .filter(|pair| !pair.pair_addr.is_empty())
            .cloned()
            .collect();
        self.insert_bulk(&known).await
    }

    /// Reads the pair table.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Persistence`] on database failure.
    pub async fn list_pairs(&self) -> Result<Vec<PairRow>, IndexerError> {
        let rows = sqlx::query_as::<
            _,
            (String, String, String, String, String, String, i64, i64, String),
        >(
            "SELECT pair_addr, liquidity_addr, oracle_addr, base_denom, quote_denom, symbols, \
             base_decimals, quote_decimals, commission_rate FROM pair_infos ORDER BY rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(
                |(
                    pair_addr,
                    liquidity_addr,
                    oracle_addr,
                    base_denom,
                    quote_denom,
                    symbols,
                    base_decimals,
                    quote_decimals,
                    commission_rate,
                )| PairRow {
                    pair_addr,
                    liquidity_addr,
                    oracle_addr,
                    base_denom,
                    quote_denom,
                    symbols,
                    base_decimals,
                    quote_decimals,
                    commission_rate,
                },
            )
            .collect())
    }
}

fn encode_rows<R: Record>(rows: &[R]) -> Result<Vec<Vec<SqlValue>>, IndexerError> {
    rows.iter()
        .map(|row| {
            let values = row.values();
            R::SCHEMA.validate(&values)?;
            Ok(values)
        })
        .collect()
}

async fn insert_encoded<R: Record>(
    conn: &mut SqliteConnection,
    rows: &[Vec<SqlValue>],
) -> Result<u64, IndexerError> {
    let mut written = 0;
    for chunk in rows.chunks(INSERT_CHUNK) {
        let mut builder: QueryBuilder<'_, Sqlite> = QueryBuilder::new(R::SCHEMA.insert_prefix());
        builder.push_values(chunk, |mut row, values| {
            for value in values {
                match value {
                    SqlValue::Integer(v) => row.push_bind(*v),
                    SqlValue::Real(v) => row.push_bind(*v),
                    SqlValue::Text(v) => row.push_bind(v.clone()),
                    SqlValue::Null => row.push_bind(None::<String>),
                };
            }
        });
        written += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(written)
}

async fn write_checkpoint(conn: &mut SqliteConnection, height: u64) -> Result<(), IndexerError> {
    let height = i64::try_from(height)
        .map_err(|_| IndexerError::Internal(format!("checkpoint {height} out of range")))?;
    sqlx::query(&format!("DELETE FROM {CHECKPOINT_TABLE}"))
        .execute(&mut *conn)
        .await?;
    sqlx::query(&format!(
        "INSERT INTO {CHECKPOINT_TABLE} (current_height) VALUES (?)"
    ))
    .bind(height)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::unique_key;

    async fn store() -> AnalyticalStore {
        let Ok(store) = AnalyticalStore::in_memory().await else {
            panic!("in-memory store should open");
        };
        store
    }

    fn swap(height: u64, offer: u128, ret: u128, ts: i64) -> SwapEvent {
        SwapEvent {
            tx_hash: format!("tx{height}"),
            offer_denom: "orai".to_string(),
            offer_amount: offer,
            ask_denom: "usdt".to_string(),
            return_amount: ret,
            tax_amount: 0,
            commission_amount: 1,
            spread_amount: 0,
            direction: Direction::Sell,
            pair_addr: "orai1pair".to_string(),
            pair_key: "orai-usdt".to_string(),
            sender: "orai1trader".to_string(),
            height,
            tx_index: 0,
            msg_index: 0,
            timestamp: ts,
            unique_key: unique_key(height, "orai", offer, "usdt", ret),
        }
    }

    #[tokio::test]
    async fn reinserting_the_same_rows_is_a_no_op() {
        let store = store().await;
        let rows = vec![swap(1, 10, 20, 60), swap(2, 11, 21, 60)];
        assert!(matches!(store.insert_bulk(&rows).await, Ok(2)));
        assert!(matches!(store.insert_bulk(&rows).await, Ok(0)));
        assert!(matches!(store.count("swap_ops_data").await, Ok(2)));
    }

    #[tokio::test]
    async fn oversized_amount_is_rejected_before_writing() {
        let store = store().await;
        let rows = vec![swap(1, 10, 20, 60), swap(2, u128::MAX, 1, 60)];
        let Err(IndexerError::SchemaMismatch { table, column, .. }) = store.insert_bulk(&rows).await
        else {
            panic!("schema mismatch expected");
        };
        assert_eq!(table, "swap_ops_data");
        assert_eq!(column, "offer_amount");
        assert!(matches!(store.count("swap_ops_data").await, Ok(0)));
    }

    #[tokio::test]
    async fn checkpoint_holds_a_single_row() {
        let store = store().await;
        assert!(matches!(store.load_checkpoint().await, Ok(None)));
        assert!(store.save_checkpoint(100).await.is_ok());
        assert!(store.save_checkpoint(250).await.is_ok());
        assert!(matches!(store.load_checkpoint().await, Ok(Some(250))));
        assert!(matches!(store.count(CHECKPOINT_TABLE).await, Ok(1)));
    }

    #[tokio::test]
    async fn batch_is_atomic() {
        let store = store().await;
        let batch = BatchWrite {
            swaps: vec![swap(1, 10, 20, 60)],
            snapshots: vec![PoolReserveSnapshot::new("orai1pair", -1, 0, 0, 1, 60)],
            checkpoint: 2,
            ..BatchWrite::default()
        };
        assert!(store.persist_batch(&batch).await.is_ok());

        let bad = BatchWrite {
            swaps: vec![swap(5, 1, 1, 120)],
            candles: vec![OhlcvCandle {
                pair: "orai-usdt".to_string(),
                timestamp: 120,
                open: f64::NAN,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                volume: 1,
                swap_count: 1,
                unique_key: "120-orai-usdt".to_string(),
            }],
            checkpoint: 6,
            ..BatchWrite::default()
        };
        assert!(store.persist_batch(&bad).await.is_err());
        assert!(matches!(store.count("swap_ops_data").await, Ok(1)));
        assert!(matches!(store.load_checkpoint().await, Ok(Some(2))));
    }

    #[tokio::test]
    async fn latest_reserve_before_is_strict() {
        let store = store().await;
        let snapshots = vec![
            PoolReserveSnapshot::new("orai1pair", 10, 10, 10, 5, 60),
            PoolReserveSnapshot::new("orai1pair", 20, 20, 20, 9, 120),
            PoolReserveSnapshot::new("orai1other", 99, 99, 99, 3, 60),
        ];
        assert!(store.insert_bulk(&snapshots).await.is_ok());

        let Ok(Some(seed)) = store.latest_reserve_before("orai1pair", 9).await else {
            panic!("seed expected");
        };
        assert_eq!(seed.offer_pool_amount, 10);
        assert!(matches!(store.latest_reserve_before("orai1pair", 5).await, Ok(None)));
        let Ok(Some(latest)) = store.latest_reserve("orai1pair").await else {
            panic!("latest expected");
        };
        assert_eq!(latest.height, 9);
    }

    #[tokio::test]
    async fn swaps_round_trip_through_bucket_lookup() {
        let store = store().await;
        let rows = vec![swap(3, 10, 20, 60), swap(1, 11, 21, 60), swap(2, 12, 22, 120)];
        assert!(store.insert_bulk(&rows).await.is_ok());

        let Ok(found) = store.swaps_in_buckets(&[("orai-usdt".to_string(), 60)]).await else {
            panic!("lookup should succeed");
        };
        let heights: Vec<u64> = found.iter().map(|s| s.height).collect();
        assert_eq!(heights, vec![1, 3]);
        assert_eq!(found.first(), rows.get(1));
    }

    #[tokio::test]
    async fn same_height_swaps_come_back_in_chain_order() {
        let store = store().await;
        let mut late = swap(5, 10, 20, 60);
        late.tx_index = 3;
        let mut early = swap(5, 11, 21, 60);
        early.tx_index = 1;
        early.msg_index = 2;
        assert!(store.insert_bulk(&[late, early]).await.is_ok());

        let Ok(found) = store.swaps_in_buckets(&[("orai-usdt".to_string(), 60)]).await else {
            panic!("lookup should succeed");
        };
        let positions: Vec<(u64, u32, u32)> = found.iter().map(SwapEvent::position).collect();
        assert_eq!(positions, vec![(5, 1, 2), (5, 3, 0)]);
    }

    #[tokio::test]
    async fn volume_is_summed_per_side() {
        let store = store().await;
        let mut buy = swap(2, 7, 3, 60);
        buy.direction = Direction::Buy;
        let rows = vec![swap(1, 10, 20, 60), buy, swap(3, 100, 100, 600)];
        assert!(store.insert_bulk(&rows).await.is_ok());

        let Ok(totals) = store.aggregate_volume("orai-usdt", 0, 120).await else {
            panic!("aggregate should succeed");
        };
        assert_eq!(totals.base, 13);
        assert_eq!(totals.quote, 27);
        assert_eq!(totals.swaps, 2);
    }

    #[tokio::test]
    async fn liquidity_series_keeps_last_point_per_bucket() {
        let store = store().await;
        let snapshots = vec![
            PoolReserveSnapshot::new("orai1pair", 1, 1, 1, 1, 60),
            PoolReserveSnapshot::new("orai1pair", 2, 2, 2, 2, 120),
            PoolReserveSnapshot::new("orai1pair", 3, 3, 3, 3, 3_660),
        ];
        assert!(store.insert_bulk(&snapshots).await.is_ok());

        let Ok(series) = store.liquidity_series("orai1pair", 0, 4_000, 3_600).await else {
            panic!("series should load");
        };
        let points: Vec<(i64, i128)> = series.iter().map(|p| (p.timestamp, p.offer_pool_amount)).collect();
        assert_eq!(points, vec![(0, 2), (3_600, 3)]);
        assert!(store.liquidity_series("orai1pair", 0, 1, 0).await.is_err());
    }

    #[tokio::test]
    async fn unknown_tables_are_refused() {
        let store = store().await;
        assert!(matches!(
            store.count("sqlite_master; DROP TABLE swap_ops_data").await,
            Err(IndexerError::InvalidRequest(_))
        ));
    }
}

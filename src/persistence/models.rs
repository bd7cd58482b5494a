//! Table schemas and row encoding for the analytical store.
//!
//! Every persisted record implements [`Record`]: a static [`TableSchema`]
//! plus an ordered list of [`SqlValue`]s. Values are checked against the
//! declared column kinds before any SQL runs, so a value of the wrong kind is
//! reported as [`IndexerError::SchemaMismatch`] naming the table and column.

use serde::Serialize;

use crate::domain::{
    LiquidityEvent, OhlcvCandle, PairMetadata, PoolAprRecord, PoolReserveSnapshot, SwapEvent,
};
use crate::error::IndexerError;
use ColumnKind::{Integer, Real, Text};

/// Storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit float.
    Real,
    /// UTF-8 text.
    Text,
}

impl ColumnKind {
    /// SQL type name.
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Real => "REAL",
            Self::Text => "TEXT",
        }
    }
}

/// One declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: &'static str,
    /// Declared kind.
    pub kind: ColumnKind,
}

const fn col(name: &'static str, kind: ColumnKind) -> Column {
    Column { name, kind }
}

/// What happens when a row's unique key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Keep the stored row (`INSERT OR IGNORE`).
    Ignore,
    /// Overwrite the stored row (`INSERT OR REPLACE`).
    Replace,
}

/// Static description of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    /// Table name.
    pub name: &'static str,
    /// Columns in insert order.
    pub columns: &'static [Column],
    /// Column carrying the idempotency key.
    pub unique: &'static str,
    /// Conflict handling on the unique key.
    pub conflict: ConflictPolicy,
}

impl TableSchema {
    /// `CREATE TABLE IF NOT EXISTS` statement. Tables are `STRICT`, so the
    /// engine rejects mistyped values as well.
    #[must_use]
    pub fn create_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| format!("{} {} NOT NULL", c.name, c.kind.sql()))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({}, UNIQUE ({})) STRICT",
            self.name,
            columns.join(", "),
            self.unique
        )
    }

    /// `INSERT ... (cols) ` prefix honoring the conflict policy.
    #[must_use]
    pub fn insert_prefix(&self) -> String {
        let verb = match self.conflict {
            ConflictPolicy::Ignore => "INSERT OR IGNORE",
            ConflictPolicy::Replace => "INSERT OR REPLACE",
        };
        let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
        format!("{verb} INTO {} ({}) ", self.name, names.join(", "))
    }

    /// Checks `values` against the declared columns.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::SchemaMismatch`] for the first value whose kind
    /// differs from its column, and [`IndexerError::Internal`] when the value
    /// count is wrong.
    pub fn validate(&self, values: &[SqlValue]) -> Result<(), IndexerError> {
        if values.len() != self.columns.len() {
            return Err(IndexerError::Internal(format!(
                "{}: {} values for {} columns",
                self.name,
                values.len(),
                self.columns.len()
            )));
        }
        for (column, value) in self.columns.iter().zip(values) {
            if !value.fits(column.kind) {
                return Err(IndexerError::SchemaMismatch {
                    table: self.name,
                    column: column.name,
                    expected: column.kind.sql(),
                    found: value.kind_name(),
                });
            }
        }
        Ok(())
    }
}

/// A value bound into an insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SqlValue {
    /// Integer value.
    Integer(i64),
    /// Float value.
    Real(f64),
    /// Text value.
    Text(String),
    /// SQL `NULL`.
    Null,
}

impl SqlValue {
    /// Encodes an unsigned amount; amounts beyond `i64` become text and are
    /// rejected by integer columns.
    #[must_use]
    pub fn amount(value: u128) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Integer)
    }

    /// Encodes a signed accumulation.
    #[must_use]
    pub fn signed(value: i128) -> Self {
        i64::try_from(value).map_or_else(|_| Self::Text(value.to_string()), Self::Integer)
    }

    /// Encodes a height.
    #[must_use]
    pub fn height(value: u64) -> Self {
        Self::amount(u128::from(value))
    }

    /// Encodes text.
    #[must_use]
    pub fn text(value: &str) -> Self {
        Self::Text(value.to_string())
    }

    fn fits(&self, kind: ColumnKind) -> bool {
        match (self, kind) {
            (Self::Integer(_), ColumnKind::Integer) | (Self::Text(_), ColumnKind::Text) => true,
            (Self::Real(v), ColumnKind::Real) => v.is_finite(),
            _ => false,
        }
    }

    /// Kind name used in error messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Integer(_) => "INTEGER",
            Self::Real(_) => "REAL",
            Self::Text(_) => "TEXT",
            Self::Null => "NULL",
        }
    }
}

/// A row type with a fixed table schema.
pub trait Record {
    /// Table the record is written to.
    const SCHEMA: TableSchema;

    /// Column values in [`TableSchema::columns`] order.
    fn values(&self) -> Vec<SqlValue>;
}

/// `swap_ops_data`.
pub const SWAP_OPS: TableSchema = TableSchema {
    name: "swap_ops_data",
    columns: &[
        col("tx_hash", Text),
        col("offer_denom", Text),
        col("offer_amount", Integer),
        col("ask_denom", Text),
        col("return_amount", Integer),
        col("tax_amount", Integer),
        col("commission_amount", Integer),
        col("spread_amount", Integer),
        col("direction", Text),
        col("pair_addr", Text),
        col("pair_key", Text),
        col("sender", Text),
        col("tx_height", Integer),
        col("tx_index", Integer),
        col("msg_index", Integer),
        col("timestamp", Integer),
        col("unique_key", Text),
    ],
    unique: "unique_key",
    conflict: ConflictPolicy::Ignore,
};

/// `lp_ops_data`.
pub const LP_OPS: TableSchema = TableSchema {
    name: "lp_ops_data",
    columns: &[
        col("tx_hash", Text),
        col("base_denom", Text),
        col("base_amount", Integer),
        col("quote_denom", Text),
        col("quote_amount", Integer),
        col("base_reserve", Integer),
        col("quote_reserve", Integer),
        col("base_price", Real),
        col("op_type", Text),
        col("protocol_fee", Integer),
        col("share", Integer),
        col("creator", Text),
        col("pair_addr", Text),
        col("tx_height", Integer),
        col("tx_index", Integer),
        col("msg_index", Integer),
        col("timestamp", Integer),
        col("unique_key", Text),
    ],
    unique: "unique_key",
    conflict: ConflictPolicy::Ignore,
};

/// `pool_amount_history`.
pub const POOL_AMOUNT_HISTORY: TableSchema = TableSchema {
    name: "pool_amount_history",
    columns: &[
        col("pair_addr", Text),
        col("offer_pool_amount", Integer),
        col("ask_pool_amount", Integer),
        col("total_share", Integer),
        col("height", Integer),
        col("timestamp", Integer),
        col("unique_key", Text),
    ],
    unique: "unique_key",
    conflict: ConflictPolicy::Replace,
};

/// `swap_ohlcv`.
pub const SWAP_OHLCV: TableSchema = TableSchema {
    name: "swap_ohlcv",
    columns: &[
        col("pair", Text),
        col("timestamp", Integer),
        col("open", Real),
        col("high", Real),
        col("low", Real),
        col("close", Real),
        col("volume", Integer),
        col("swap_count", Integer),
        col("unique_key", Text),
    ],
    unique: "unique_key",
    conflict: ConflictPolicy::Replace,
};

/// `pool_apr`.
pub const POOL_APR: TableSchema = TableSchema {
    name: "pool_apr",
    columns: &[
        col("pair_addr", Text),
        col("height", Integer),
        col("total_supply", Integer),
        col("total_bond_amount", Integer),
        col("reward_per_sec", Text),
        col("apr", Real),
        col("timestamp", Integer),
        col("unique_key", Text),
    ],
    unique: "unique_key",
    conflict: ConflictPolicy::Replace,
};

/// `pair_infos`.
pub const PAIR_INFOS: TableSchema = TableSchema {
    name: "pair_infos",
    columns: &[
        col("pair_addr", Text),
        col("liquidity_addr", Text),
        col("oracle_addr", Text),
        col("base_denom", Text),
        col("quote_denom", Text),
        col("symbols", Text),
        col("base_decimals", Integer),
        col("quote_decimals", Integer),
        col("commission_rate", Text),
    ],
    unique: "pair_addr",
    conflict: ConflictPolicy::Replace,
};

/// Every record table, in creation order.
pub const ALL_TABLES: [TableSchema; 6] =
    [SWAP_OPS, LP_OPS, POOL_AMOUNT_HISTORY, SWAP_OHLCV, POOL_APR, PAIR_INFOS];

/// Singleton checkpoint table.
pub const CHECKPOINT_TABLE: &str = "sync_checkpoint";

impl Record for SwapEvent {
    const SCHEMA: TableSchema = SWAP_OPS;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(&self.tx_hash),
            SqlValue::text(&self.offer_denom),
            SqlValue::amount(self.offer_amount),
            SqlValue::text(&self.ask_denom),
            SqlValue::amount(self.return_amount),
            SqlValue::amount(self.tax_amount),
            SqlValue::amount(self.commission_amount),
            SqlValue::amount(self.spread_amount),
            SqlValue::text(self.direction.as_str()),
            SqlValue::text(&self.pair_addr),
            SqlValue::text(&self.pair_key),
            SqlValue::text(&self.sender),
            SqlValue::height(self.height),
            SqlValue::Integer(i64::from(self.tx_index)),
            SqlValue::Integer(i64::from(self.msg_index)),
            SqlValue::Integer(self.timestamp),
            SqlValue::text(&self.unique_key),
        ]
    }
}

impl Record for LiquidityEvent {
    const SCHEMA: TableSchema = LP_OPS;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(&self.tx_hash),
            SqlValue::text(&self.base_denom),
            SqlValue::amount(self.base_amount),
            SqlValue::text(&self.quote_denom),
            SqlValue::amount(self.quote_amount),
            SqlValue::amount(self.base_reserve),
            SqlValue::amount(self.quote_reserve),
            SqlValue::Real(self.base_price),
            SqlValue::text(self.op_type.as_str()),
            SqlValue::amount(self.protocol_fee),
            SqlValue::amount(self.share),
            SqlValue::text(&self.creator),
            SqlValue::text(&self.pair_addr),
            SqlValue::height(self.height),
            SqlValue::Integer(i64::from(self.tx_index)),
            SqlValue::Integer(i64::from(self.msg_index)),
            SqlValue::Integer(self.timestamp),
            SqlValue::text(&self.unique_key),
        ]
    }
}

impl Record for PoolReserveSnapshot {
    const SCHEMA: TableSchema = POOL_AMOUNT_HISTORY;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(&self.pair_addr),
            SqlValue::signed(self.offer_pool_amount),
            SqlValue::signed(self.ask_pool_amount),
            SqlValue::signed(self.total_share),
            SqlValue::height(self.height),
            SqlValue::Integer(self.timestamp),
            SqlValue::text(&self.unique_key),
        ]
    }
}

impl Record for OhlcvCandle {
    const SCHEMA: TableSchema = SWAP_OHLCV;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(&self.pair),
            SqlValue::Integer(self.timestamp),
            SqlValue::Real(self.open),
            SqlValue::Real(self.high),
            SqlValue::Real(self.low),
            SqlValue::Real(self.close),
            SqlValue::amount(self.volume),
            SqlValue::amount(u128::from(self.swap_count)),
            SqlValue::text(&self.unique_key),
        ]
    }
}

impl Record for PoolAprRecord {
    const SCHEMA: TableSchema = POOL_APR;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(&self.pair_addr),
            SqlValue::height(self.height),
            SqlValue::amount(self.total_supply),
            SqlValue::amount(self.total_bond_amount),
            SqlValue::text(&self.reward_per_sec),
            SqlValue::Real(self.apr),
            SqlValue::Integer(self.timestamp),
            SqlValue::text(&self.unique_key),
        ]
    }
}

impl Record for PairMetadata {
    const SCHEMA: TableSchema = PAIR_INFOS;

    fn values(&self) -> Vec<SqlValue> {
        vec![
            SqlValue::text(&self.pair_addr),
            SqlValue::text(&self.liquidity_addr),
            SqlValue::text(self.oracle_addr.as_deref().unwrap_or_default()),
            SqlValue::text(self.base.denom()),
            SqlValue::text(self.quote.denom()),
            SqlValue::Text(self.symbol()),
            SqlValue::Integer(i64::from(self.base_decimals)),
            SqlValue::Integer(i64::from(self.quote_decimals)),
            SqlValue::text(&self.commission_rate),
        ]
    }
}

/// A row of `pair_infos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PairRow {
    /// Pair contract address.
    pub pair_addr: String,
    /// LP token address.
    pub liquidity_addr: String,
    /// Oracle contract address, empty when none.
    pub oracle_addr: String,
    /// Base denom.
    pub base_denom: String,
    /// Quote denom.
    pub quote_denom: String,
    /// `BASE/QUOTE` symbol.
    pub symbols: String,
    /// Base decimals.
    pub base_decimals: i64,
    /// Quote decimals.
    pub quote_decimals: i64,
    /// Commission rate.
    pub commission_rate: String,
}

/// One point of a bucketed liquidity series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LiquidityPoint {
    /// Bucket start, unix seconds.
    pub timestamp: i64,
    /// Base reserve at the end of the bucket.
    pub offer_pool_amount: i128,
    /// Quote reserve at the end of the bucket.
    pub ask_pool_amount: i128,
    /// Total share at the end of the bucket.
    pub total_share: i128,
    /// Height of the last snapshot in the bucket.
    pub height: u64,
}

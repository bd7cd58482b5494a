//! Indexer configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Unparseable numeric values fall back to
//! their defaults.

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::IndexerError;

/// First height worth scanning on Oraichain mainnet for the curated pairs.
pub const DEFAULT_INITIAL_SYNC_HEIGHT: u64 = 12_388_825;

/// Path accepted by the store for a throwaway in-memory database.
pub const IN_MEMORY_STORE: &str = ":memory:";

/// Top-level indexer configuration.
///
/// Loaded once at startup via [`IndexerConfig::from_env`].
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Checkpoint used when the store holds none (`INITIAL_SYNC_HEIGHT`).
    pub initial_sync_height: u64,

    /// Number of heights per fetch window (`LIMIT`).
    pub limit: u64,

    /// Number of fetch windows requested in parallel (`MAX_THREAD_LEVEL`).
    pub max_thread_level: u64,

    /// Tendermint RPC endpoint (`RPC_URL`).
    pub rpc_url: String,

    /// Analytical store path, or `:memory:` (`DUCKDB_FILENAME`).
    pub store_path: String,

    /// Maximum number of store connections (`DATABASE_MAX_CONNECTIONS`).
    pub database_max_connections: u32,

    /// Width of a time bucket in seconds (`BUCKET_SECS`).
    pub bucket_secs: i64,

    /// Wait between polls when the chain has no new data (`POLL_INTERVAL_MS`).
    pub poll_interval: Duration,

    /// Wait before retrying a failed batch (`RETRY_INTERVAL_MS`).
    pub retry_interval: Duration,

    /// Factory v1 contract (`FACTORY_CONTRACT`).
    pub factory_contract: String,

    /// Factory v2 contract (`FACTORY_V2_CONTRACT`).
    pub factory_v2_contract: String,

    /// LP staking contract (`STAKING_CONTRACT`).
    pub staking_contract: String,

    /// Whether to serve the read-only HTTP API (`API_ENABLED`).
    pub api_enabled: bool,

    /// Socket address for the HTTP API (`LISTEN_ADDR`).
    pub listen_addr: SocketAddr,

    /// Emit JSON logs instead of plain text (`LOG_FORMAT=json`).
    pub json_logs: bool,
}

impl IndexerConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to sensible defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`IndexerError::Config`] if `LISTEN_ADDR` is set but cannot be
    /// parsed as a [`SocketAddr`], or if `BUCKET_SECS` / `LIMIT` /
    /// `MAX_THREAD_LEVEL` resolve to zero.
    pub fn from_env() -> Result<Self, IndexerError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:2024".to_string())
            .parse()
            .map_err(|e| IndexerError::Config(format!("invalid LISTEN_ADDR: {e}")))?;

        let config = Self {
            initial_sync_height: parse_env("INITIAL_SYNC_HEIGHT", DEFAULT_INITIAL_SYNC_HEIGHT),
            limit: parse_env("LIMIT", 1_000),
            max_thread_level: parse_env("MAX_THREAD_LEVEL", 3),
            rpc_url: std::env::var("RPC_URL").unwrap_or_else(|_| "https://rpc.orai.io".to_string()),
            store_path: std::env::var("DUCKDB_FILENAME")
                .unwrap_or_else(|_| "oraidex-sync-data.db".to_string()),
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 5),
            bucket_secs: parse_env("BUCKET_SECS", 60),
            poll_interval: Duration::from_millis(parse_env("POLL_INTERVAL_MS", 5_000)),
            retry_interval: Duration::from_millis(parse_env("RETRY_INTERVAL_MS", 10_000)),
            factory_contract: std::env::var("FACTORY_CONTRACT").unwrap_or_else(|_| {
                "orai1hemdkz4xx9kukgrunxu3yw0nvpyxf34v82d2c8".to_string()
            }),
            factory_v2_contract: std::env::var("FACTORY_V2_CONTRACT").unwrap_or_else(|_| {
                "orai167r4ut7avvgpp3rlzksz6vw5spmykluzagvmj3ht845fjschwugqjsqhst".to_string()
            }),
            staking_contract: std::env::var("STAKING_CONTRACT").unwrap_or_else(|_| {
                "orai19p43y0tqnr5qlhfwnxft2u5unph5yn60y7tuvu".to_string()
            }),
            api_enabled: parse_env_bool("API_ENABLED", true),
            listen_addr,
            json_logs: std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")),
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns a configuration suitable for tests: in-memory store, no API,
    /// millisecond waits.
    #[must_use]
    pub fn for_tests(initial_sync_height: u64) -> Self {
        Self {
            initial_sync_height,
            limit: 100,
            max_thread_level: 1,
            rpc_url: "http://127.0.0.1:26657".to_string(),
            store_path: IN_MEMORY_STORE.to_string(),
            database_max_connections: 1,
            bucket_secs: 60,
            poll_interval: Duration::from_millis(1),
            retry_interval: Duration::from_millis(1),
            factory_contract: String::new(),
            factory_v2_contract: String::new(),
            staking_contract: "staking".to_string(),
            api_enabled: false,
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            json_logs: false,
        }
    }

    /// Returns `true` when the store is a throwaway in-memory database.
    #[must_use]
    pub fn is_in_memory(&self) -> bool {
        self.store_path == IN_MEMORY_STORE
    }

    fn validate(&self) -> Result<(), IndexerError> {
        if self.bucket_secs <= 0 {
            return Err(IndexerError::Config("BUCKET_SECS must be positive".to_string()));
        }
        if self.limit == 0 || self.max_thread_level == 0 {
            return Err(IndexerError::Config(
                "LIMIT and MAX_THREAD_LEVEL must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref() {
        Some("true") | Some("TRUE") | Some("1") => true,
        Some("false") | Some("FALSE") | Some("0") => false,
        _ => default,
    }
}

//! # oraidex-indexer
//!
//! Chain indexer for the OraiDEX automated market maker on Oraichain.
//!
//! The indexer pulls transactions from a Tendermint RPC node, extracts swap,
//! liquidity and staking events for a curated set of pairs, rebuilds per-pool
//! reserve history and derives OHLCV candles and staking APR. Everything is
//! written to an embedded SQLite store together with a height checkpoint, so
//! a restarted indexer resumes exactly where the last committed batch ended.
//!
//! ## Architecture
//!
//! ```text
//! Tendermint RPC (tx_search, blockchain, abci_query)
//!     │
//!     ├── RpcChainSource / RpcContractQuerier (chain/)
//!     │
//!     ├── SyncService (service/)
//!     │     ├── EventExtractor (extract/)
//!     │     ├── dedup + time bucketing
//!     │     ├── ReserveAccumulator
//!     │     ├── OHLCV builder
//!     │     └── AprEngine + PriceOracle
//!     │
//!     ├── AnalyticalStore (persistence/, SQLite)
//!     │
//!     └── Read-only REST API (api/)
//! ```

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod persistence;
pub mod service;

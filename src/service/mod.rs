//! Service layer: the indexing pipeline.
//!
//! [`SyncService`] drives each chain segment through de-duplication and
//! bucketing ([`dedup`]), reserve accumulation ([`reserve_accumulator`]),
//! candle building ([`ohlcv`]) and APR refresh ([`apr`]) before handing the
//! results to the store.

pub mod apr;
pub mod dedup;
pub mod discovery;
pub mod ohlcv;
pub mod price;
pub mod reserve_accumulator;
pub mod sync_service;

pub use apr::{AprEngine, AprTriggers};
pub use discovery::discover_pairs;
pub use ohlcv::VolumeTotals;
pub use price::PriceOracle;
pub use reserve_accumulator::ReserveAccumulator;
pub use sync_service::{BatchOutcome, BatchSummary, SyncService, SyncState};

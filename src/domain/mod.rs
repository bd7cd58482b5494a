//! Domain layer: assets, curated pairs, extracted events and derived records.
//!
//! This module contains the indexer's data model. Everything here is plain
//! data plus pure lookups; I/O lives in `chain` and `persistence`.

pub mod asset;
pub mod event;
pub mod pair;
pub mod records;

pub use asset::{Asset, AssetInfo};
pub use event::{
    DexEvent, Direction, EventPosition, LiquidityEvent, LiquidityOp, StakingAction, StakingEvent,
    SwapEvent, Timestamped, UniqueKeyed, unique_key,
};
pub use pair::{Orientation, PairMetadata, PairRegistry, PriceOverride};
pub use records::{CheckpointRecord, OhlcvCandle, PoolAprRecord, PoolReserveSnapshot};

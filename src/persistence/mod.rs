//! Persistence layer: the embedded analytical store.
//!
//! Tables are declared once in [`models`] and written through
//! [`AnalyticalStore`], which validates every value against its column
//! before running SQL.

pub mod models;
pub mod store;

pub use models::{LiquidityPoint, PairRow, Record};
pub use store::{AnalyticalStore, BatchWrite};

//! Data Transfer Objects for REST request/response serialization.
//!
//! All token amounts are serialized as JSON strings to prevent
//! precision loss on values beyond 2^53.

pub mod common_dto;
pub mod pool_dto;

pub use common_dto::*;
pub use pool_dto::*;

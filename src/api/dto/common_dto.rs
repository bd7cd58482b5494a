//! Shared DTO types used across multiple endpoints.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default liquidity bucket: one hour.
const DEFAULT_BUCKET_SECS: i64 = 3_600;

/// Inclusive unix-second time range. Both ends are optional.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct RangeParams {
    /// Range start (unix seconds). Defaults to 0.
    #[serde(default)]
    pub from: Option<i64>,
    /// Range end (unix seconds). Defaults to the largest timestamp.
    #[serde(default)]
    pub to: Option<i64>,
}

impl RangeParams {
    /// Resolves the range, rejecting `from > to`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::IndexerError::InvalidRequest`] for an inverted
    /// range.
    pub fn resolve(&self) -> Result<(i64, i64), crate::error::IndexerError> {
        let from = self.from.unwrap_or(0);
        let to = self.to.unwrap_or(i64::MAX);
        if from > to {
            return Err(crate::error::IndexerError::InvalidRequest(format!(
                "from ({from}) is after to ({to})"
            )));
        }
        Ok((from, to))
    }
}

/// Time range plus bucket width for series endpoints.
#[derive(Debug, Clone, Copy, Deserialize, IntoParams)]
pub struct SeriesParams {
    /// Range start (unix seconds).
    #[serde(default)]
    pub from: Option<i64>,
    /// Range end (unix seconds).
    #[serde(default)]
    pub to: Option<i64>,
    /// Bucket width in seconds. Defaults to one hour.
    #[serde(default = "default_bucket")]
    pub bucket: i64,
}

impl SeriesParams {
    /// The time range part.
    #[must_use]
    pub const fn range(&self) -> RangeParams {
        RangeParams {
            from: self.from,
            to: self.to,
        }
    }
}

const fn default_bucket() -> i64 {
    DEFAULT_BUCKET_SECS
}

/// Indexing progress.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatusResponse {
    /// Next height to be indexed, if indexing has started.
    pub checkpoint: Option<u64>,
    /// Number of curated pairs being indexed.
    pub pairs: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_range_spans_everything() {
        assert!(matches!(RangeParams::default().resolve(), Ok((0, i64::MAX))));
    }

    #[test]
    fn inverted_range_is_rejected() {
        let range = RangeParams {
            from: Some(10),
            to: Some(5),
        };
        assert!(range.resolve().is_err());
    }
}

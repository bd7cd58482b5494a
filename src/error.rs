//! Indexer error types with HTTP status code mapping.
//!
//! [`IndexerError`] is the central error type for the indexer. Data-quality
//! problems found while parsing chain data are *not* errors: they are
//! reported as [`crate::extract::SkipReason`] values and never abort a batch.
//! Everything here either aborts the current batch (checkpoint untouched) or
//! is returned to an API caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 2001,
///     "message": "not found: pool orai1...",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Indexer-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status                |
/// |-----------|-------------------|----------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request            |
/// | 2000–2999 | Not Found         | 404 Not Found              |
/// | 3000–3999 | Infrastructure    | 500 / 502                  |
/// | 4000–4999 | Schema violations | 422 Unprocessable Entity   |
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// The chain data source failed to deliver a batch.
    #[error("chain source error: {0}")]
    Chain(String),

    /// An on-chain contract query failed.
    #[error("contract query error: {0}")]
    Query(String),

    /// A payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Analytical store failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A value did not match the declared column type of a table.
    #[error("schema mismatch in {table}.{column}: expected {expected}, found {found}")]
    SchemaMismatch {
        /// Table being written.
        table: &'static str,
        /// Offending column.
        column: &'static str,
        /// Declared column type.
        expected: &'static str,
        /// Type of the supplied value.
        found: &'static str,
    },

    /// The requested entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IndexerError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Config(_) => 1002,
            Self::Decode(_) => 1003,
            Self::NotFound(_) => 2001,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::Chain(_) => 3002,
            Self::Query(_) => 3003,
            Self::SchemaMismatch { .. } => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::Config(_) | Self::Decode(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Chain(_) | Self::Query(_) => StatusCode::BAD_GATEWAY,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::SchemaMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    /// Returns `true` for infrastructure failures that are expected to
    /// succeed when the same batch is retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Chain(_) | Self::Query(_) | Self::Persistence(_))
    }
}

impl From<sqlx::Error> for IndexerError {
    fn from(err: sqlx::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl IntoResponse for IndexerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_mismatch_is_fatal() {
        let err = IndexerError::SchemaMismatch {
            table: "swap_ops_data",
            column: "offer_amount",
            expected: "INTEGER",
            found: "TEXT",
        };
        assert!(!err.is_transient());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("swap_ops_data.offer_amount"));
    }

    #[test]
    fn infrastructure_errors_are_transient() {
        assert!(IndexerError::Chain("timeout".to_string()).is_transient());
        assert!(IndexerError::Query("no data".to_string()).is_transient());
        assert!(IndexerError::Persistence("locked".to_string()).is_transient());
        assert!(!IndexerError::Decode("bad".to_string()).is_transient());
    }

    #[test]
    fn codes_are_distinct_per_category() {
        assert_eq!(IndexerError::NotFound("x".to_string()).error_code(), 2001);
        assert_eq!(IndexerError::Chain("x".to_string()).error_code(), 3002);
    }
}

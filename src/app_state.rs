//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::PairRegistry;
use crate::persistence::AnalyticalStore;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Analytical store the handlers read from.
    pub store: AnalyticalStore,
    /// Curated pairs, with addresses resolved.
    pub registry: Arc<PairRegistry>,
}

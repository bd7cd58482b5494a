//! oraidex-indexer entry point.
//!
//! Opens the store, resolves pair addresses, serves the query API and runs
//! the sync loop until Ctrl-C.

use std::sync::Arc;

use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use oraidex_indexer::api;
use oraidex_indexer::app_state::AppState;
use oraidex_indexer::chain::{RpcChainSource, RpcClient, RpcContractQuerier};
use oraidex_indexer::config::IndexerConfig;
use oraidex_indexer::domain::PairRegistry;
use oraidex_indexer::persistence::AnalyticalStore;
use oraidex_indexer::service::{SyncService, discover_pairs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = IndexerConfig::from_env()?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(rpc = %config.rpc_url, store = %config.store_path, "starting oraidex-indexer");

    // Open the store
    let store = AnalyticalStore::connect(&config.store_path, config.database_max_connections).await?;
    store.create_tables().await?;

    // Chain access
    let client = RpcClient::new(&config.rpc_url);
    let querier = Arc::new(RpcContractQuerier::new(client.clone(), &config.staking_contract));
    let source = RpcChainSource::new(client, config.limit, config.max_thread_level);

    // Resolve pair addresses and persist the pair table
    let pairs = discover_pairs(
        querier.as_ref(),
        &[config.factory_v2_contract.as_str(), config.factory_contract.as_str()],
        PairRegistry::oraichain_pairs(),
    )
    .await;
    store.upsert_pairs(&pairs).await?;
    let registry = Arc::new(
        PairRegistry::new(pairs).with_price_overrides(PairRegistry::default_price_overrides()),
    );

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        if let Err(e) = shutdown_tx.send(true) {
            tracing::warn!(error = %e, "shutdown signal had no receivers");
        }
    });

    // Query API
    let api_handle = if config.api_enabled {
        let app = api::build_router()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(AppState {
                store: store.clone(),
                registry: Arc::clone(&registry),
            });
        let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
        tracing::info!(addr = %config.listen_addr, "api listening");
        let mut api_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                if api_shutdown.wait_for(|stop| *stop).await.is_err() {
                    tracing::debug!("shutdown sender dropped, stopping api");
                }
            });
            if let Err(e) = serve.await {
                tracing::error!(error = %e, "api server stopped");
            }
        }))
    } else {
        None
    };

    // Sync loop
    let service = SyncService::new(&config, store, registry, source, querier);
    let synced = service.run(shutdown_rx).await;

    // Let the API drain after a requested shutdown; a failed sync loop never
    // signals it, so stop it directly.
    if let Some(handle) = api_handle {
        if synced.is_err() {
            handle.abort();
        }
        match handle.await {
            Err(e) if !e.is_cancelled() => tracing::error!(error = %e, "api task failed"),
            _ => {}
        }
    }
    tracing::info!("oraidex-indexer stopped");
    synced?;

    Ok(())
}

//! PRAMAN registry service entry point.
//!
//! Serves the supply-chain registry (participants, batches, custody
//! hand-offs) over a small Axum REST API, backed by SQLite or a JSON snapshot
//! file. When a contract ID is configured, a background follower polls Soroban
//! `getEvents` and appends the contract's custody events to the log.

mod api;
mod config;
mod errors;
mod events;
mod indexer;
mod model;
mod registry;
mod rpc;
mod store;

use std::sync::Arc;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::{Config, StoreBackend};
use indexer::FollowerState;
use registry::Registry;
use store::{MemoryStore, RegistryStore, SqliteStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;

    let store: Arc<dyn RegistryStore> = match config.store_backend {
        StoreBackend::Sqlite => Arc::new(SqliteStore::connect(&config.database_url).await?),
        StoreBackend::Json => Arc::new(MemoryStore::open(&config.snapshot_path).await?),
    };
    info!(backend = ?config.store_backend, "Store ready");

    let shutdown = CancellationToken::new();

    // ─── Ledger follower ──────────────────────────────────
    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let follower = match FollowerState::from_config(&config, store.clone(), client) {
        Some(state) => Some(tokio::spawn(indexer::run(Arc::new(state), shutdown.clone()))),
        None => {
            info!("CONTRACT_ID not set; ledger follower disabled");
            None
        }
    };

    // ─── REST API ─────────────────────────────────────────
    let registry = Arc::new(Registry::new(store));
    let app = api::router(Arc::new(api::ApiState { registry }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = follower {
        handle.await?;
    }

    Ok(())
}

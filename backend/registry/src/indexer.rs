//! Ledger follower: a long-running background task that polls the Soroban RPC
//! and appends decoded contract events to the custody log.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::errors::Result;
use crate::rpc;
use crate::store::RegistryStore;

pub struct FollowerState {
    pub store: Arc<dyn RegistryStore>,
    pub client: Client,
    pub rpc_url: String,
    pub contract_id: String,
    pub poll_interval: Duration,
    pub events_per_page: u32,
    pub start_ledger: u32,
}

impl FollowerState {
    /// `None` when no contract is configured.
    pub fn from_config(config: &Config, store: Arc<dyn RegistryStore>, client: Client) -> Option<Self> {
        let contract_id = config.contract_id.clone()?;
        Some(Self {
            store,
            client,
            rpc_url: config.rpc_url.clone(),
            contract_id,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            events_per_page: config.events_per_page,
            start_ledger: config.start_ledger,
        })
    }
}

/// Run the follower loop until `shutdown` is cancelled.
pub async fn run(state: Arc<FollowerState>, shutdown: CancellationToken) {
    info!(contract = %state.contract_id, "Ledger follower starting");

    // Load the cursor from the store; fall back to the configured start ledger.
    let last_ledger = state.store.last_ledger().await.unwrap_or(0);
    let mut cursor = state.store.cursor().await.unwrap_or(None);
    let mut current_ledger = if last_ledger > 0 {
        last_ledger as u32
    } else {
        state.start_ledger
    };

    info!("Resuming from ledger {current_ledger}");

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            polled = poll_once(&state, current_ledger, cursor.as_deref()) => match polled {
                Ok((next_ledger, next_cursor)) => {
                    current_ledger = next_ledger;
                    cursor = next_cursor;
                }
                Err(e) => error!("Follower poll error: {e}"),
            },
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(state.poll_interval) => {}
        }
    }

    info!("Ledger follower stopped");
}

/// Perform a single poll iteration.
///
/// Returns `(next_start_ledger, next_cursor)`.
async fn poll_once(
    state: &FollowerState,
    start_ledger: u32,
    cursor: Option<&str>,
) -> Result<(u32, Option<String>)> {
    let page = rpc::fetch_events(
        &state.client,
        &state.rpc_url,
        &state.contract_id,
        start_ledger,
        cursor,
        state.events_per_page,
    )
    .await?;

    if !page.events.is_empty() {
        let decoded = rpc::decode_events(&page.events);
        let stored = state.store.append_events(&decoded).await?;
        info!(
            raw = page.events.len(),
            stored, "Polled ledger events"
        );
    }

    // A cursor keeps paging within the current range; otherwise move up to
    // the latest ledger the RPC has seen.
    let next_ledger = page
        .latest_ledger
        .map(|l| (l as u32).max(start_ledger))
        .unwrap_or(start_ledger);
    let next_cursor = page.cursor.or_else(|| cursor.map(String::from));

    // Persist so restarts are deterministic.
    state
        .store
        .save_cursor(next_ledger as i64, next_cursor.as_deref())
        .await?;

    Ok((next_ledger, next_cursor))
}

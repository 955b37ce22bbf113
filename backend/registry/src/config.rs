//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::{RegistryError, Result};

/// Which [`crate::store::RegistryStore`] backs the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    /// In-process store persisted as one JSON snapshot file.
    Json,
}

impl FromStr for StoreBackend {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "json" | "memory" => Ok(Self::Json),
            other => Err(RegistryError::Config(format!(
                "Invalid STORE_BACKEND {other:?} (expected sqlite or json)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store_backend: StoreBackend,
    /// SQLite database URL, used when `store_backend` is `Sqlite`
    pub database_url: String,
    /// Snapshot file, used when `store_backend` is `Json`
    pub snapshot_path: PathBuf,
    /// Port for the REST API server
    pub api_port: u16,
    /// Soroban RPC endpoint (e.g. https://soroban-testnet.stellar.org)
    pub rpc_url: String,
    /// The supply-chain contract address (Strkey format). The ledger follower
    /// only runs when this is set.
    pub contract_id: Option<String>,
    /// How often (in seconds) to poll the RPC for new events
    pub poll_interval_secs: u64,
    /// Maximum number of events to fetch per RPC request
    pub events_per_page: u32,
    /// Ledger to start from if no cursor is saved
    pub start_ledger: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key → value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Config {
            store_backend: var("STORE_BACKEND", "sqlite").parse()?,
            database_url: var("DATABASE_URL", "sqlite:./praman.db"),
            snapshot_path: PathBuf::from(var("SNAPSHOT_PATH", "./praman_snapshot.json")),
            api_port: parse(&var("API_PORT", "3001"), "API_PORT")?,
            rpc_url: var("RPC_URL", "https://soroban-testnet.stellar.org"),
            contract_id: lookup("CONTRACT_ID").filter(|v| !v.trim().is_empty()),
            poll_interval_secs: parse(&var("POLL_INTERVAL_SECS", "5"), "POLL_INTERVAL_SECS")?,
            events_per_page: parse(&var("EVENTS_PER_PAGE", "100"), "EVENTS_PER_PAGE")?,
            start_ledger: parse(&var("START_LEDGER", "0"), "START_LEDGER")?,
        })
    }
}

fn parse<T: FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RegistryError::Config(format!("Invalid {key}")))
}

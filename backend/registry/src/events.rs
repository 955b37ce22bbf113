//! Custody events: the batch history shown to consumers.
//!
//! Events come from two sources: the local registry records one for every
//! mutation it performs, and the ledger follower decodes the contract's
//! events (see `contracts/praman_supply_chain/src/events.rs`).

use std::fmt;

use serde::{Deserialize, Serialize};

/// All recognised custody event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A participant registered (`user_reg` topic).
    UserRegistered,
    /// A genesis batch was created (`created` topic).
    BatchCreated,
    /// A batch was dispatched (`sent` topic).
    BatchSent,
    /// A batch was accepted by its recipient (`received` topic).
    BatchReceived,
    /// A batch was closed out at the end of the chain (`completed` topic).
    BatchCompleted,
    /// An event from the contract that we don't recognise.
    Unknown,
}

impl EventKind {
    /// Parse the leading topic symbol emitted by the contract.
    pub fn from_topic(topic: &str) -> Self {
        match topic {
            "user_reg" => Self::UserRegistered,
            "created" => Self::BatchCreated,
            "sent" => Self::BatchSent,
            "received" => Self::BatchReceived,
            "completed" => Self::BatchCompleted,
            _ => Self::Unknown,
        }
    }

    /// Short identifier stored in the `event_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRegistered => "user_registered",
            Self::BatchCreated => "batch_created",
            Self::BatchSent => "batch_sent",
            Self::BatchReceived => "batch_received",
            Self::BatchCompleted => "batch_completed",
            Self::Unknown => "unknown",
        }
    }
}

/// Where an event was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Local,
    Ledger,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Ledger => "ledger",
        }
    }
}

impl fmt::Display for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded custody event, ready to be stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustodyEvent {
    pub event_type: String,
    pub batch_id: Option<String>,
    /// Registration ID (or address, for registrations) of the acting party.
    pub actor: Option<String>,
    pub counterparty: Option<String>,
    pub detail: Option<String>,
    pub source: String,
    pub ledger: Option<i64>,
    pub tx_hash: Option<String>,
    pub timestamp: i64,
}

impl CustodyEvent {
    /// An event recorded by the local registry at `timestamp`.
    pub fn local(kind: EventKind, batch_id: Option<&str>, actor: &str, timestamp: i64) -> Self {
        Self {
            event_type: kind.as_str().to_string(),
            batch_id: batch_id.map(String::from),
            actor: Some(actor.to_string()),
            counterparty: None,
            detail: None,
            source: EventSource::Local.as_str().to_string(),
            ledger: None,
            tx_hash: None,
            timestamp,
        }
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.counterparty = Some(counterparty.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        if !detail.is_empty() {
            self.detail = Some(detail);
        }
        self
    }

    pub fn with_tx_hash(mut self, tx_hash: Option<String>) -> Self {
        self.tx_hash = tx_hash;
        self
    }

    /// Ledger events are deduplicated on this key.
    pub fn dedup_key(&self) -> Option<(&str, &str, &str)> {
        let tx_hash = self.tx_hash.as_deref()?;
        Some((
            tx_hash,
            self.event_type.as_str(),
            self.batch_id.as_deref().unwrap_or(""),
        ))
    }
}

/// A custody event as stored in / read from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EventRecord {
    pub id: i64,
    pub event_type: String,
    pub batch_id: Option<String>,
    pub actor: Option<String>,
    pub counterparty: Option<String>,
    pub detail: Option<String>,
    pub source: String,
    pub ledger: Option<i64>,
    pub tx_hash: Option<String>,
    pub timestamp: i64,
}

impl EventRecord {
    pub fn from_event(id: i64, event: CustodyEvent) -> Self {
        Self {
            id,
            event_type: event.event_type,
            batch_id: event.batch_id,
            actor: event.actor,
            counterparty: event.counterparty,
            detail: event.detail,
            source: event.source,
            ledger: event.ledger,
            tx_hash: event.tx_hash,
            timestamp: event.timestamp,
        }
    }

    fn dedup_key(&self) -> Option<(&str, &str, &str)> {
        let tx_hash = self.tx_hash.as_deref()?;
        Some((
            tx_hash,
            self.event_type.as_str(),
            self.batch_id.as_deref().unwrap_or(""),
        ))
    }

    /// Whether `event` would duplicate this already-stored record.
    pub fn duplicates(&self, event: &CustodyEvent) -> bool {
        match (self.dedup_key(), event.dedup_key()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

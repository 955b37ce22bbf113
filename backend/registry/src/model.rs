//! Registry records and request payloads.
//!
//! Field names follow the ledger contract's types so a batch read from the
//! mirror and one read from the chain serialize the same way.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub use praman_rules::{BatchStatus, RoleKind as Role};

use crate::events::EventRecord;

/// A registered participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub wallet_address: String,
    pub name: String,
    pub email: String,
    pub registration_id: String,
    pub role: Role,
    pub created_at: i64,
}

/// Weather conditions at harvest. Units are the caller's convention.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weather {
    pub rainfall: i64,
    pub humidity: i64,
    pub temperature: i64,
    pub wind_speed: i64,
    pub pressure: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: String,
    pub owner_registration_id: String,
    pub crop_name: String,
    pub quantity: u64,
    pub variant: String,
    pub condition: String,
    pub contamination_level: String,
    /// Micro-degrees.
    pub latitude: i64,
    /// Micro-degrees.
    pub longitude: i64,
    pub location_label: String,
    pub weather: Weather,
    /// `0x`-prefixed hex of the 32-byte signature over the latest custody action.
    pub signature_hash: String,
    pub transaction_hash: Option<String>,
    pub block_number: Option<i64>,
    pub status: BatchStatus,
    pub supply_chain_stage: String,
    pub current_holder: String,
    pub previous_actor: Option<String>,
    pub next_actor: Option<String>,
    pub transport_method: Option<String>,
    #[serde(default)]
    pub quality_notes: Vec<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Batch {
    /// Whether `registration_id` has owned, held, sent, or is due to receive this batch.
    pub fn involves(&self, registration_id: &str) -> bool {
        self.owner_registration_id == registration_id
            || self.current_holder == registration_id
            || self.previous_actor.as_deref() == Some(registration_id)
            || self.next_actor.as_deref() == Some(registration_id)
    }
}

// ─────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub wallet_address: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBatch {
    pub creator_address: String,
    pub batch_id: String,
    pub crop_name: String,
    pub quantity: u64,
    #[serde(default)]
    pub variant: String,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub contamination_level: String,
    #[serde(default)]
    pub latitude: i64,
    #[serde(default)]
    pub longitude: i64,
    #[serde(default)]
    pub location_label: String,
    #[serde(default)]
    pub weather: Weather,
    pub signature_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendBatch {
    pub sender_address: String,
    pub recipient_registration_id: String,
    pub transport_method: String,
    pub signature_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiveBatch {
    pub receiver_address: String,
    #[serde(default)]
    pub quality_notes: String,
    pub signature_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompleteBatch {
    pub holder_address: String,
}

// ─────────────────────────────────────────────────────────
// Snapshot
// ─────────────────────────────────────────────────────────

/// The whole registry as one serializable object: users, batches, and the
/// per-role counters used to mint registration IDs, plus the custody log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub users: Vec<User>,
    pub batches: Vec<Batch>,
    pub counters: BTreeMap<Role, u32>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

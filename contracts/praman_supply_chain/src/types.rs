//! # Types
//!
//! On-chain data structures for the PRAMAN contract.
//!
//! ## Roles and statuses
//!
//! [`Role`] and [`BatchStatus`] are the contract-encodable twins of
//! [`praman_rules::RoleKind`] and [`praman_rules::BatchStatus`]. Every
//! permission or transition decision converts to the rules type first, so the
//! contract never carries its own copy of the permission table.
//!
//! ## Batch custody fields
//!
//! | Field             | Set by                | Meaning                              |
//! |-------------------|-----------------------|--------------------------------------|
//! | `owner_registration_id` | create          | farmer that originated the batch     |
//! | `current_holder`  | create, receive       | actor allowed to dispatch next       |
//! | `previous_actor`  | send                  | last sender                          |
//! | `next_actor`      | send (cleared by receive) | actor expected to receive        |

use praman_rules::{BatchStatus as StatusRule, RoleKind};
use soroban_sdk::{contracttype, Address, BytesN, String, Vec};

/// A supply-chain participant role.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Role {
    Farmer,
    Collector,
    Lab,
    Supplier,
    Distributor,
    Retailer,
}

impl Role {
    pub fn kind(self) -> RoleKind {
        match self {
            Role::Farmer => RoleKind::Farmer,
            Role::Collector => RoleKind::Collector,
            Role::Lab => RoleKind::Lab,
            Role::Supplier => RoleKind::Supplier,
            Role::Distributor => RoleKind::Distributor,
            Role::Retailer => RoleKind::Retailer,
        }
    }

    pub fn from_kind(kind: RoleKind) -> Self {
        match kind {
            RoleKind::Farmer => Role::Farmer,
            RoleKind::Collector => Role::Collector,
            RoleKind::Lab => Role::Lab,
            RoleKind::Supplier => Role::Supplier,
            RoleKind::Distributor => Role::Distributor,
            RoleKind::Retailer => Role::Retailer,
        }
    }
}

/// Lifecycle status of a batch.
#[contracttype]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BatchStatus {
    Created,
    InTransit,
    Received,
    Completed,
}

impl BatchStatus {
    pub fn rule(self) -> StatusRule {
        match self {
            BatchStatus::Created => StatusRule::Created,
            BatchStatus::InTransit => StatusRule::InTransit,
            BatchStatus::Received => StatusRule::Received,
            BatchStatus::Completed => StatusRule::Completed,
        }
    }
}

/// A registered participant.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct User {
    pub wallet_address: Address,
    pub name: String,
    pub email: String,
    /// Role-prefixed sequential ID, e.g. `FRM001`.
    pub registration_id: String,
    pub role: Role,
    pub created_at: u64,
}

/// Weather conditions captured when a batch was harvested.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WeatherSnapshot {
    pub rainfall: i64,
    pub humidity: i64,
    pub temperature: i64,
    pub wind_speed: i64,
    pub pressure: i64,
}

/// Caller-supplied fields for a genesis batch.
///
/// Grouped into one argument to stay inside the host's per-call argument limit.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GenesisBatch {
    pub batch_id: String,
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
    pub weather: WeatherSnapshot,
    pub signature_hash: BytesN<32>,
}

/// Full on-chain record of a produce batch.
#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Batch {
    pub batch_id: String,
    pub owner_registration_id: String,
    pub crop_name: String,
    pub quantity: u64,
    pub variant: String,
    pub condition: String,
    pub contamination_level: String,
    pub latitude: i64,
    pub longitude: i64,
    pub location_label: String,
    pub weather: WeatherSnapshot,
    /// Signature over the most recent custody action.
    pub signature_hash: BytesN<32>,
    /// Ledger sequence of the most recent mutation.
    pub block_number: u32,
    pub status: BatchStatus,
    pub supply_chain_stage: String,
    pub current_holder: String,
    pub previous_actor: Option<String>,
    pub next_actor: Option<String>,
    pub transport_method: Option<String>,
    pub quality_notes: Vec<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

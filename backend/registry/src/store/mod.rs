//! Storage backends for the registry.
//!
//! [`RegistryStore`] persists and retrieves records and never validates.
//! Uniqueness and transition rules live in [`crate::registry::Registry`].

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::errors::Result;
use crate::events::{CustodyEvent, EventRecord};
use crate::model::{Batch, BatchStatus, Role, Snapshot, User};

#[async_trait]
pub trait RegistryStore: Send + Sync {
    // ── Users ────────────────────────────────────────────

    async fn get_user(&self, address: &str) -> Result<Option<User>>;

    async fn find_user_by_registration_id(&self, registration_id: &str) -> Result<Option<User>>;

    /// Number of registrations minted so far under `role`.
    async fn role_counter(&self, role: Role) -> Result<u32>;

    /// Persist `user`, set its role's counter to `counter`, and log `event`,
    /// all or nothing.
    async fn insert_user(&self, user: &User, counter: u32, event: &CustodyEvent) -> Result<()>;

    async fn list_users(&self) -> Result<Vec<User>>;

    // ── Batches ──────────────────────────────────────────

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>>;

    /// Persist a new batch together with its custody event, all or nothing.
    async fn insert_batch(&self, batch: &Batch, event: &CustodyEvent) -> Result<()>;

    /// Overwrite a batch and log the custody event that changed it, all or nothing.
    async fn update_batch(&self, batch: &Batch, event: &CustodyEvent) -> Result<()>;

    /// All batches in creation order.
    async fn list_batches(&self) -> Result<Vec<Batch>>;

    async fn list_batches_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>>;

    // ── Custody log ──────────────────────────────────────

    /// Append events, skipping any that duplicate a stored ledger event.
    /// Returns how many were stored.
    async fn append_events(&self, events: &[CustodyEvent]) -> Result<usize>;

    /// Events for `batch_id`, oldest first.
    async fn events_for_batch(&self, batch_id: &str) -> Result<Vec<EventRecord>>;

    async fn all_events(&self) -> Result<Vec<EventRecord>>;

    // ── Ledger follower cursor ───────────────────────────

    async fn last_ledger(&self) -> Result<i64>;

    async fn cursor(&self) -> Result<Option<String>>;

    async fn save_cursor(&self, last_ledger: i64, cursor: Option<&str>) -> Result<()>;

    // ── Bulk ─────────────────────────────────────────────

    async fn snapshot(&self) -> Result<Snapshot>;

    /// Replace all registry state with `snapshot`.
    async fn restore(&self, snapshot: &Snapshot) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

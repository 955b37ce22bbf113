//! In-process store, optionally persisted as a single JSON snapshot file.
//!
//! The file holds exactly one [`Snapshot`] object (`users`, `batches`,
//! `counters`, `events`) and is rewritten after every mutation. The ledger
//! follower's cursor is kept in memory only; on restart the follower rescans
//! from its configured start ledger and duplicate events are dropped.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::RegistryStore;
use crate::errors::Result;
use crate::events::{CustodyEvent, EventRecord};
use crate::model::{Batch, BatchStatus, Role, Snapshot, User};

#[derive(Default)]
struct State {
    snapshot: Snapshot,
    last_ledger: i64,
    cursor: Option<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    path: Option<PathBuf>,
}

impl MemoryStore {
    /// A purely in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by the snapshot file at `path`, loading it if it exists.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Snapshot::default(),
            Err(e) => return Err(e.into()),
        };
        info!(
            path = %path.display(),
            users = snapshot.users.len(),
            batches = snapshot.batches.len(),
            "Snapshot store opened"
        );
        Ok(Self {
            state: RwLock::new(State {
                snapshot,
                ..State::default()
            }),
            path: Some(path),
        })
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        debug!(path = %path.display(), "Snapshot written");
        Ok(())
    }

    /// Apply `change` to a copy of the snapshot, write the copy out, and only
    /// then make it the live state. A failed write leaves the store untouched.
    async fn commit<F, R>(&self, change: F) -> Result<R>
    where
        F: FnOnce(&mut Snapshot) -> R + Send,
        R: Send,
    {
        let mut state = self.state.write().await;
        if self.path.is_none() {
            return Ok(change(&mut state.snapshot));
        }
        let mut next = state.snapshot.clone();
        let out = change(&mut next);
        self.persist(&next).await?;
        state.snapshot = next;
        Ok(out)
    }
}

/// Append `events` to the log, skipping ledger duplicates. Returns how many were stored.
fn push_events(snapshot: &mut Snapshot, events: &[CustodyEvent]) -> usize {
    let mut next_id = snapshot.events.iter().map(|e| e.id).max().unwrap_or(0) + 1;
    let mut stored = 0;
    for event in events {
        if snapshot.events.iter().any(|r| r.duplicates(event)) {
            continue;
        }
        snapshot
            .events
            .push(EventRecord::from_event(next_id, event.clone()));
        next_id += 1;
        stored += 1;
    }
    stored
}

#[async_trait]
impl RegistryStore for MemoryStore {
    async fn get_user(&self, address: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .snapshot
            .users
            .iter()
            .find(|u| u.wallet_address == address)
            .cloned())
    }

    async fn find_user_by_registration_id(&self, registration_id: &str) -> Result<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .snapshot
            .users
            .iter()
            .find(|u| u.registration_id == registration_id)
            .cloned())
    }

    async fn role_counter(&self, role: Role) -> Result<u32> {
        let state = self.state.read().await;
        Ok(state.snapshot.counters.get(&role).copied().unwrap_or(0))
    }

    async fn insert_user(&self, user: &User, counter: u32, event: &CustodyEvent) -> Result<()> {
        self.commit(|snapshot| {
            snapshot.users.push(user.clone());
            snapshot.counters.insert(user.role, counter);
            push_events(snapshot, std::slice::from_ref(event));
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.state.read().await.snapshot.users.clone())
    }

    async fn get_batch(&self, batch_id: &str) -> Result<Option<Batch>> {
        let state = self.state.read().await;
        Ok(state
            .snapshot
            .batches
            .iter()
            .find(|b| b.batch_id == batch_id)
            .cloned())
    }

    async fn insert_batch(&self, batch: &Batch, event: &CustodyEvent) -> Result<()> {
        self.commit(|snapshot| {
            snapshot.batches.push(batch.clone());
            push_events(snapshot, std::slice::from_ref(event));
        })
        .await
    }

    async fn update_batch(&self, batch: &Batch, event: &CustodyEvent) -> Result<()> {
        self.commit(|snapshot| {
            if let Some(slot) = snapshot
                .batches
                .iter_mut()
                .find(|b| b.batch_id == batch.batch_id)
            {
                *slot = batch.clone();
            }
            push_events(snapshot, std::slice::from_ref(event));
        })
        .await
    }

    async fn list_batches(&self) -> Result<Vec<Batch>> {
        Ok(self.state.read().await.snapshot.batches.clone())
    }

    async fn list_batches_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>> {
        let state = self.state.read().await;
        Ok(state
            .snapshot
            .batches
            .iter()
            .filter(|b| b.status == status)
            .cloned()
            .collect())
    }

    async fn append_events(&self, events: &[CustodyEvent]) -> Result<usize> {
        {
            let state = self.state.read().await;
            let fresh = events
                .iter()
                .any(|e| !state.snapshot.events.iter().any(|r| r.duplicates(e)));
            if !fresh {
                return Ok(0);
            }
        }
        self.commit(|snapshot| push_events(snapshot, events)).await
    }

    async fn events_for_batch(&self, batch_id: &str) -> Result<Vec<EventRecord>> {
        let state = self.state.read().await;
        Ok(state
            .snapshot
            .events
            .iter()
            .filter(|e| e.batch_id.as_deref() == Some(batch_id))
            .cloned()
            .collect())
    }

    async fn all_events(&self) -> Result<Vec<EventRecord>> {
        Ok(self.state.read().await.snapshot.events.clone())
    }

    async fn last_ledger(&self) -> Result<i64> {
        Ok(self.state.read().await.last_ledger)
    }

    async fn cursor(&self) -> Result<Option<String>> {
        Ok(self.state.read().await.cursor.clone())
    }

    async fn save_cursor(&self, last_ledger: i64, cursor: Option<&str>) -> Result<()> {
        let mut state = self.state.write().await;
        state.last_ledger = last_ledger;
        state.cursor = cursor.map(String::from);
        Ok(())
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.state.read().await.snapshot.clone())
    }

    async fn restore(&self, snapshot: &Snapshot) -> Result<()> {
        let replacement = snapshot.clone();
        self.commit(move |live| *live = replacement).await
    }

    async fn clear(&self) -> Result<()> {
        self.commit(|live| *live = Snapshot::default()).await
    }
}

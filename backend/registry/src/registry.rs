//! The canonical registry: every validation rule for users, batches, and
//! custody hand-offs, applied over whichever [`RegistryStore`] is injected.
//!
//! Checks run in the same order as the ledger contract so both report the
//! same error for the same bad request.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use praman_rules::RegistrationId;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::errors::{RegistryError, Result};
use crate::events::{CustodyEvent, EventKind, EventRecord};
use crate::model::{
    Batch, BatchStatus, CompleteBatch, NewBatch, NewUser, ReceiveBatch, Role, SendBatch, Snapshot,
    User,
};
use crate::store::RegistryStore;

pub struct Registry {
    store: Arc<dyn RegistryStore>,
    write_lock: Mutex<()>,
}

impl Registry {
    pub fn new(store: Arc<dyn RegistryStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    // ─────────────────────────────────────────────────────────
    // Users
    // ─────────────────────────────────────────────────────────

    /// Register a participant and mint its registration ID.
    pub async fn register_user(&self, req: NewUser) -> Result<User> {
        let _guard = self.write_lock.lock().await;

        let wallet_address = req.wallet_address.trim().to_string();
        if wallet_address.is_empty() {
            return Err(RegistryError::InvalidInput(
                "wallet_address must not be empty".to_string(),
            ));
        }
        if self.store.get_user(&wallet_address).await?.is_some() {
            return Err(RegistryError::DuplicateAddress(wallet_address));
        }

        let sequence = self.store.role_counter(req.role).await? + 1;
        let registration_id = RegistrationId::new(req.role, sequence)
            .ok_or_else(|| {
                RegistryError::InvalidInput(format!("cannot mint sequence {sequence}"))
            })?
            .to_string();
        if self
            .store
            .find_user_by_registration_id(&registration_id)
            .await?
            .is_some()
        {
            return Err(RegistryError::DuplicateRegistrationId(registration_id));
        }

        let now = Utc::now().timestamp();
        let user = User {
            wallet_address,
            name: req.name,
            email: req.email,
            registration_id,
            role: req.role,
            created_at: now,
        };
        let event = CustodyEvent::local(EventKind::UserRegistered, None, &user.wallet_address, now)
            .with_detail(user.registration_id.clone());
        self.store.insert_user(&user, sequence, &event).await?;

        info!(
            address = %user.wallet_address,
            registration_id = %user.registration_id,
            role = %user.role,
            "User registered"
        );
        Ok(user)
    }

    pub async fn get_user(&self, address: &str) -> Result<User> {
        self.store
            .get_user(address)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("user {address}")))
    }

    pub async fn is_registered(&self, address: &str) -> Result<bool> {
        Ok(self.store.get_user(address).await?.is_some())
    }

    pub async fn user_role(&self, address: &str) -> Result<Option<Role>> {
        Ok(self.store.get_user(address).await?.map(|u| u.role))
    }

    pub async fn user_by_registration_id(&self, registration_id: &str) -> Result<User> {
        self.store
            .find_user_by_registration_id(registration_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("registration {registration_id}")))
    }

    pub async fn address_by_registration_id(&self, registration_id: &str) -> Result<String> {
        Ok(self
            .user_by_registration_id(registration_id)
            .await?
            .wallet_address)
    }

    /// `true` when `address` is already registered under a role other than `role`.
    pub async fn has_conflicting_role(&self, address: &str, role: Role) -> Result<bool> {
        Ok(self
            .store
            .get_user(address)
            .await?
            .is_some_and(|u| u.role != role))
    }

    // ─────────────────────────────────────────────────────────
    // Batches
    // ─────────────────────────────────────────────────────────

    pub async fn create_genesis_batch(&self, req: NewBatch) -> Result<Batch> {
        let _guard = self.write_lock.lock().await;

        let owner = self.require_actor(&req.creator_address).await?;
        if !owner.role.permissions().can_originate {
            return Err(RegistryError::NotAuthorized(format!(
                "{} ({}) cannot create batches",
                owner.registration_id, owner.role
            )));
        }
        let batch_id = req.batch_id.trim().to_string();
        if batch_id.is_empty() {
            return Err(RegistryError::InvalidInput(
                "batch_id must not be empty".to_string(),
            ));
        }
        let signature_hash = normalize_signature(&req.signature_hash)?;
        if self.store.get_batch(&batch_id).await?.is_some() {
            return Err(RegistryError::DuplicateBatchId(batch_id));
        }

        let now = Utc::now().timestamp();
        let transaction_hash = mutation_digest(&[
            "create",
            &batch_id,
            &owner.registration_id,
            &signature_hash,
        ]);
        let batch = Batch {
            batch_id,
            owner_registration_id: owner.registration_id.clone(),
            crop_name: req.crop_name,
            quantity: req.quantity,
            variant: req.variant,
            condition: req.condition,
            contamination_level: req.contamination_level,
            latitude: req.latitude,
            longitude: req.longitude,
            location_label: req.location_label,
            weather: req.weather,
            transaction_hash: Some(transaction_hash),
            signature_hash,
            block_number: None,
            status: BatchStatus::Created,
            supply_chain_stage: Role::Farmer.stage_name().to_string(),
            current_holder: owner.registration_id.clone(),
            previous_actor: None,
            next_actor: None,
            transport_method: None,
            quality_notes: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let event = CustodyEvent::local(
            EventKind::BatchCreated,
            Some(&batch.batch_id),
            &owner.registration_id,
            now,
        )
        .with_detail(batch.crop_name.clone())
        .with_tx_hash(batch.transaction_hash.clone());
        self.store.insert_batch(&batch, &event).await?;

        info!(
            batch_id = %batch.batch_id,
            owner = %batch.owner_registration_id,
            crop = %batch.crop_name,
            "Genesis batch created"
        );
        Ok(batch)
    }

    /// Dispatch a held batch to the actor registered as `recipient_registration_id`.
    pub async fn send_batch(&self, batch_id: &str, req: SendBatch) -> Result<Batch> {
        let _guard = self.write_lock.lock().await;

        let mut batch = self.require_batch(batch_id).await?;
        let from = self.require_actor(&req.sender_address).await?;

        if !from.role.permissions().can_send {
            return Err(RegistryError::NotAuthorized(format!(
                "{} ({}) cannot send batches",
                from.registration_id, from.role
            )));
        }
        if batch.current_holder != from.registration_id {
            return Err(RegistryError::NotAuthorized(format!(
                "{} does not hold batch {}",
                from.registration_id, batch.batch_id
            )));
        }
        check_transition(&batch, BatchStatus::InTransit)?;

        let recipient = self
            .store
            .find_user_by_registration_id(&req.recipient_registration_id)
            .await?
            .ok_or_else(|| {
                RegistryError::NotFound(format!(
                    "recipient {}",
                    req.recipient_registration_id
                ))
            })?;
        if !from.role.can_hand_off_to(recipient.role) {
            return Err(RegistryError::InvalidRoleTransition {
                from: from.role.to_string(),
                to: recipient.role.to_string(),
            });
        }
        let signature_hash = normalize_signature(&req.signature_hash)?;

        let now = Utc::now().timestamp();
        batch.status = BatchStatus::InTransit;
        batch.previous_actor = Some(from.registration_id.clone());
        batch.next_actor = Some(recipient.registration_id.clone());
        batch.transport_method = Some(req.transport_method.clone());
        batch.transaction_hash = Some(mutation_digest(&[
            "send",
            &batch.batch_id,
            &from.registration_id,
            &recipient.registration_id,
            &signature_hash,
            &now.to_string(),
        ]));
        batch.signature_hash = signature_hash;
        batch.updated_at = now;
        let event = CustodyEvent::local(
            EventKind::BatchSent,
            Some(&batch.batch_id),
            &from.registration_id,
            now,
        )
        .with_counterparty(recipient.registration_id.clone())
        .with_detail(req.transport_method)
        .with_tx_hash(batch.transaction_hash.clone());
        self.store.update_batch(&batch, &event).await?;

        info!(
            batch_id = %batch.batch_id,
            from = %from.registration_id,
            to = %recipient.registration_id,
            "Batch sent"
        );
        Ok(batch)
    }

    /// Accept an in-transit batch. Only the batch's `next_actor` may receive it.
    pub async fn receive_batch(&self, batch_id: &str, req: ReceiveBatch) -> Result<Batch> {
        let _guard = self.write_lock.lock().await;

        let mut batch = self.require_batch(batch_id).await?;
        let by = self.require_actor(&req.receiver_address).await?;

        if batch.next_actor.as_deref() != Some(by.registration_id.as_str()) {
            return Err(RegistryError::NotAuthorized(format!(
                "batch {} is not addressed to {}",
                batch.batch_id, by.registration_id
            )));
        }
        if !by.role.permissions().can_receive {
            return Err(RegistryError::NotAuthorized(format!(
                "{} ({}) cannot receive batches",
                by.registration_id, by.role
            )));
        }
        check_transition(&batch, BatchStatus::Received)?;
        let signature_hash = normalize_signature(&req.signature_hash)?;

        let now = Utc::now().timestamp();
        let from = batch
            .previous_actor
            .clone()
            .unwrap_or_else(|| batch.owner_registration_id.clone());
        batch.status = BatchStatus::Received;
        batch.next_actor = None;
        batch.current_holder = by.registration_id.clone();
        batch.supply_chain_stage = by.role.stage_name().to_string();
        let notes = req.quality_notes.trim();
        if !notes.is_empty() {
            batch.quality_notes.push(notes.to_string());
        }
        batch.transaction_hash = Some(mutation_digest(&[
            "receive",
            &batch.batch_id,
            &by.registration_id,
            &signature_hash,
            &now.to_string(),
        ]));
        batch.signature_hash = signature_hash;
        batch.updated_at = now;
        let event = CustodyEvent::local(
            EventKind::BatchReceived,
            Some(&batch.batch_id),
            &by.registration_id,
            now,
        )
        .with_counterparty(from.clone())
        .with_detail(notes)
        .with_tx_hash(batch.transaction_hash.clone());
        self.store.update_batch(&batch, &event).await?;

        info!(
            batch_id = %batch.batch_id,
            by = %by.registration_id,
            from = %from,
            "Batch received"
        );
        Ok(batch)
    }

    /// Close out a received batch at the end of the chain (terminal roles only).
    pub async fn complete_batch(&self, batch_id: &str, req: CompleteBatch) -> Result<Batch> {
        let _guard = self.write_lock.lock().await;

        let mut batch = self.require_batch(batch_id).await?;
        let by = self.require_actor(&req.holder_address).await?;

        if batch.current_holder != by.registration_id || !by.role.is_terminal() {
            return Err(RegistryError::NotAuthorized(format!(
                "{} ({}) cannot complete batch {}",
                by.registration_id, by.role, batch.batch_id
            )));
        }
        check_transition(&batch, BatchStatus::Completed)?;

        let now = Utc::now().timestamp();
        batch.status = BatchStatus::Completed;
        batch.transaction_hash = Some(mutation_digest(&[
            "complete",
            &batch.batch_id,
            &by.registration_id,
            &now.to_string(),
        ]));
        batch.updated_at = now;
        let event = CustodyEvent::local(
            EventKind::BatchCompleted,
            Some(&batch.batch_id),
            &by.registration_id,
            now,
        )
        .with_tx_hash(batch.transaction_hash.clone());
        self.store.update_batch(&batch, &event).await?;

        info!(batch_id = %batch.batch_id, by = %by.registration_id, "Batch completed");
        Ok(batch)
    }

    pub async fn get_batch(&self, batch_id: &str) -> Result<Batch> {
        self.require_batch(batch_id).await
    }

    /// Every batch, in creation order.
    pub async fn get_all_batches(&self) -> Result<Vec<Batch>> {
        self.store.list_batches().await
    }

    pub async fn get_batches_by_status(&self, status: BatchStatus) -> Result<Vec<Batch>> {
        self.store.list_batches_by_status(status).await
    }

    /// Batches `registration_id` owns, holds, is due to receive, or has
    /// handled at any earlier hop.
    pub async fn batches_for_actor(&self, registration_id: &str) -> Result<Vec<Batch>> {
        self.user_by_registration_id(registration_id).await?;
        let handled: HashSet<String> = self
            .store
            .all_events()
            .await?
            .into_iter()
            .filter(|e| {
                e.actor.as_deref() == Some(registration_id)
                    || e.counterparty.as_deref() == Some(registration_id)
            })
            .filter_map(|e| e.batch_id)
            .collect();
        Ok(self
            .store
            .list_batches()
            .await?
            .into_iter()
            .filter(|b| b.involves(registration_id) || handled.contains(&b.batch_id))
            .collect())
    }

    /// Custody log for `batch_id`, oldest first.
    pub async fn batch_history(&self, batch_id: &str) -> Result<Vec<EventRecord>> {
        self.require_batch(batch_id).await?;
        self.store.events_for_batch(batch_id).await
    }

    // ─────────────────────────────────────────────────────────
    // Permission predicates
    // ─────────────────────────────────────────────────────────

    pub async fn can_create_genesis_batch(&self, address: &str) -> Result<bool> {
        Ok(self
            .user_role(address)
            .await?
            .is_some_and(|r| r.permissions().can_originate))
    }

    pub async fn can_send_batch(&self, address: &str) -> Result<bool> {
        Ok(self
            .user_role(address)
            .await?
            .is_some_and(|r| r.permissions().can_send))
    }

    pub async fn can_receive_batch(&self, address: &str) -> Result<bool> {
        Ok(self
            .user_role(address)
            .await?
            .is_some_and(|r| r.permissions().can_receive))
    }

    pub fn can_interact_with_role(sender: Role, recipient: Role) -> bool {
        sender.can_hand_off_to(recipient)
    }

    pub fn valid_roles() -> &'static [Role] {
        &Role::ALL
    }

    // ─────────────────────────────────────────────────────────
    // Bulk
    // ─────────────────────────────────────────────────────────

    pub async fn export_snapshot(&self) -> Result<Snapshot> {
        self.store.snapshot().await
    }

    /// Replace all state with `snapshot` after checking it is self-consistent.
    /// Counters are raised to cover every imported registration ID.
    pub async fn import_snapshot(&self, mut snapshot: Snapshot) -> Result<()> {
        validate_snapshot(&mut snapshot)?;
        let _guard = self.write_lock.lock().await;
        self.store.restore(&snapshot).await?;
        info!(
            users = snapshot.users.len(),
            batches = snapshot.batches.len(),
            events = snapshot.events.len(),
            "Snapshot imported"
        );
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.store.clear().await?;
        warn!("Registry cleared");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────

    /// Unregistered callers are not authorized to act.
    async fn require_actor(&self, address: &str) -> Result<User> {
        self.store
            .get_user(address)
            .await?
            .ok_or_else(|| RegistryError::NotAuthorized(format!("{address} is not registered")))
    }

    async fn require_batch(&self, batch_id: &str) -> Result<Batch> {
        self.store
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| RegistryError::NotFound(format!("batch {batch_id}")))
    }
}

fn check_transition(batch: &Batch, next: BatchStatus) -> Result<()> {
    if batch.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(RegistryError::InvalidStatusTransition {
            batch_id: batch.batch_id.clone(),
            from: batch.status.to_string(),
            to: next.to_string(),
        })
    }
}

/// Accept a 32-byte hash as hex, with or without `0x`, and return it in
/// canonical lowercase `0x…` form.
pub fn normalize_signature(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(digits)
        .map_err(|e| RegistryError::InvalidInput(format!("signature_hash: {e}")))?;
    if bytes.len() != 32 {
        return Err(RegistryError::InvalidInput(format!(
            "signature_hash must be 32 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(format!("0x{}", hex::encode(bytes)))
}

/// `0x`-prefixed SHA-256 over the mutation's identifying parts.
fn mutation_digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(Utc::now().timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
    format!("0x{}", hex::encode(hasher.finalize()))
}

/// The sequence number inside a registration ID minted for `role`.
fn registration_sequence(role: Role, registration_id: &str) -> Result<u32> {
    let malformed = || {
        RegistryError::InvalidInput(format!(
            "registration ID {registration_id} does not match role {role}"
        ))
    };
    let digits = registration_id
        .strip_prefix(role.prefix())
        .ok_or_else(malformed)?;
    if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed());
    }
    digits.parse().map_err(|_| malformed())
}

fn validate_snapshot(snapshot: &mut Snapshot) -> Result<()> {
    let mut addresses = HashSet::new();
    let mut registrations = HashSet::new();
    for user in &snapshot.users {
        if !addresses.insert(user.wallet_address.as_str()) {
            return Err(RegistryError::DuplicateAddress(user.wallet_address.clone()));
        }
        if !registrations.insert(user.registration_id.as_str()) {
            return Err(RegistryError::DuplicateRegistrationId(
                user.registration_id.clone(),
            ));
        }
        let sequence = registration_sequence(user.role, &user.registration_id)?;
        let counter = snapshot.counters.entry(user.role).or_insert(0);
        *counter = (*counter).max(sequence);
    }

    let mut batch_ids = HashSet::new();
    for batch in &snapshot.batches {
        if !batch_ids.insert(batch.batch_id.as_str()) {
            return Err(RegistryError::DuplicateBatchId(batch.batch_id.clone()));
        }
    }
    Ok(())
}

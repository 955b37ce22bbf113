//! # PRAMAN Supply-Chain Contract
//!
//! Single Soroban contract `PramanSupplyChain` holding the participant
//! registry and every produce batch, with custody hand-offs validated against
//! the static rule table in [`praman_rules`].
//!
//! | Phase        | Entry Point(s)                                             |
//! |--------------|------------------------------------------------------------|
//! | Registration | [`PramanSupplyChain::register_user`]                       |
//! | Origination  | [`PramanSupplyChain::create_genesis_batch`]                |
//! | Custody      | `send_batch`, `receive_batch`, `complete_batch`            |
//! | Queries      | `get_user`, `get_batch`, `get_all_batches`, `get_batch_page`, `get_batches_by_status`, ... |
//! | Permissions  | `can_create_genesis_batch`, `can_send_batch`, `can_receive_batch`, `can_interact_with_role` |
//!
//! Storage access is delegated to [`storage`]; event emission to [`events`].

#![no_std]

use praman_rules::{BatchStatus as StatusRule, RegistrationId, RoleKind};
use soroban_sdk::{
    contract, contracterror, contractimpl, panic_with_error, Address, BytesN, Env, String, Vec,
};

pub mod events;
mod storage;
mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_events;
#[cfg(test)]
mod test_registry;

use events::{BatchCompleted, BatchCreated, BatchReceived, BatchSent, UserRegistered};
pub use types::{Batch, BatchStatus, GenesisBatch, Role, User, WeatherSnapshot};

#[contracterror]
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord)]
#[repr(u32)]
pub enum Error {
    NotFound                = 1,
    NotAuthorized           = 2,
    DuplicateAddress        = 3,
    DuplicateRegistrationId = 4,
    DuplicateBatchId        = 5,
    InvalidRoleTransition   = 6,
    InvalidStatusTransition = 7,
    InvalidInput            = 8,
}

#[contract]
pub struct PramanSupplyChain;

#[contractimpl]
impl PramanSupplyChain {
    // ─────────────────────────────────────────────────────────
    // User registry
    // ─────────────────────────────────────────────────────────

    /// Register `caller` under `role` and return its new registration ID.
    ///
    /// An address holds one role for its lifetime; a second registration fails
    /// with `DuplicateAddress` whatever role it asks for.
    pub fn register_user(env: Env, caller: Address, name: String, email: String, role: Role) -> String {
        caller.require_auth();

        if storage::has_user(&env, &caller) {
            panic_with_error!(&env, Error::DuplicateAddress);
        }

        let sequence = storage::role_counter(&env, role) + 1;
        let minted = match RegistrationId::new(role.kind(), sequence) {
            Some(id) => id,
            None => panic_with_error!(&env, Error::InvalidInput),
        };
        let registration_id = String::from_str(&env, minted.as_str());

        if storage::has_registration(&env, &registration_id) {
            panic_with_error!(&env, Error::DuplicateRegistrationId);
        }

        let user = User {
            wallet_address: caller.clone(),
            name,
            email,
            registration_id: registration_id.clone(),
            role,
            created_at: env.ledger().timestamp(),
        };
        storage::save_user(&env, &user);
        storage::set_role_counter(&env, role, sequence);

        events::emit_user_registered(
            &env,
            &caller,
            UserRegistered {
                registration_id: registration_id.clone(),
                role,
            },
        );
        registration_id
    }

    pub fn get_user(env: Env, address: Address) -> User {
        match storage::load_user(&env, &address) {
            Some(user) => user,
            None => panic_with_error!(&env, Error::NotFound),
        }
    }

    pub fn is_user_registered(env: Env, address: Address) -> bool {
        storage::has_user(&env, &address)
    }

    pub fn get_user_role(env: Env, address: Address) -> Option<Role> {
        storage::load_user(&env, &address).map(|user| user.role)
    }

    pub fn get_address_by_registration_id(env: Env, registration_id: String) -> Address {
        match storage::address_for_registration(&env, &registration_id) {
            Some(address) => address,
            None => panic_with_error!(&env, Error::NotFound),
        }
    }

    /// `true` when `address` is already registered under a role other than `role`.
    pub fn has_conflicting_role(env: Env, address: Address, role: Role) -> bool {
        storage::load_user(&env, &address).is_some_and(|user| user.role != role)
    }

    // ─────────────────────────────────────────────────────────
    // Batch registry
    // ─────────────────────────────────────────────────────────

    /// Originate a batch. Only roles allowed to originate (farmers) may call this.
    pub fn create_genesis_batch(env: Env, creator: Address, input: GenesisBatch) -> String {
        creator.require_auth();
        let owner = require_actor(&env, &creator);

        if !owner.role.kind().permissions().can_originate {
            panic_with_error!(&env, Error::NotAuthorized);
        }
        if input.batch_id.is_empty() {
            panic_with_error!(&env, Error::InvalidInput);
        }
        if storage::has_batch(&env, &input.batch_id) {
            panic_with_error!(&env, Error::DuplicateBatchId);
        }

        let now = env.ledger().timestamp();
        let batch = Batch {
            batch_id: input.batch_id.clone(),
            owner_registration_id: owner.registration_id.clone(),
            crop_name: input.crop_name.clone(),
            quantity: input.quantity,
            variant: input.variant,
            condition: input.condition,
            contamination_level: input.contamination_level,
            latitude: input.latitude,
            longitude: input.longitude,
            location_label: input.location_label,
            weather: input.weather,
            signature_hash: input.signature_hash,
            block_number: env.ledger().sequence(),
            status: BatchStatus::Created,
            supply_chain_stage: String::from_str(&env, RoleKind::Farmer.stage_name()),
            current_holder: owner.registration_id.clone(),
            previous_actor: None,
            next_actor: None,
            transport_method: None,
            quality_notes: Vec::new(&env),
            created_at: now,
            updated_at: now,
        };
        storage::save_batch(&env, &batch);

        events::emit_batch_created(
            &env,
            BatchCreated {
                batch_id: input.batch_id.clone(),
                creator,
                registration_id: owner.registration_id,
                crop_name: input.crop_name,
            },
        );
        input.batch_id
    }

    /// Dispatch a held batch to the actor registered as `recipient_registration_id`.
    pub fn send_batch(
        env: Env,
        sender: Address,
        batch_id: String,
        recipient_registration_id: String,
        transport_method: String,
        signature_hash: BytesN<32>,
    ) {
        sender.require_auth();
        let mut batch = require_batch(&env, &batch_id);
        let from = require_actor(&env, &sender);

        if !from.role.kind().permissions().can_send {
            panic_with_error!(&env, Error::NotAuthorized);
        }
        if batch.current_holder != from.registration_id {
            panic_with_error!(&env, Error::NotAuthorized);
        }
        if !batch.status.rule().can_transition_to(StatusRule::InTransit) {
            panic_with_error!(&env, Error::InvalidStatusTransition);
        }

        let recipient_address =
            match storage::address_for_registration(&env, &recipient_registration_id) {
                Some(address) => address,
                None => panic_with_error!(&env, Error::NotFound),
            };
        let recipient = require_actor(&env, &recipient_address);
        if !from.role.kind().can_hand_off_to(recipient.role.kind()) {
            panic_with_error!(&env, Error::InvalidRoleTransition);
        }

        batch.status = BatchStatus::InTransit;
        batch.previous_actor = Some(from.registration_id.clone());
        batch.next_actor = Some(recipient_registration_id.clone());
        batch.transport_method = Some(transport_method.clone());
        batch.signature_hash = signature_hash;
        touch(&env, &mut batch);
        storage::save_batch(&env, &batch);

        events::emit_batch_sent(
            &env,
            BatchSent {
                batch_id,
                from: from.registration_id,
                to: recipient_registration_id,
                transport_method,
            },
        );
    }

    /// Accept an in-transit batch. Only the batch's `next_actor` may receive it.
    pub fn receive_batch(
        env: Env,
        receiver: Address,
        batch_id: String,
        quality_notes: String,
        signature_hash: BytesN<32>,
    ) {
        receiver.require_auth();
        let mut batch = require_batch(&env, &batch_id);
        let by = require_actor(&env, &receiver);

        if batch.next_actor.as_ref() != Some(&by.registration_id) {
            panic_with_error!(&env, Error::NotAuthorized);
        }
        if !by.role.kind().permissions().can_receive {
            panic_with_error!(&env, Error::NotAuthorized);
        }
        if !batch.status.rule().can_transition_to(StatusRule::Received) {
            panic_with_error!(&env, Error::InvalidStatusTransition);
        }

        batch.status = BatchStatus::Received;
        batch.next_actor = None;
        batch.current_holder = by.registration_id.clone();
        batch.supply_chain_stage = String::from_str(&env, by.role.kind().stage_name());
        if !quality_notes.is_empty() {
            batch.quality_notes.push_back(quality_notes);
        }
        batch.signature_hash = signature_hash;
        touch(&env, &mut batch);
        storage::save_batch(&env, &batch);

        let from = batch
            .previous_actor
            .clone()
            .unwrap_or_else(|| batch.owner_registration_id.clone());
        events::emit_batch_received(
            &env,
            BatchReceived {
                batch_id,
                by: by.registration_id,
                from,
            },
        );
    }

    /// Close out a received batch at the end of the chain (terminal roles only).
    pub fn complete_batch(env: Env, holder: Address, batch_id: String) {
        holder.require_auth();
        let mut batch = require_batch(&env, &batch_id);
        let by = require_actor(&env, &holder);

        if batch.current_holder != by.registration_id || !by.role.kind().is_terminal() {
            panic_with_error!(&env, Error::NotAuthorized);
        }
        if !batch.status.rule().can_transition_to(StatusRule::Completed) {
            panic_with_error!(&env, Error::InvalidStatusTransition);
        }

        batch.status = BatchStatus::Completed;
        touch(&env, &mut batch);
        storage::save_batch(&env, &batch);

        events::emit_batch_completed(
            &env,
            BatchCompleted {
                batch_id,
                by: by.registration_id,
            },
        );
    }

    pub fn get_batch(env: Env, batch_id: String) -> Batch {
        require_batch(&env, &batch_id)
    }

    /// Every batch, in creation order.
    pub fn get_all_batches(env: Env) -> Vec<Batch> {
        load_batches(&env, storage::batch_ids(&env))
    }

    pub fn get_batch_count(env: Env) -> u32 {
        storage::batch_count(&env)
    }

    /// Up to `BATCH_PAGE_SIZE` batches, in creation order, starting at
    /// `page * BATCH_PAGE_SIZE`.
    pub fn get_batch_page(env: Env, page: u32) -> Vec<Batch> {
        load_batches(&env, storage::batch_page(&env, page))
    }

    pub fn get_batches_by_status(env: Env, status: BatchStatus) -> Vec<Batch> {
        let mut batches = Vec::new(&env);
        for batch in Self::get_all_batches(env.clone()).iter() {
            if batch.status == status {
                batches.push_back(batch);
            }
        }
        batches
    }

    // ─────────────────────────────────────────────────────────
    // Permission predicates
    // ─────────────────────────────────────────────────────────

    pub fn can_create_genesis_batch(env: Env, address: Address) -> bool {
        storage::load_user(&env, &address)
            .is_some_and(|user| user.role.kind().permissions().can_originate)
    }

    pub fn can_send_batch(env: Env, address: Address) -> bool {
        storage::load_user(&env, &address)
            .is_some_and(|user| user.role.kind().permissions().can_send)
    }

    pub fn can_receive_batch(env: Env, address: Address) -> bool {
        storage::load_user(&env, &address)
            .is_some_and(|user| user.role.kind().permissions().can_receive)
    }

    pub fn can_interact_with_role(_env: Env, sender_role: Role, recipient_role: Role) -> bool {
        sender_role.kind().can_hand_off_to(recipient_role.kind())
    }

    pub fn get_valid_roles(env: Env) -> Vec<Role> {
        let mut roles = Vec::new(&env);
        for kind in RoleKind::ALL {
            roles.push_back(Role::from_kind(kind));
        }
        roles
    }
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

/// Load the registered participant behind `address`; unregistered callers are
/// not authorized to act.
fn require_actor(env: &Env, address: &Address) -> User {
    match storage::load_user(env, address) {
        Some(user) => user,
        None => panic_with_error!(env, Error::NotAuthorized),
    }
}

fn require_batch(env: &Env, batch_id: &String) -> Batch {
    match storage::load_batch(env, batch_id) {
        Some(batch) => batch,
        None => panic_with_error!(env, Error::NotFound),
    }
}

fn load_batches(env: &Env, ids: Vec<String>) -> Vec<Batch> {
    let mut batches = Vec::new(env);
    for id in ids.iter() {
        if let Some(batch) = storage::load_batch(env, &id) {
            batches.push_back(batch);
        }
    }
    batches
}

fn touch(env: &Env, batch: &mut Batch) {
    batch.updated_at = env.ledger().timestamp();
    batch.block_number = env.ledger().sequence();
}

//! # Storage
//!
//! Typed helpers over Soroban's two storage tiers used by PRAMAN.
//!
//! ## Instance storage (contract-lifetime TTL)
//!
//! | Key                 | Type  | Description                          |
//! |---------------------|-------|--------------------------------------|
//! | `RoleCounter(role)` | `u32` | Registrations minted under `role`    |
//! | `BatchCount`        | `u32` | Batches created so far               |
//!
//! Instance TTL is bumped by **7 days** whenever it falls below 1 day remaining.
//!
//! ## Persistent storage (per-entry TTL)
//!
//! | Key              | Type          | Description                         |
//! |------------------|---------------|-------------------------------------|
//! | `User(address)`  | `User`        | Registered participant              |
//! | `RegdNo(id)`     | `Address`     | Reverse index registration ID → address |
//! | `Batch(id)`      | `Batch`       | Batch record                        |
//! | `BatchPage(n)`   | `Vec<String>` | Batch IDs `n * 50 .. n * 50 + 50` in creation order |
//!
//! The creation-order index is split into fixed-size pages so no single entry
//! grows with the number of batches.
//!
//! Persistent TTL is bumped by **30 days** whenever it falls below 7 days remaining.

use soroban_sdk::{contracttype, Address, Env, String, Vec};

use crate::types::{Batch, Role, User};

// ── TTL Constants ────────────────────────────────────────────────────

/// Approximate ledgers per day (~5 seconds per ledger).
const DAY_IN_LEDGERS: u32 = 17_280;

const INSTANCE_BUMP_AMOUNT: u32 = 7 * DAY_IN_LEDGERS;
const INSTANCE_LIFETIME_THRESHOLD: u32 = DAY_IN_LEDGERS;

const PERSISTENT_BUMP_AMOUNT: u32 = 30 * DAY_IN_LEDGERS;
const PERSISTENT_LIFETIME_THRESHOLD: u32 = 7 * DAY_IN_LEDGERS;

/// Batch IDs held by one `BatchPage` entry.
pub const BATCH_PAGE_SIZE: u32 = 50;

// ── Storage Keys ─────────────────────────────────────────────────────

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DataKey {
    /// Per-role registration counter (Instance).
    RoleCounter(Role),
    /// Participant keyed by wallet address (Persistent).
    User(Address),
    /// Registration ID → wallet address (Persistent).
    RegdNo(String),
    /// Batch keyed by batch ID (Persistent).
    Batch(String),
    /// Number of batches created (Instance).
    BatchCount,
    /// One page of the creation-order batch index (Persistent).
    BatchPage(u32),
}

// ── Instance Storage Helpers ─────────────────────────────────────────

fn bump_instance(env: &Env) {
    env.storage()
        .instance()
        .extend_ttl(INSTANCE_LIFETIME_THRESHOLD, INSTANCE_BUMP_AMOUNT);
}

/// Number of registrations minted so far under `role`.
pub fn role_counter(env: &Env, role: Role) -> u32 {
    bump_instance(env);
    env.storage()
        .instance()
        .get(&DataKey::RoleCounter(role))
        .unwrap_or(0)
}

pub fn set_role_counter(env: &Env, role: Role, value: u32) {
    env.storage()
        .instance()
        .set(&DataKey::RoleCounter(role), &value);
    bump_instance(env);
}

pub fn batch_count(env: &Env) -> u32 {
    bump_instance(env);
    env.storage()
        .instance()
        .get(&DataKey::BatchCount)
        .unwrap_or(0)
}

fn set_batch_count(env: &Env, value: u32) {
    env.storage().instance().set(&DataKey::BatchCount, &value);
    bump_instance(env);
}

// ── Persistent Storage Helpers ───────────────────────────────────────

fn bump_persistent(env: &Env, key: &DataKey) {
    env.storage()
        .persistent()
        .extend_ttl(key, PERSISTENT_LIFETIME_THRESHOLD, PERSISTENT_BUMP_AMOUNT);
}

fn load<T>(env: &Env, key: &DataKey) -> Option<T>
where
    T: soroban_sdk::TryFromVal<Env, soroban_sdk::Val>,
{
    let value = env.storage().persistent().get(key);
    if value.is_some() {
        bump_persistent(env, key);
    }
    value
}

pub fn load_user(env: &Env, address: &Address) -> Option<User> {
    load(env, &DataKey::User(address.clone()))
}

pub fn has_user(env: &Env, address: &Address) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::User(address.clone()))
}

/// Save a new user together with its registration-ID reverse index.
pub fn save_user(env: &Env, user: &User) {
    let user_key = DataKey::User(user.wallet_address.clone());
    let regd_key = DataKey::RegdNo(user.registration_id.clone());

    env.storage().persistent().set(&user_key, user);
    env.storage()
        .persistent()
        .set(&regd_key, &user.wallet_address);
    bump_persistent(env, &user_key);
    bump_persistent(env, &regd_key);
}

pub fn address_for_registration(env: &Env, registration_id: &String) -> Option<Address> {
    load(env, &DataKey::RegdNo(registration_id.clone()))
}

pub fn has_registration(env: &Env, registration_id: &String) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::RegdNo(registration_id.clone()))
}

pub fn load_batch(env: &Env, batch_id: &String) -> Option<Batch> {
    load(env, &DataKey::Batch(batch_id.clone()))
}

pub fn has_batch(env: &Env, batch_id: &String) -> bool {
    env.storage()
        .persistent()
        .has(&DataKey::Batch(batch_id.clone()))
}

/// Write a batch record. New IDs are appended to the last index page.
pub fn save_batch(env: &Env, batch: &Batch) {
    let key = DataKey::Batch(batch.batch_id.clone());
    if !env.storage().persistent().has(&key) {
        let count = batch_count(env);
        let page_key = DataKey::BatchPage(count / BATCH_PAGE_SIZE);
        let mut ids: Vec<String> = load(env, &page_key).unwrap_or_else(|| Vec::new(env));
        ids.push_back(batch.batch_id.clone());
        env.storage().persistent().set(&page_key, &ids);
        bump_persistent(env, &page_key);
        set_batch_count(env, count + 1);
    }
    env.storage().persistent().set(&key, batch);
    bump_persistent(env, &key);
}

/// Batch IDs on index page `page`. Pages past the end are empty.
pub fn batch_page(env: &Env, page: u32) -> Vec<String> {
    load(env, &DataKey::BatchPage(page)).unwrap_or_else(|| Vec::new(env))
}

/// Every batch ID in creation order.
pub fn batch_ids(env: &Env) -> Vec<String> {
    let mut ids = Vec::new(env);
    let pages = batch_count(env).div_ceil(BATCH_PAGE_SIZE);
    for page in 0..pages {
        ids.append(&batch_page(env, page));
    }
    ids
}

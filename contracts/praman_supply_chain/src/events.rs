//! Contract events.
//!
//! | Topic                        | Data              |
//! |------------------------------|-------------------|
//! | `("user_reg", address)`      | [`UserRegistered`] |
//! | `("created", batch_id)`      | [`BatchCreated`]  |
//! | `("sent", batch_id)`         | [`BatchSent`]     |
//! | `("received", batch_id)`     | [`BatchReceived`] |
//! | `("completed", batch_id)`    | [`BatchCompleted`] |
//!
//! The registry service's ledger follower decodes exactly these topics.

use soroban_sdk::{contracttype, symbol_short, Address, Env, String};

use crate::types::Role;

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserRegistered {
    pub registration_id: String,
    pub role: Role,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchCreated {
    pub batch_id: String,
    pub creator: Address,
    pub registration_id: String,
    pub crop_name: String,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchSent {
    pub batch_id: String,
    pub from: String,
    pub to: String,
    pub transport_method: String,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchReceived {
    pub batch_id: String,
    pub by: String,
    pub from: String,
}

#[contracttype]
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BatchCompleted {
    pub batch_id: String,
    pub by: String,
}

pub fn emit_user_registered(env: &Env, address: &Address, data: UserRegistered) {
    env.events()
        .publish((symbol_short!("user_reg"), address.clone()), data);
}

pub fn emit_batch_created(env: &Env, data: BatchCreated) {
    env.events()
        .publish((symbol_short!("created"), data.batch_id.clone()), data);
}

pub fn emit_batch_sent(env: &Env, data: BatchSent) {
    env.events()
        .publish((symbol_short!("sent"), data.batch_id.clone()), data);
}

pub fn emit_batch_received(env: &Env, data: BatchReceived) {
    env.events()
        .publish((symbol_short!("received"), data.batch_id.clone()), data);
}

pub fn emit_batch_completed(env: &Env, data: BatchCompleted) {
    env.events()
        .publish((symbol_short!("completed"), data.batch_id.clone()), data);
}

#![allow(dead_code)]

extern crate std;

use praman_rules::RoleKind;
use soroban_sdk::{Env, String};

use crate::types::{Batch, BatchStatus, User};

/// INV-1: A registration ID is the role prefix followed by at least three digits.
pub fn assert_registration_id_format(user: &User) {
    let mut buf = [0u8; 16];
    let len = user.registration_id.len() as usize;
    user.registration_id.copy_into_slice(&mut buf[..len]);
    let id = core::str::from_utf8(&buf[..len]).expect("registration id is utf-8");

    let prefix = user.role.kind().prefix();
    assert!(
        id.starts_with(prefix),
        "INV-1 violated: {id} does not start with {prefix}"
    );
    let digits = &id[prefix.len()..];
    assert!(
        digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()),
        "INV-1 violated: {id} has malformed counter"
    );
}

/// INV-2: `next_actor` is set exactly while the batch is in transit.
pub fn assert_next_actor_matches_status(batch: &Batch) {
    assert_eq!(
        batch.next_actor.is_some(),
        batch.status == BatchStatus::InTransit,
        "INV-2 violated: next_actor {:?} with status {:?}",
        batch.next_actor,
        batch.status
    );
}

/// INV-3: A freshly created batch is held by its owner with no custody history.
pub fn assert_genesis_state(batch: &Batch) {
    assert_eq!(batch.status, BatchStatus::Created);
    assert_eq!(batch.current_holder, batch.owner_registration_id);
    assert_eq!(batch.previous_actor, None);
    assert_eq!(batch.next_actor, None);
    assert!(batch.quality_notes.is_empty());
}

/// INV-4: Status history only ever follows allowed transitions.
pub fn assert_status_history(history: &[BatchStatus]) {
    for pair in history.windows(2) {
        assert!(
            pair[0].rule().can_transition_to(pair[1].rule()),
            "INV-4 violated: {:?} -> {:?}",
            pair[0],
            pair[1]
        );
    }
}

/// INV-5: Fields fixed at origination never change afterwards.
pub fn assert_origin_fields_immutable(original: &Batch, current: &Batch) {
    assert_eq!(original.batch_id, current.batch_id, "INV-5 violated: batch_id changed");
    assert_eq!(
        original.owner_registration_id, current.owner_registration_id,
        "INV-5 violated: owner changed"
    );
    assert_eq!(original.crop_name, current.crop_name, "INV-5 violated: crop changed");
    assert_eq!(original.quantity, current.quantity, "INV-5 violated: quantity changed");
    assert_eq!(original.weather, current.weather, "INV-5 violated: weather changed");
    assert_eq!(original.created_at, current.created_at, "INV-5 violated: created_at changed");
}

/// INV-6: The supply-chain stage names the role of the current holder.
pub fn assert_stage_matches_holder(env: &Env, batch: &Batch, holder_role: RoleKind) {
    let expected = String::from_str(env, holder_role.stage_name());
    assert_eq!(batch.supply_chain_stage, expected, "INV-6 violated: stage mismatch");
}

/// Run all stateless batch invariants.
pub fn assert_all_batch_invariants(batch: &Batch) {
    assert_next_actor_matches_status(batch);
    assert!(
        !batch.batch_id.is_empty(),
        "batch id must never be empty"
    );
}

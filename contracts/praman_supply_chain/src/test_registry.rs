extern crate std;

use praman_rules::RoleKind;
use soroban_sdk::{testutils::Address as _, Address, BytesN, Env, String};

use crate::invariants::{
    assert_all_batch_invariants, assert_genesis_state, assert_origin_fields_immutable,
    assert_registration_id_format, assert_stage_matches_holder, assert_status_history,
};
use crate::storage::BATCH_PAGE_SIZE;
use crate::{
    BatchStatus, Error, GenesisBatch, PramanSupplyChain, PramanSupplyChainClient, Role,
    WeatherSnapshot,
};

fn setup() -> (Env, PramanSupplyChainClient<'static>) {
    let env = Env::default();
    env.mock_all_auths();
    let contract_id = env.register(PramanSupplyChain, ());
    let client = PramanSupplyChainClient::new(&env, &contract_id);
    (env, client)
}

fn s(env: &Env, value: &str) -> String {
    String::from_str(env, value)
}

fn signature(env: &Env, fill: u8) -> BytesN<32> {
    BytesN::from_array(env, &[fill; 32])
}

fn register(env: &Env, client: &PramanSupplyChainClient, role: Role) -> (Address, String) {
    let address = Address::generate(env);
    let id = client.register_user(&address, &s(env, "Asha"), &s(env, "asha@example.com"), &role);
    (address, id)
}

fn genesis(env: &Env, batch_id: &str) -> GenesisBatch {
    GenesisBatch {
        batch_id: s(env, batch_id),
        crop_name: s(env, "Ashwagandha"),
        quantity: 100,
        variant: s(env, "Premium"),
        condition: s(env, "Excellent"),
        contamination_level: s(env, "Low"),
        latitude: 23_259_933,
        longitude: 77_412_613,
        location_label: s(env, "Farm Location, India"),
        weather: WeatherSnapshot {
            rainfall: 50,
            humidity: 60,
            temperature: 25,
            wind_speed: 10,
            pressure: 1013,
        },
        signature_hash: signature(env, 0xaa),
    }
}

// ─────────────────────────────────────────────────────────
// Registration
// ─────────────────────────────────────────────────────────

#[test]
fn test_register_farmer() {
    let (env, client) = setup();
    let (farmer, id) = register(&env, &client, Role::Farmer);

    assert_eq!(id, s(&env, "FRM001"));
    let user = client.get_user(&farmer);
    assert_eq!(user.role, Role::Farmer);
    assert_eq!(user.registration_id, id);
    assert_eq!(user.wallet_address, farmer);
    assert!(client.is_user_registered(&farmer));
    assert_registration_id_format(&user);
}

#[test]
fn test_registration_ids_are_sequential_per_role() {
    let (env, client) = setup();
    let (_, f1) = register(&env, &client, Role::Farmer);
    let (_, c1) = register(&env, &client, Role::Collector);
    let (_, f2) = register(&env, &client, Role::Farmer);
    let (_, f3) = register(&env, &client, Role::Farmer);
    let (_, c2) = register(&env, &client, Role::Collector);

    assert_eq!(f1, s(&env, "FRM001"));
    assert_eq!(f2, s(&env, "FRM002"));
    assert_eq!(f3, s(&env, "FRM003"));
    assert_eq!(c1, s(&env, "COL001"));
    assert_eq!(c2, s(&env, "COL002"));
}

#[test]
fn test_reregistration_fails_regardless_of_role() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);

    for role in [Role::Farmer, Role::Collector, Role::Retailer] {
        let result = client.try_register_user(&farmer, &s(&env, "Again"), &s(&env, "x@y"), &role);
        assert_eq!(result, Err(Ok(Error::DuplicateAddress)));
    }
    assert_eq!(client.get_user(&farmer).role, Role::Farmer);
    assert!(client.has_conflicting_role(&farmer, &Role::Collector));
    assert!(!client.has_conflicting_role(&farmer, &Role::Farmer));
}

#[test]
fn test_unknown_user_not_found() {
    let (env, client) = setup();
    let stranger = Address::generate(&env);

    assert_eq!(client.try_get_user(&stranger), Err(Ok(Error::NotFound)));
    assert!(!client.is_user_registered(&stranger));
    assert_eq!(client.get_user_role(&stranger), None);
    assert!(!client.has_conflicting_role(&stranger, &Role::Lab));
}

#[test]
fn test_address_by_registration_id() {
    let (env, client) = setup();
    let (lab, id) = register(&env, &client, Role::Lab);

    assert_eq!(client.get_address_by_registration_id(&id), lab);
    assert_eq!(
        client.try_get_address_by_registration_id(&s(&env, "LAB999")),
        Err(Ok(Error::NotFound))
    );
}

// ─────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────

#[test]
fn test_permission_predicates() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (collector, _) = register(&env, &client, Role::Collector);
    let (retailer, _) = register(&env, &client, Role::Retailer);
    let stranger = Address::generate(&env);

    assert!(client.can_create_genesis_batch(&farmer));
    assert!(!client.can_create_genesis_batch(&collector));
    assert!(!client.can_create_genesis_batch(&stranger));

    assert!(client.can_send_batch(&farmer));
    assert!(client.can_send_batch(&collector));
    assert!(!client.can_send_batch(&retailer));

    assert!(!client.can_receive_batch(&farmer));
    assert!(client.can_receive_batch(&collector));
    assert!(client.can_receive_batch(&retailer));

    assert!(client.can_interact_with_role(&Role::Farmer, &Role::Collector));
    assert!(client.can_interact_with_role(&Role::Collector, &Role::Lab));
    assert!(!client.can_interact_with_role(&Role::Farmer, &Role::Lab));
    assert!(!client.can_interact_with_role(&Role::Retailer, &Role::Farmer));

    let roles = client.get_valid_roles();
    assert_eq!(roles.len(), 6);
    assert_eq!(roles.get(0), Some(Role::Farmer));
    assert_eq!(roles.get(5), Some(Role::Retailer));
}

// ─────────────────────────────────────────────────────────
// Genesis batches
// ─────────────────────────────────────────────────────────

#[test]
fn test_create_genesis_batch() {
    let (env, client) = setup();
    let (farmer, farmer_id) = register(&env, &client, Role::Farmer);

    let id = client.create_genesis_batch(&farmer, &genesis(&env, "FRM001-1703123456-ASH"));
    let batch = client.get_batch(&id);

    assert_eq!(batch.owner_registration_id, farmer_id);
    assert_eq!(batch.crop_name, s(&env, "Ashwagandha"));
    assert_eq!(batch.supply_chain_stage, s(&env, "genesis"));
    assert_genesis_state(&batch);
    assert_all_batch_invariants(&batch);
}

#[test]
fn test_only_farmers_originate() {
    let (env, client) = setup();
    let (collector, _) = register(&env, &client, Role::Collector);
    let stranger = Address::generate(&env);

    assert_eq!(
        client.try_create_genesis_batch(&collector, &genesis(&env, "B1")),
        Err(Ok(Error::NotAuthorized))
    );
    assert_eq!(
        client.try_create_genesis_batch(&stranger, &genesis(&env, "B1")),
        Err(Ok(Error::NotAuthorized))
    );
    assert_eq!(client.get_all_batches().len(), 0);
}

#[test]
fn test_duplicate_batch_id_rejected() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (other_farmer, _) = register(&env, &client, Role::Farmer);

    client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    assert_eq!(
        client.try_create_genesis_batch(&other_farmer, &genesis(&env, "B1")),
        Err(Ok(Error::DuplicateBatchId))
    );
}

#[test]
fn test_empty_batch_id_rejected() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);

    assert_eq!(
        client.try_create_genesis_batch(&farmer, &genesis(&env, "")),
        Err(Ok(Error::InvalidInput))
    );
}

#[test]
fn test_queries_by_status() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (_, collector_id) = register(&env, &client, Role::Collector);

    for i in 0..3 {
        let id = std::format!("FRM001-170312345{i}-ASH");
        client.create_genesis_batch(&farmer, &genesis(&env, &id));
    }
    client.send_batch(
        &farmer,
        &s(&env, "FRM001-1703123451-ASH"),
        &collector_id,
        &s(&env, "Truck"),
        &signature(&env, 0xbb),
    );

    assert_eq!(client.get_all_batches().len(), 3);
    assert_eq!(client.get_batches_by_status(&BatchStatus::Created).len(), 2);
    let in_transit = client.get_batches_by_status(&BatchStatus::InTransit);
    assert_eq!(in_transit.len(), 1);
    assert_eq!(
        in_transit.get(0).unwrap().batch_id,
        s(&env, "FRM001-1703123451-ASH")
    );
    assert_eq!(client.get_batches_by_status(&BatchStatus::Received).len(), 0);

    // creation order is preserved
    let all = client.get_all_batches();
    assert_eq!(all.get(0).unwrap().batch_id, s(&env, "FRM001-1703123450-ASH"));
    assert_eq!(all.get(2).unwrap().batch_id, s(&env, "FRM001-1703123452-ASH"));
}

#[test]
fn test_batch_index_spans_pages() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);

    let total = BATCH_PAGE_SIZE + 3;
    for i in 0..total {
        client.create_genesis_batch(&farmer, &genesis(&env, &std::format!("B{i:03}")));
    }

    assert_eq!(client.get_batch_count(), total);
    assert_eq!(client.get_batch_page(&0).len(), BATCH_PAGE_SIZE);
    let tail = client.get_batch_page(&1);
    assert_eq!(tail.len(), 3);
    assert_eq!(
        tail.get(0).unwrap().batch_id,
        s(&env, &std::format!("B{BATCH_PAGE_SIZE:03}"))
    );
    assert_eq!(client.get_batch_page(&2).len(), 0);

    let all = client.get_all_batches();
    assert_eq!(all.len(), total);
    for (i, batch) in all.iter().enumerate() {
        assert_eq!(batch.batch_id, s(&env, &std::format!("B{i:03}")));
    }
}

#[test]
fn test_get_missing_batch() {
    let (env, client) = setup();
    assert_eq!(client.try_get_batch(&s(&env, "nope")), Err(Ok(Error::NotFound)));
}

// ─────────────────────────────────────────────────────────
// Custody hand-offs
// ─────────────────────────────────────────────────────────

#[test]
fn test_end_to_end_single_hop() {
    let (env, client) = setup();
    let (farmer, farmer_id) = register(&env, &client, Role::Farmer);
    let (collector, collector_id) = register(&env, &client, Role::Collector);
    assert_eq!(farmer_id, s(&env, "FRM001"));
    assert_eq!(collector_id, s(&env, "COL001"));

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    let original = client.get_batch(&batch_id);
    let mut history = std::vec![original.status];

    client.send_batch(
        &farmer,
        &batch_id,
        &collector_id,
        &s(&env, "Truck"),
        &signature(&env, 0xbb),
    );
    let sent = client.get_batch(&batch_id);
    history.push(sent.status);
    assert_eq!(sent.status, BatchStatus::InTransit);
    assert_eq!(sent.next_actor, Some(collector_id.clone()));
    assert_eq!(sent.previous_actor, Some(farmer_id.clone()));
    assert_eq!(sent.transport_method, Some(s(&env, "Truck")));
    assert_eq!(sent.signature_hash, signature(&env, 0xbb));
    assert_all_batch_invariants(&sent);

    client.receive_batch(
        &collector,
        &batch_id,
        &s(&env, "Quality check passed"),
        &signature(&env, 0xcc),
    );
    let received = client.get_batch(&batch_id);
    history.push(received.status);
    assert_eq!(received.status, BatchStatus::Received);
    assert_eq!(received.next_actor, None);
    assert_eq!(received.current_holder, collector_id);
    assert_eq!(received.quality_notes.len(), 1);
    assert_eq!(
        received.quality_notes.get(0),
        Some(s(&env, "Quality check passed"))
    );
    assert_stage_matches_holder(&env, &received, RoleKind::Collector);
    assert_origin_fields_immutable(&original, &received);
    assert_all_batch_invariants(&received);

    assert_eq!(
        history,
        std::vec![BatchStatus::Created, BatchStatus::InTransit, BatchStatus::Received]
    );
    assert_status_history(&history);

    let all = client.get_all_batches();
    assert_eq!(all.len(), 1);
    assert_eq!(all.get(0).unwrap(), received);
}

#[test]
fn test_multi_hop_to_retailer_and_complete() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (collector, collector_id) = register(&env, &client, Role::Collector);
    let (lab, lab_id) = register(&env, &client, Role::Lab);
    let (distributor, distributor_id) = register(&env, &client, Role::Distributor);
    let (retailer, retailer_id) = register(&env, &client, Role::Retailer);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    let hops = [
        (&farmer, &collector, &collector_id),
        (&collector, &lab, &lab_id),
        (&lab, &distributor, &distributor_id),
        (&distributor, &retailer, &retailer_id),
    ];
    for (from, to, to_id) in hops {
        client.send_batch(from, &batch_id, to_id, &s(&env, "Van"), &signature(&env, 1));
        client.receive_batch(to, &batch_id, &s(&env, "ok"), &signature(&env, 2));
    }

    let batch = client.get_batch(&batch_id);
    assert_eq!(batch.current_holder, retailer_id);
    assert_eq!(batch.previous_actor, Some(distributor_id));
    assert_eq!(batch.quality_notes.len(), 4);
    assert_stage_matches_holder(&env, &batch, RoleKind::Retailer);

    client.complete_batch(&retailer, &batch_id);
    assert_eq!(client.get_batch(&batch_id).status, BatchStatus::Completed);

    assert_eq!(
        client.try_complete_batch(&retailer, &batch_id),
        Err(Ok(Error::InvalidStatusTransition))
    );
}

#[test]
fn test_send_to_non_adjacent_role_fails() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (_, lab_id) = register(&env, &client, Role::Lab);
    let (_, other_farmer_id) = register(&env, &client, Role::Farmer);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    for target in [&lab_id, &other_farmer_id] {
        assert_eq!(
            client.try_send_batch(&farmer, &batch_id, target, &s(&env, "Truck"), &signature(&env, 1)),
            Err(Ok(Error::InvalidRoleTransition))
        );
    }
    assert_eq!(client.get_batch(&batch_id).status, BatchStatus::Created);
}

#[test]
fn test_retailer_cannot_send() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (retailer, _) = register(&env, &client, Role::Retailer);
    let farmer_id = client.get_user(&farmer).registration_id;

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    assert_eq!(
        client.try_send_batch(&retailer, &batch_id, &farmer_id, &s(&env, "Cart"), &signature(&env, 1)),
        Err(Ok(Error::NotAuthorized))
    );
}

#[test]
fn test_only_holder_may_send() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (other_farmer, _) = register(&env, &client, Role::Farmer);
    let (_, collector_id) = register(&env, &client, Role::Collector);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    assert_eq!(
        client.try_send_batch(&other_farmer, &batch_id, &collector_id, &s(&env, "Truck"), &signature(&env, 1)),
        Err(Ok(Error::NotAuthorized))
    );
}

#[test]
fn test_send_in_transit_batch_fails() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (_, collector_id) = register(&env, &client, Role::Collector);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    client.send_batch(&farmer, &batch_id, &collector_id, &s(&env, "Truck"), &signature(&env, 1));
    assert_eq!(
        client.try_send_batch(&farmer, &batch_id, &collector_id, &s(&env, "Truck"), &signature(&env, 1)),
        Err(Ok(Error::InvalidStatusTransition))
    );
}

#[test]
fn test_send_missing_batch_or_recipient() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (_, collector_id) = register(&env, &client, Role::Collector);

    assert_eq!(
        client.try_send_batch(&farmer, &s(&env, "ghost"), &collector_id, &s(&env, "Truck"), &signature(&env, 1)),
        Err(Ok(Error::NotFound))
    );

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    assert_eq!(
        client.try_send_batch(&farmer, &batch_id, &s(&env, "COL404"), &s(&env, "Truck"), &signature(&env, 1)),
        Err(Ok(Error::NotFound))
    );
}

#[test]
fn test_receive_by_wrong_actor_fails() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (_, collector_id) = register(&env, &client, Role::Collector);
    let (other_collector, _) = register(&env, &client, Role::Collector);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));

    // nothing in transit yet
    assert_eq!(
        client.try_receive_batch(&other_collector, &batch_id, &s(&env, ""), &signature(&env, 1)),
        Err(Ok(Error::NotAuthorized))
    );

    client.send_batch(&farmer, &batch_id, &collector_id, &s(&env, "Truck"), &signature(&env, 1));
    assert_eq!(
        client.try_receive_batch(&other_collector, &batch_id, &s(&env, ""), &signature(&env, 1)),
        Err(Ok(Error::NotAuthorized))
    );
    assert_eq!(
        client.try_receive_batch(&farmer, &batch_id, &s(&env, ""), &signature(&env, 1)),
        Err(Ok(Error::NotAuthorized))
    );

    let batch = client.get_batch(&batch_id);
    assert_eq!(batch.status, BatchStatus::InTransit);
    assert_eq!(batch.next_actor, Some(collector_id));
}

#[test]
fn test_receive_missing_batch() {
    let (env, client) = setup();
    let (collector, _) = register(&env, &client, Role::Collector);
    assert_eq!(
        client.try_receive_batch(&collector, &s(&env, "ghost"), &s(&env, ""), &signature(&env, 1)),
        Err(Ok(Error::NotFound))
    );
}

#[test]
fn test_complete_requires_terminal_holder() {
    let (env, client) = setup();
    let (farmer, _) = register(&env, &client, Role::Farmer);
    let (collector, collector_id) = register(&env, &client, Role::Collector);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B1"));
    assert_eq!(
        client.try_complete_batch(&farmer, &batch_id),
        Err(Ok(Error::NotAuthorized))
    );

    client.send_batch(&farmer, &batch_id, &collector_id, &s(&env, "Truck"), &signature(&env, 1));
    client.receive_batch(&collector, &batch_id, &s(&env, ""), &signature(&env, 2));
    assert_eq!(
        client.try_complete_batch(&collector, &batch_id),
        Err(Ok(Error::NotAuthorized))
    );
    // empty notes are not recorded
    assert!(client.get_batch(&batch_id).quality_notes.is_empty());
}

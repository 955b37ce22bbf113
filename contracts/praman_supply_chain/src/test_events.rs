extern crate std;

use soroban_sdk::{
    symbol_short,
    testutils::{Address as _, Events},
    vec, Address, BytesN, Env, IntoVal, String, TryIntoVal,
};

use crate::events::{BatchCompleted, BatchCreated, BatchReceived, BatchSent, UserRegistered};
use crate::{GenesisBatch, PramanSupplyChain, PramanSupplyChainClient, Role, WeatherSnapshot};

fn setup() -> (Env, PramanSupplyChainClient<'static>) {
    let env = Env::default();
    env.mock_all_auths();
    let contract_id = env.register(PramanSupplyChain, ());
    let client = PramanSupplyChainClient::new(&env, &contract_id);
    (env, client)
}

fn genesis(env: &Env, batch_id: &str) -> GenesisBatch {
    GenesisBatch {
        batch_id: String::from_str(env, batch_id),
        crop_name: String::from_str(env, "Tulsi"),
        quantity: 40,
        variant: String::from_str(env, "Rama"),
        condition: String::from_str(env, "Good"),
        contamination_level: String::from_str(env, "None"),
        latitude: 0,
        longitude: 0,
        location_label: String::from_str(env, "Field 7"),
        weather: WeatherSnapshot {
            rainfall: 0,
            humidity: 40,
            temperature: 31,
            wind_speed: 4,
            pressure: 1009,
        },
        signature_hash: BytesN::from_array(env, &[0x11; 32]),
    }
}

/// Register a farmer and a collector, returning `(farmer, farmer_id, collector, collector_id)`.
fn farmer_and_collector(
    env: &Env,
    client: &PramanSupplyChainClient,
) -> (Address, String, Address, String) {
    let farmer = Address::generate(env);
    let collector = Address::generate(env);
    let name = String::from_str(env, "n");
    let email = String::from_str(env, "e");
    let farmer_id = client.register_user(&farmer, &name, &email, &Role::Farmer);
    let collector_id = client.register_user(&collector, &name, &email, &Role::Collector);
    (farmer, farmer_id, collector, collector_id)
}

#[test]
fn test_user_registered_event() {
    let (env, client) = setup();
    let lab = Address::generate(&env);
    let id = client.register_user(
        &lab,
        &String::from_str(&env, "Vidya Labs"),
        &String::from_str(&env, "qa@vidya.example"),
        &Role::Lab,
    );

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    assert_eq!(last_event.0, client.address);
    let expected_topics = vec![
        &env,
        symbol_short!("user_reg").into_val(&env),
        lab.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: UserRegistered = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        UserRegistered {
            registration_id: id,
            role: Role::Lab,
        }
    );
}

#[test]
fn test_batch_created_event() {
    let (env, client) = setup();
    let (farmer, farmer_id, _, _) = farmer_and_collector(&env, &client);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B-TULSI-1"));

    let all_events = env.events().all();
    let last_event = all_events.last().expect("No events found");

    assert_eq!(last_event.0, client.address);
    let expected_topics = vec![
        &env,
        symbol_short!("created").into_val(&env),
        batch_id.into_val(&env),
    ];
    assert_eq!(last_event.1, expected_topics);

    let event_data: BatchCreated = last_event.2.try_into_val(&env).unwrap();
    assert_eq!(
        event_data,
        BatchCreated {
            batch_id: batch_id.clone(),
            creator: farmer,
            registration_id: farmer_id,
            crop_name: String::from_str(&env, "Tulsi"),
        }
    );
}

#[test]
fn test_batch_sent_and_received_events() {
    let (env, client) = setup();
    let (farmer, farmer_id, collector, collector_id) = farmer_and_collector(&env, &client);
    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B-TULSI-2"));

    client.send_batch(
        &farmer,
        &batch_id,
        &collector_id,
        &String::from_str(&env, "Bullock cart"),
        &BytesN::from_array(&env, &[0x22; 32]),
    );

    let sent = env.events().all().last().expect("No events found");
    assert_eq!(
        sent.1,
        vec![
            &env,
            symbol_short!("sent").into_val(&env),
            batch_id.into_val(&env),
        ]
    );
    let sent_data: BatchSent = sent.2.try_into_val(&env).unwrap();
    assert_eq!(
        sent_data,
        BatchSent {
            batch_id: batch_id.clone(),
            from: farmer_id.clone(),
            to: collector_id.clone(),
            transport_method: String::from_str(&env, "Bullock cart"),
        }
    );

    client.receive_batch(
        &collector,
        &batch_id,
        &String::from_str(&env, "Moisture 8%"),
        &BytesN::from_array(&env, &[0x33; 32]),
    );

    let received = env.events().all().last().expect("No events found");
    assert_eq!(
        received.1,
        vec![
            &env,
            symbol_short!("received").into_val(&env),
            batch_id.into_val(&env),
        ]
    );
    let received_data: BatchReceived = received.2.try_into_val(&env).unwrap();
    assert_eq!(
        received_data,
        BatchReceived {
            batch_id,
            by: collector_id,
            from: farmer_id,
        }
    );
}

#[test]
fn test_batch_completed_event() {
    let (env, client) = setup();
    let (farmer, _, collector, collector_id) = farmer_and_collector(&env, &client);
    let name = String::from_str(&env, "n");
    let distributor = Address::generate(&env);
    let retailer = Address::generate(&env);
    let supplier = Address::generate(&env);
    let supplier_id = client.register_user(&supplier, &name, &name, &Role::Supplier);
    let distributor_id = client.register_user(&distributor, &name, &name, &Role::Distributor);
    let retailer_id = client.register_user(&retailer, &name, &name, &Role::Retailer);

    let batch_id = client.create_genesis_batch(&farmer, &genesis(&env, "B-TULSI-3"));
    let sig = BytesN::from_array(&env, &[0x44; 32]);
    let road = String::from_str(&env, "Road");
    for (from, to, to_id) in [
        (&farmer, &collector, &collector_id),
        (&collector, &supplier, &supplier_id),
        (&supplier, &distributor, &distributor_id),
        (&distributor, &retailer, &retailer_id),
    ] {
        client.send_batch(from, &batch_id, to_id, &road, &sig);
        client.receive_batch(to, &batch_id, &name, &sig);
    }
    client.complete_batch(&retailer, &batch_id);

    let completed = env.events().all().last().expect("No events found");
    assert_eq!(
        completed.1,
        vec![
            &env,
            symbol_short!("completed").into_val(&env),
            batch_id.into_val(&env),
        ]
    );
    let data: BatchCompleted = completed.2.try_into_val(&env).unwrap();
    assert_eq!(
        data,
        BatchCompleted {
            batch_id,
            by: retailer_id,
        }
    );
}

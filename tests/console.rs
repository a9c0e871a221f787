//! Console command integration tests

use homekit_bridge::accessory::{
    Accessory, AccessoryName, Characteristic, Service, ServiceType,
};
use homekit_bridge::console::{self, ConsoleCommand};
use std::sync::Arc;

use homekit_bridge::{Error, PairingStore, SqlitePairingStore};

mod common;
use common::{TestBridge, build_test_bridge, lightbulb, pairing, setup_test_bridge, setup_test_db};

async fn run(t: &TestBridge, args: &[&str]) -> String {
    let mut out = Vec::new();
    console::execute(&t.bridge, &ConsoleCommand::parse(args), &mut out)
        .await
        .unwrap();
    String::from_utf8(out).unwrap()
}

fn television(id: u64) -> Accessory {
    Accessory::new(
        id.into(),
        AccessoryName::fixed("TV"),
        vec![Service::new(
            ServiceType::Television,
            vec![
                Characteristic::stored("Active"),
                Characteristic::stored("ActiveIdentifier"),
            ],
        )],
    )
}

#[tokio::test]
async fn test_clear_pairings_command() {
    let t = setup_test_bridge();
    t.store.put(&pairing("ctrl-A", true)).unwrap();

    let output = run(&t, &["clearPairings"]).await;

    assert_eq!(output, "Cleared HomeKit pairings\n");
    assert!(t.store.get("ctrl-A").unwrap().is_none());
    assert_eq!(t.refresh.count(), 1);
}

#[tokio::test]
async fn test_failed_clear_is_reported() {
    let pool = setup_test_db();
    let t = build_test_bridge(Arc::new(SqlitePairingStore::new(pool.clone())));
    t.store.put(&pairing("ctrl-A", true)).unwrap();
    pool.get()
        .unwrap()
        .execute_batch(
            "CREATE TRIGGER block_delete BEFORE DELETE ON pairings
             BEGIN SELECT RAISE(ABORT, 'medium unavailable'); END;",
        )
        .unwrap();

    let output = run(&t, &["clearPairings"]).await;

    assert!(output.starts_with("Could not clear HomeKit pairings: "));
    assert!(output.contains("medium unavailable"));
    assert!(t.store.get("ctrl-A").unwrap().is_some());
    assert_eq!(t.refresh.count(), 0);
}

#[tokio::test]
async fn test_list_renders_placeholders_for_unresolved_names() {
    let t = setup_test_bridge();
    t.registry.register(lightbulb(1, "Kitchen Light"));
    t.registry.register(Accessory::new(
        2.into(),
        AccessoryName::resolving(async { Err(Error::NotFound("binding offline".to_string())) }),
        Vec::new(),
    ));
    t.registry.register(Accessory::new(
        3.into(),
        AccessoryName::resolving(std::future::pending()),
        Vec::new(),
    ));

    let output = run(&t, &["list"]).await;
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines[0], "1 Kitchen Light");
    assert!(lines[1].starts_with("2 <error: "));
    assert!(lines[1].contains("binding offline"));
    assert_eq!(lines[2], "3 <unknown>");
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn test_legacy_list_appends_hint() {
    let t = setup_test_bridge();
    t.registry.register(lightbulb(1, "Kitchen Light"));

    let output = run(&t, &["listAccessories"]).await;

    assert!(output.starts_with("1 Kitchen Light\n"));
    assert!(output.contains("'homekit list'"));
}

#[tokio::test]
async fn test_show_prints_services_and_characteristics() {
    let t = setup_test_bridge();
    t.registry.register(lightbulb(1, "Kitchen Light"));
    t.registry.register(television(2));

    let output = run(&t, &["show", "tv"]).await;

    assert!(output.starts_with("2 TV\n"));
    assert!(output.contains("Services:"));
    assert!(output.contains("Service Type: Television"));
    assert!(output.contains("Characteristics:"));
    assert!(output.contains(": ActiveIdentifier"));
    assert!(!output.contains("Kitchen Light"));
}

#[tokio::test]
async fn test_show_requires_argument() {
    let t = setup_test_bridge();

    let output = run(&t, &["show"]).await;
    assert_eq!(output, "accessory id or name is required as an argument\n");

    let output = run(&t, &["printAccessory"]).await;
    assert!(output.starts_with("accessory id or name is required as an argument\n"));
    assert!(output.contains("'homekit show <accessory_id|name>'"));
}

#[tokio::test]
async fn test_show_reports_no_match() {
    let t = setup_test_bridge();
    t.registry.register(lightbulb(1, "Kitchen Light"));

    let output = run(&t, &["show", "garage"]).await;
    assert_eq!(output, "No accessory matches 'garage'\n");
}

#[tokio::test]
async fn test_allow_unauthenticated_command() {
    let t = setup_test_bridge();

    assert_eq!(
        run(&t, &["allowUnauthenticated"]).await,
        "true/false is required as an argument\n"
    );
    assert!(!t.bridge.allows_unauthenticated());

    run(&t, &["allowUnauthenticated", "true"]).await;
    assert!(t.bridge.allows_unauthenticated());

    run(&t, &["allowUnauthenticated", "false"]).await;
    assert!(!t.bridge.allows_unauthenticated());
}

#[tokio::test]
async fn test_unknown_command_prints_usage() {
    let t = setup_test_bridge();

    let output = run(&t, &["frobnicate"]).await;

    assert!(output.starts_with("Unknown command 'frobnicate'\n"));
    assert_eq!(output.matches("Usage: homekit ").count(), 4);
}

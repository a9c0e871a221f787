//! Bridge authority integration tests

use std::sync::Arc;
use std::time::Duration;

use homekit_bridge::accessory::{Accessory, AccessoryName, NameResolution};
use homekit_bridge::{ClearState, Error, PairingStore, SqlitePairingStore, db};

mod common;
use common::{build_test_bridge, lightbulb, pairing, setup_test_bridge};

#[tokio::test]
async fn test_clear_pairings_scenario() {
    let t = setup_test_bridge();
    t.registry.register(lightbulb(1, "Kitchen Light"));
    t.registry.register(lightbulb(2, "TV"));
    t.store.put(&pairing("ctrl-A", true)).unwrap();

    let removed = t.bridge.clear_pairings().await.unwrap();

    assert_eq!(removed, 1);
    assert!(t.store.list().unwrap().is_empty());
    assert!(t.store.get("ctrl-A").unwrap().is_none());
    assert_eq!(t.refresh.count(), 1);
    assert_eq!(t.bridge.last_clear().await, ClearState::Refreshed);

    // Accessories are untouched by a pairing reset
    assert_eq!(t.bridge.accessory_count(), 2);
}

#[tokio::test]
async fn test_clear_pairings_on_empty_store_still_refreshes() {
    let t = setup_test_bridge();

    assert_eq!(t.bridge.clear_pairings().await.unwrap(), 0);
    assert_eq!(t.refresh.count(), 1);
}

#[tokio::test]
async fn test_cleared_pairings_stay_cleared_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");

    {
        let store = Arc::new(SqlitePairingStore::new(db::init(&path).unwrap()));
        store.put(&pairing("ctrl-A", true)).unwrap();
        store.put(&pairing("ctrl-B", false)).unwrap();
        let t = build_test_bridge(store);
        t.bridge.clear_pairings().await.unwrap();
    }

    let reopened = SqlitePairingStore::new(db::init(&path).unwrap());
    assert!(reopened.list().unwrap().is_empty());
    assert!(!reopened.has_pairings().unwrap());
}

#[tokio::test]
async fn test_pairings_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");

    {
        let store = Arc::new(SqlitePairingStore::new(db::init(&path).unwrap()));
        let t = build_test_bridge(store);
        t.bridge.add_pairing(&pairing("ctrl-A", true)).await.unwrap();
    }

    let reopened = SqlitePairingStore::new(db::init(&path).unwrap());
    let record = reopened.get("ctrl-A").unwrap().unwrap();
    assert!(record.admin);
    assert_eq!(record.public_key, pairing("ctrl-A", true).public_key);
}

#[tokio::test]
async fn test_concurrent_writes_and_clear_leave_consistent_store() {
    let t = setup_test_bridge();
    for i in 0..10 {
        t.store.put(&pairing(&format!("seed-{i}"), false)).unwrap();
    }

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let store = Arc::clone(&t.store);
            std::thread::spawn(move || {
                for i in 0..25 {
                    store.put(&pairing(&format!("w{w}-{i}"), false)).unwrap();
                }
            })
        })
        .collect();

    t.bridge.clear_pairings().await.unwrap();

    for writer in writers {
        writer.join().unwrap();
    }

    // Seed records predate the clear and none may survive it
    let remaining = t.store.list().unwrap();
    assert!(remaining.iter().all(|r| r.controller_id.starts_with('w')));
    assert_eq!(t.refresh.count(), 1);
}

#[tokio::test]
async fn test_add_and_remove_pairing_refresh_protocol() {
    let t = setup_test_bridge();

    t.bridge.add_pairing(&pairing("ctrl-A", true)).await.unwrap();
    assert!(t.bridge.is_paired().unwrap());
    assert_eq!(t.refresh.count(), 1);

    assert!(t.bridge.remove_pairing("ctrl-A").await.unwrap());
    assert!(!t.bridge.remove_pairing("ctrl-A").await.unwrap());
    assert_eq!(t.refresh.count(), 2);
}

#[tokio::test]
async fn test_authorize_follows_gate_and_pairings() {
    let t = setup_test_bridge();
    t.bridge.add_pairing(&pairing("ctrl-A", false)).await.unwrap();

    assert!(t.bridge.authorize(Some("ctrl-A")).unwrap());
    assert!(!t.bridge.authorize(Some("ctrl-B")).unwrap());
    assert!(!t.bridge.authorize(None).unwrap());

    t.bridge.set_unauthenticated_access(true);
    assert!(t.bridge.allows_unauthenticated());
    assert!(t.bridge.authorize(None).unwrap());
    assert!(t.bridge.authorize(Some("ctrl-B")).unwrap());

    t.bridge.set_unauthenticated_access(false);
    assert!(!t.bridge.authorize(None).unwrap());
}

#[tokio::test]
async fn test_listing_tolerates_unresolvable_names() {
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

    let started = std::time::Instant::now();
    let entries = t.bridge.accessories().await;

    assert!(started.elapsed() < Duration::from_secs(3));
    let ids: Vec<u64> = entries.iter().map(|e| e.id().0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(
        entries[0].name,
        NameResolution::Resolved("Kitchen Light".to_string())
    );
    assert!(matches!(entries[1].name, NameResolution::Failed(_)));
    assert_eq!(entries[2].name, NameResolution::Pending);
}

#[tokio::test]
async fn test_clear_from_another_process_revokes_access() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bridge.db");

    let t = build_test_bridge(Arc::new(SqlitePairingStore::new(db::init(&path).unwrap())));
    t.bridge.add_pairing(&pairing("ctrl-A", true)).await.unwrap();
    assert!(t.bridge.authorize(Some("ctrl-A")).unwrap());

    // A second handle on the same file, as a one-shot CLI invocation would open
    let external = SqlitePairingStore::new(db::init(&path).unwrap());
    assert_eq!(external.clear_all().unwrap(), 1);

    assert!(t.bridge.pairing("ctrl-A").unwrap().is_none());
    assert!(!t.bridge.authorize(Some("ctrl-A")).unwrap());
    assert!(!t.bridge.is_paired().unwrap());
}

//! Shared test utilities
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use homekit_bridge::accessory::{Accessory, AccessoryName, AccessoryRegistry, Service, ServiceType};
use homekit_bridge::{
    AuthGate, AuthRefresh, Bridge, DbPool, PairingRecord, PairingStore, SqlitePairingStore, db,
};

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Protocol stub that counts refreshes
#[derive(Default)]
pub struct CountingRefresh {
    count: AtomicUsize,
}

impl CountingRefresh {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthRefresh for CountingRefresh {
    async fn refresh_auth_info(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// A bridge over a fresh in-memory store, plus handles to its parts
pub struct TestBridge {
    pub bridge: Bridge,
    pub store: Arc<SqlitePairingStore>,
    pub registry: Arc<AccessoryRegistry>,
    pub refresh: Arc<CountingRefresh>,
}

/// Build a bridge over `store` with an empty registry
pub fn build_test_bridge(store: Arc<SqlitePairingStore>) -> TestBridge {
    let registry = Arc::new(AccessoryRegistry::default());
    let refresh = Arc::new(CountingRefresh::default());
    let bridge = Bridge::new(
        Arc::clone(&store) as Arc<dyn PairingStore>,
        Arc::clone(&registry),
        Arc::new(AuthGate::default()),
        Arc::clone(&refresh) as Arc<dyn AuthRefresh>,
    );

    TestBridge {
        bridge,
        store,
        registry,
        refresh,
    }
}

/// Build a bridge over an in-memory store
pub fn setup_test_bridge() -> TestBridge {
    build_test_bridge(Arc::new(SqlitePairingStore::new(setup_test_db())))
}

/// A lightbulb accessory with a fixed name
pub fn lightbulb(id: u64, name: &str) -> Accessory {
    Accessory::new(
        id.into(),
        AccessoryName::fixed(name),
        vec![Service::new(ServiceType::Lightbulb, Vec::new())],
    )
}

/// A pairing record with a deterministic key
pub fn pairing(controller_id: &str, admin: bool) -> PairingRecord {
    let mut key = [0u8; 32];
    for (i, b) in controller_id.bytes().enumerate() {
        key[i % 32] ^= b;
    }
    PairingRecord::new(controller_id, key, admin)
}

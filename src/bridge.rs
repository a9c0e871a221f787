//! Bridge authority
//!
//! Composes the pairing store, the unauthenticated-access gate, and the
//! accessory registry into the operation set used by management tooling.
//! Every pairing mutation is followed by a refresh of the protocol layer's
//! auth state, and only once the store change has committed.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::Result;
use crate::accessory::{AccessoryEntry, AccessoryRegistry};
use crate::security::{AuthGate, PairingRecord, PairingStore};

/// Hook into the live protocol layer
#[async_trait]
pub trait AuthRefresh: Send + Sync {
    /// Reload authentication state from the pairing store
    async fn refresh_auth_info(&self);
}

/// Progress of a `clear_pairings` call
///
/// `Clearing` only exists while the operation holds the lock, so callers of
/// [`Bridge::last_clear`] only ever see a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearState {
    #[default]
    Idle,
    Clearing,
    Refreshed,
    Failed,
}

impl std::fmt::Display for ClearState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Clearing => write!(f, "clearing"),
            Self::Refreshed => write!(f, "refreshed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Orchestrates pairings, the auth gate, and the accessory registry
pub struct Bridge {
    store: Arc<dyn PairingStore>,
    registry: Arc<AccessoryRegistry>,
    gate: Arc<AuthGate>,
    protocol: Arc<dyn AuthRefresh>,
    /// Serializes pairing mutations with their refresh
    mutation: Mutex<ClearState>,
}

impl Bridge {
    /// Create a bridge from its collaborators
    #[must_use]
    pub fn new(
        store: Arc<dyn PairingStore>,
        registry: Arc<AccessoryRegistry>,
        gate: Arc<AuthGate>,
        protocol: Arc<dyn AuthRefresh>,
    ) -> Self {
        Self {
            store,
            registry,
            gate,
            protocol,
            mutation: Mutex::new(ClearState::Idle),
        }
    }

    /// Remove every controller pairing and refresh the protocol layer
    ///
    /// The refresh runs exactly once, after the clear committed. If the
    /// store fails nothing is refreshed and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the pairing store could not be cleared
    pub async fn clear_pairings(&self) -> Result<usize> {
        let mut state = self.mutation.lock().await;
        *state = ClearState::Clearing;

        match self.store.clear_all() {
            Ok(removed) => {
                self.protocol.refresh_auth_info().await;
                *state = ClearState::Refreshed;
                tracing::info!(removed, "cleared HomeKit pairings");
                Ok(removed)
            }
            Err(e) => {
                *state = ClearState::Failed;
                tracing::warn!(error = %e, "could not clear HomeKit pairings");
                Err(e)
            }
        }
    }

    /// Outcome of the most recent `clear_pairings`
    pub async fn last_clear(&self) -> ClearState {
        *self.mutation.lock().await
    }

    /// Store a pairing produced by a completed pair-setup and refresh
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the record could not be stored
    pub async fn add_pairing(&self, record: &PairingRecord) -> Result<()> {
        let _guard = self.mutation.lock().await;
        self.store.put(record)?;
        self.protocol.refresh_auth_info().await;
        Ok(())
    }

    /// Remove one controller's pairing, refreshing if anything was removed
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the store could not be updated
    pub async fn remove_pairing(&self, controller_id: &str) -> Result<bool> {
        let _guard = self.mutation.lock().await;
        let removed = self.store.delete(controller_id)?;
        if removed {
            self.protocol.refresh_auth_info().await;
        }
        Ok(removed)
    }

    /// Look up a controller's pairing
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the store is unavailable
    pub fn pairing(&self, controller_id: &str) -> Result<Option<PairingRecord>> {
        self.store.get(controller_id)
    }

    /// All pairings, oldest first
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the store is unavailable
    pub fn pairings(&self) -> Result<Vec<PairingRecord>> {
        self.store.list()
    }

    /// Whether any controller is paired
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the store is unavailable
    pub fn is_paired(&self) -> Result<bool> {
        self.store.has_pairings()
    }

    /// Decide whether a protocol request may proceed
    ///
    /// Allowed when the gate permits unauthenticated access, otherwise only
    /// for a controller holding a pairing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the store is unavailable
    pub fn authorize(&self, controller_id: Option<&str>) -> Result<bool> {
        if self.gate.get_allow_unauthenticated() {
            return Ok(true);
        }

        match controller_id {
            Some(id) => Ok(self.store.get(id)?.is_some()),
            None => Ok(false),
        }
    }

    /// Enable or disable unauthenticated access
    pub fn set_unauthenticated_access(&self, allow: bool) {
        self.gate.set_allow_unauthenticated(allow);
    }

    /// Whether unauthenticated access is currently enabled
    #[must_use]
    pub fn allows_unauthenticated(&self) -> bool {
        self.gate.get_allow_unauthenticated()
    }

    /// All accessories in registration order, names resolved with a bounded wait
    pub async fn accessories(&self) -> Vec<AccessoryEntry> {
        self.registry.list().await
    }

    /// Accessories whose id or name contains `query`, ignoring case
    pub async fn find_accessories(&self, query: &str) -> Vec<AccessoryEntry> {
        self.registry.find(query).await
    }

    /// Number of registered accessories
    #[must_use]
    pub fn accessory_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::Error;
    use crate::db::init_memory;
    use crate::security::SqlitePairingStore;

    #[derive(Default)]
    struct CountingRefresh(AtomicUsize);

    #[async_trait]
    impl AuthRefresh for CountingRefresh {
        async fn refresh_auth_info(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Store whose medium is gone
    struct UnavailableStore;

    impl PairingStore for UnavailableStore {
        fn get(&self, _: &str) -> Result<Option<PairingRecord>> {
            Err(Error::Storage("medium unavailable".to_string()))
        }
        fn put(&self, _: &PairingRecord) -> Result<()> {
            Err(Error::Storage("medium unavailable".to_string()))
        }
        fn delete(&self, _: &str) -> Result<bool> {
            Err(Error::Storage("medium unavailable".to_string()))
        }
        fn clear_all(&self) -> Result<usize> {
            Err(Error::Storage("medium unavailable".to_string()))
        }
        fn list(&self) -> Result<Vec<PairingRecord>> {
            Err(Error::Storage("medium unavailable".to_string()))
        }
    }

    fn bridge_with(store: Arc<dyn PairingStore>) -> (Bridge, Arc<CountingRefresh>) {
        let refresh = Arc::new(CountingRefresh::default());
        let bridge = Bridge::new(
            store,
            Arc::new(AccessoryRegistry::default()),
            Arc::new(AuthGate::default()),
            refresh.clone(),
        );
        (bridge, refresh)
    }

    fn sqlite_bridge() -> (Bridge, Arc<CountingRefresh>) {
        bridge_with(Arc::new(SqlitePairingStore::new(init_memory().unwrap())))
    }

    #[tokio::test]
    async fn test_clear_pairings_refreshes_once() {
        let (bridge, refresh) = sqlite_bridge();
        bridge
            .add_pairing(&PairingRecord::new("ctrl-A", [7; 32], true))
            .await
            .unwrap();
        let before = refresh.0.load(Ordering::SeqCst);

        assert_eq!(bridge.clear_pairings().await.unwrap(), 1);

        assert_eq!(refresh.0.load(Ordering::SeqCst), before + 1);
        assert!(bridge.pairing("ctrl-A").unwrap().is_none());
        assert_eq!(bridge.last_clear().await, ClearState::Refreshed);
    }

    #[tokio::test]
    async fn test_clear_pairings_failure_skips_refresh() {
        let (bridge, refresh) = bridge_with(Arc::new(UnavailableStore));
        bridge.set_unauthenticated_access(true);

        let err = bridge.clear_pairings().await.unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(refresh.0.load(Ordering::SeqCst), 0);
        assert_eq!(bridge.last_clear().await, ClearState::Failed);
        // Gate untouched by the failed clear
        assert!(bridge.allows_unauthenticated());
    }

    #[tokio::test]
    async fn test_remove_pairing_refreshes_only_when_removed() {
        let (bridge, refresh) = sqlite_bridge();
        bridge
            .add_pairing(&PairingRecord::new("ctrl-A", [1; 32], false))
            .await
            .unwrap();
        assert_eq!(refresh.0.load(Ordering::SeqCst), 1);

        assert!(!bridge.remove_pairing("ctrl-B").await.unwrap());
        assert_eq!(refresh.0.load(Ordering::SeqCst), 1);

        assert!(bridge.remove_pairing("ctrl-A").await.unwrap());
        assert_eq!(refresh.0.load(Ordering::SeqCst), 2);
        assert!(!bridge.is_paired().unwrap());
    }

    #[tokio::test]
    async fn test_authorize() {
        let (bridge, _) = sqlite_bridge();
        bridge
            .add_pairing(&PairingRecord::new("ctrl-A", [2; 32], false))
            .await
            .unwrap();

        assert!(bridge.authorize(Some("ctrl-A")).unwrap());
        assert!(!bridge.authorize(Some("ctrl-B")).unwrap());
        assert!(!bridge.authorize(None).unwrap());

        bridge.set_unauthenticated_access(true);
        assert!(bridge.authorize(None).unwrap());
        assert!(bridge.authorize(Some("ctrl-B")).unwrap());
    }

    #[test]
    fn test_authorize_surfaces_storage_failure() {
        let (bridge, _) = bridge_with(Arc::new(UnavailableStore));
        assert!(matches!(
            bridge.authorize(Some("ctrl-A")),
            Err(Error::Storage(_))
        ));
    }

    #[tokio::test]
    async fn test_initial_clear_state_is_idle() {
        let (bridge, _) = sqlite_bridge();
        assert_eq!(bridge.last_clear().await, ClearState::Idle);
    }
}

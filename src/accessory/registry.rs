//! Registry of accessories exposed through the bridge

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use futures::future::join_all;
use indexmap::IndexMap;

use super::name::NameResolution;
use super::types::{Accessory, AccessoryId};
use crate::Error;

/// Default bounded wait for a single accessory name
pub const DEFAULT_NAME_TIMEOUT: Duration = Duration::from_secs(1);

/// An accessory together with the outcome of its name resolution
#[derive(Debug, Clone)]
pub struct AccessoryEntry {
    pub accessory: Arc<Accessory>,
    pub name: NameResolution,
}

impl AccessoryEntry {
    #[must_use]
    pub fn id(&self) -> AccessoryId {
        self.accessory.id()
    }

    /// Case-insensitive substring match against the id or resolved name
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.id().to_string().to_lowercase().contains(&query)
            || self
                .name
                .name()
                .is_some_and(|name| name.to_lowercase().contains(&query))
    }
}

/// In-memory accessory tree, enumerated in registration order
///
/// Mutations hold the write lock only long enough to touch the map.
/// Enumeration copies the current set of `Arc`s and resolves names with the
/// lock released, so a slow name never blocks registration.
#[derive(Debug)]
pub struct AccessoryRegistry {
    accessories: RwLock<IndexMap<AccessoryId, Arc<Accessory>>>,
    name_timeout: Duration,
}

impl Default for AccessoryRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_NAME_TIMEOUT)
    }
}

impl AccessoryRegistry {
    /// Create an empty registry with the given per-accessory name wait
    #[must_use]
    pub fn new(name_timeout: Duration) -> Self {
        Self {
            accessories: RwLock::new(IndexMap::new()),
            name_timeout,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, IndexMap<AccessoryId, Arc<Accessory>>> {
        self.accessories.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, IndexMap<AccessoryId, Arc<Accessory>>> {
        self.accessories.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an accessory, appending it to the enumeration order
    ///
    /// An accessory already registered under the same id is replaced and
    /// returned; the replacement moves to the end.
    pub fn register(&self, accessory: Accessory) -> Option<Arc<Accessory>> {
        let id = accessory.id();
        let previous = {
            let mut accessories = self.write();
            let previous = accessories.shift_remove(&id);
            accessories.insert(id, Arc::new(accessory));
            previous
        };

        if previous.is_some() {
            tracing::debug!(%id, "accessory re-registered");
        } else {
            tracing::debug!(%id, "accessory registered");
        }
        previous
    }

    /// Remove an accessory, keeping the order of the rest
    pub fn deregister(&self, id: AccessoryId) -> Option<Arc<Accessory>> {
        let removed = self.write().shift_remove(&id);
        if removed.is_some() {
            tracing::debug!(%id, "accessory deregistered");
        }
        removed
    }

    /// Get an accessory by id
    #[must_use]
    pub fn get(&self, id: AccessoryId) -> Option<Arc<Accessory>> {
        self.read().get(&id).cloned()
    }

    /// Current accessories in registration order, without resolving names
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<Accessory>> {
        self.read().values().cloned().collect()
    }

    /// Number of registered accessories
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// The bounded wait applied to each name
    #[must_use]
    pub const fn name_timeout(&self) -> Duration {
        self.name_timeout
    }

    /// List all accessories with their names
    ///
    /// Names resolve concurrently, each bounded by the registry's timeout.
    /// An accessory whose name fails or times out is still listed, with a
    /// placeholder name; the problem is logged and the listing carries on.
    pub async fn list(&self) -> Vec<AccessoryEntry> {
        let snapshot = self.snapshot();
        join_all(snapshot.into_iter().map(|accessory| self.resolve_entry(accessory))).await
    }

    /// Accessories whose id or resolved name contains `query`, ignoring case
    pub async fn find(&self, query: &str) -> Vec<AccessoryEntry> {
        self.list()
            .await
            .into_iter()
            .filter(|entry| entry.matches(query))
            .collect()
    }

    async fn resolve_entry(&self, accessory: Arc<Accessory>) -> AccessoryEntry {
        let id = accessory.id();
        let name = match accessory.name().resolve(id, self.name_timeout).await {
            Ok(name) => NameResolution::Resolved(name),
            Err(e @ Error::ResolutionTimeout { .. }) => {
                tracing::warn!(%id, error = %e, "accessory name still pending");
                NameResolution::Pending
            }
            Err(Error::ResolutionFailed { reason, .. }) => {
                tracing::warn!(%id, %reason, "cannot resolve accessory name");
                NameResolution::Failed(reason)
            }
            Err(e) => {
                tracing::warn!(%id, error = %e, "cannot resolve accessory name");
                NameResolution::Failed(e.to_string())
            }
        };

        AccessoryEntry { accessory, name }
    }
}

//! Device handler factory
//!
//! Maps a thing type to the constructor for its handler. Handlers need the
//! discovery manager, so construction is refused with
//! `Error::DependencyNotReady` until one is bound.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Thing type identifier, `binding:type` (e.g. `lgwebos:WebOSTV`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThingTypeUid {
    pub binding: String,
    pub id: String,
}

impl ThingTypeUid {
    #[must_use]
    pub fn new(binding: &str, id: &str) -> Self {
        Self {
            binding: binding.to_string(),
            id: id.to_string(),
        }
    }

    /// Parse `binding:type`
    ///
    /// # Errors
    ///
    /// Returns error if either segment is missing
    pub fn parse(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some((binding, id)) if !binding.is_empty() && !id.is_empty() => {
                Ok(Self::new(binding, id))
            }
            _ => Err(Error::Config(format!("invalid thing type uid: {s}"))),
        }
    }
}

impl std::fmt::Display for ThingTypeUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.binding, self.id)
    }
}

/// A configured device instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thing {
    pub uid: String,
    pub thing_type: ThingTypeUid,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

/// Discovery collaborator handed to every handler
pub trait DiscoveryManager: Send + Sync {
    /// Network address last seen for a thing, if discovered
    fn host_for(&self, thing_uid: &str) -> Option<String>;
}

/// Runtime handler for one thing
pub trait ThingHandler: Send + Sync {
    /// The thing this handler drives
    fn thing(&self) -> &Thing;
}

/// Builds a handler for a thing of a supported type
pub type HandlerConstructor =
    Box<dyn Fn(&Thing, Arc<dyn DiscoveryManager>) -> Box<dyn ThingHandler> + Send + Sync>;

/// Registry of handler constructors keyed by thing type
#[derive(Default)]
pub struct HandlerFactory {
    constructors: HashMap<ThingTypeUid, HandlerConstructor>,
    discovery: RwLock<Option<Arc<dyn DiscoveryManager>>>,
}

impl HandlerFactory {
    /// Create a factory with no discovery manager bound
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a factory with its discovery manager already available
    #[must_use]
    pub fn with_discovery(discovery: Arc<dyn DiscoveryManager>) -> Self {
        let factory = Self::new();
        factory.bind_discovery(discovery);
        factory
    }

    /// Register the constructor for a thing type
    #[must_use]
    pub fn register<F>(mut self, thing_type: ThingTypeUid, constructor: F) -> Self
    where
        F: Fn(&Thing, Arc<dyn DiscoveryManager>) -> Box<dyn ThingHandler> + Send + Sync + 'static,
    {
        self.constructors.insert(thing_type, Box::new(constructor));
        self
    }

    /// Whether a thing type has a registered constructor
    #[must_use]
    pub fn supports(&self, thing_type: &ThingTypeUid) -> bool {
        self.constructors.contains_key(thing_type)
    }

    /// Make the discovery manager available to new handlers
    pub fn bind_discovery(&self, discovery: Arc<dyn DiscoveryManager>) {
        *self.discovery.write().unwrap_or_else(PoisonError::into_inner) = Some(discovery);
        tracing::debug!("discovery manager bound");
    }

    /// Withdraw the discovery manager; later constructions fail
    pub fn unbind_discovery(&self) {
        *self.discovery.write().unwrap_or_else(PoisonError::into_inner) = None;
        tracing::debug!("discovery manager unbound");
    }

    /// Create the handler for a thing
    ///
    /// Returns `Ok(None)` for thing types this factory does not handle.
    ///
    /// # Errors
    ///
    /// Returns `Error::DependencyNotReady` if no discovery manager is bound
    pub fn create_handler(&self, thing: &Thing) -> Result<Option<Box<dyn ThingHandler>>> {
        let discovery = self
            .discovery
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or_else(|| {
                Error::DependencyNotReady(
                    "discovery manager must be bound before handlers can be created".to_string(),
                )
            })?;

        let Some(constructor) = self.constructors.get(&thing.thing_type) else {
            tracing::debug!(
                thing = %thing.uid,
                thing_type = %thing.thing_type,
                "unsupported thing type"
            );
            return Ok(None);
        };

        tracing::debug!(thing = %thing.uid, thing_type = %thing.thing_type, "creating handler");
        Ok(Some(constructor(thing, discovery)))
    }
}

//! mDNS advertisement of the bridge as a HAP accessory server
//!
//! Service type: `_hap._tcp.local`
//! Instance name: the bridge display name
//!
//! TXT records:
//! - `c#`: configuration number
//! - `ff`: feature flags (0, no MFi authentication)
//! - `id`: bridge device id
//! - `md`: model name
//! - `pv`: protocol version
//! - `s#`: state number
//! - `sf`: status flags, 1 while no controller is paired
//! - `ci`: accessory category (2 = bridge)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use mdns_sd::{ServiceDaemon, ServiceInfo};
use tokio::sync::RwLock;

use crate::bridge::AuthRefresh;
use crate::security::{BridgeIdentity, PairingStore};
use crate::{Error, Result};

/// mDNS service type for HAP accessory servers
pub const SERVICE_TYPE: &str = "_hap._tcp.local.";

/// HAP accessory category for bridges
pub const CATEGORY_BRIDGE: u8 = 2;

/// HAP protocol version advertised
const PROTOCOL_VERSION: &str = "1.1";

/// Build the TXT properties for the current pairing state
#[must_use]
pub fn txt_records(
    identity: &BridgeIdentity,
    config_number: u32,
    paired: bool,
) -> HashMap<String, String> {
    let mut properties = HashMap::new();
    properties.insert("c#".to_string(), config_number.to_string());
    properties.insert("ff".to_string(), "0".to_string());
    properties.insert("id".to_string(), identity.device_id.clone());
    properties.insert("md".to_string(), identity.name.clone());
    properties.insert("pv".to_string(), PROTOCOL_VERSION.to_string());
    properties.insert("s#".to_string(), "1".to_string());
    properties.insert("sf".to_string(), if paired { "0" } else { "1" }.to_string());
    properties.insert("ci".to_string(), CATEGORY_BRIDGE.to_string());
    properties
}

/// Publishes the bridge over mDNS and keeps the status flag in step with
/// the pairing store
pub struct HapAdvertiser {
    /// mDNS daemon
    daemon: ServiceDaemon,

    identity: BridgeIdentity,
    port: u16,
    config_number: u32,
    store: Arc<dyn PairingStore>,

    /// Currently registered service (if any)
    registered_service: Arc<RwLock<Option<String>>>,
}

impl HapAdvertiser {
    /// Create a new advertiser
    ///
    /// # Errors
    ///
    /// Returns error if mDNS daemon cannot be created
    pub fn new(
        identity: BridgeIdentity,
        port: u16,
        config_number: u32,
        store: Arc<dyn PairingStore>,
    ) -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| Error::Advertise(format!("failed to create mDNS daemon: {e}")))?;

        Ok(Self {
            daemon,
            identity,
            port,
            config_number,
            store,
            registered_service: Arc::new(RwLock::new(None)),
        })
    }

    /// Start advertising the bridge
    ///
    /// # Errors
    ///
    /// Returns error if the pairing store cannot be read or the service
    /// cannot be registered
    pub async fn start(&self) -> Result<()> {
        let paired = self.store.has_pairings()?;
        self.publish(paired).await
    }

    async fn publish(&self, paired: bool) -> Result<()> {
        let hostname = hostname::get()
            .map_or_else(|_| "homekit-bridge".to_string(), |h| h.to_string_lossy().to_string());

        let service = ServiceInfo::new(
            SERVICE_TYPE,
            &self.identity.name,
            &format!("{hostname}.local."),
            "",
            self.port,
            txt_records(&self.identity, self.config_number, paired),
        )
        .map_err(|e| Error::Advertise(format!("failed to create service info: {e}")))?
        .enable_addr_auto();

        let fullname = service.get_fullname().to_string();

        let mut registered = self.registered_service.write().await;
        if let Some(previous) = registered.take() {
            if let Err(e) = self.daemon.unregister(&previous) {
                tracing::debug!(error = %e, "failed to withdraw previous mDNS record");
            }
        }

        self.daemon
            .register(service)
            .map_err(|e| Error::Advertise(format!("failed to register mDNS service: {e}")))?;
        *registered = Some(fullname);

        tracing::info!(
            service_type = SERVICE_TYPE,
            instance = %self.identity.name,
            port = self.port,
            paired,
            "mDNS service registered"
        );

        Ok(())
    }

    /// Stop advertising the bridge
    pub async fn stop(&self) {
        let fullname = self.registered_service.write().await.take();

        if let Some(name) = fullname {
            if let Err(e) = self.daemon.unregister(&name) {
                tracing::warn!(error = %e, "failed to unregister mDNS service");
            } else {
                tracing::info!("mDNS service unregistered");
            }
        }
    }

    /// Check if currently advertising
    pub async fn is_advertising(&self) -> bool {
        self.registered_service.read().await.is_some()
    }
}

#[async_trait]
impl AuthRefresh for HapAdvertiser {
    async fn refresh_auth_info(&self) {
        if !self.is_advertising().await {
            return;
        }

        let paired = match self.store.has_pairings() {
            Ok(paired) => paired,
            Err(e) => {
                tracing::warn!(error = %e, "cannot read pairings, keeping current advertisement");
                return;
            }
        };

        if let Err(e) = self.publish(paired).await {
            tracing::warn!(error = %e, "failed to refresh mDNS advertisement");
        }
    }
}

impl Drop for HapAdvertiser {
    fn drop(&mut self) {
        // Best effort, synchronous
        if let Ok(guard) = self.registered_service.try_read() {
            if let Some(name) = guard.as_ref() {
                let _ = self.daemon.unregister(name);
            }
        }
        if let Err(e) = self.daemon.shutdown() {
            tracing::trace!(error = %e, "mDNS daemon shutdown error (expected on normal exit)");
        }
    }
}

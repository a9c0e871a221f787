//! HomeKit Bridge - accessory bridge authority
//!
//! This library provides the management core of a HomeKit bridge:
//! - Durable controller pairings with atomic clear
//! - Accessory registry with bounded, asynchronous name resolution
//! - Runtime gate for unauthenticated access
//! - Bridge identity and `_hap._tcp` mDNS advertisement
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    Interfaces                        │
//! │        CLI  │  Console commands  │  Handlers         │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Bridge                          │
//! │   Pairing store  │  Auth gate  │  Accessory registry │
//! └────────────────────┬────────────────────────────────┘
//!                      │ refresh_auth_info
//! ┌────────────────────▼────────────────────────────────┐
//! │                Protocol layer                        │
//! │        HAP advertiser (mDNS status flags)            │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod accessory;
pub mod bridge;
pub mod config;
pub mod console;
pub mod db;
pub mod discovery;
pub mod error;
pub mod handler;
pub mod security;

pub use accessory::{
    Accessory, AccessoryEntry, AccessoryId, AccessoryName, AccessoryRegistry, NameResolution,
};
pub use bridge::{AuthRefresh, Bridge, ClearState};
pub use config::Config;
pub use console::ConsoleCommand;
pub use db::{DbConn, DbPool};
pub use discovery::HapAdvertiser;
pub use error::{Error, Result};
pub use handler::{DiscoveryManager, HandlerFactory, Thing, ThingHandler, ThingTypeUid};
pub use security::{AuthGate, BridgeIdentity, PairingRecord, PairingStore, SqlitePairingStore};

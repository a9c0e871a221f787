//! Accessory tree published by the bridge
//!
//! Accessories own services, which own characteristics. Names resolve
//! asynchronously and are fetched with a bounded wait when listing.

pub mod name;
pub mod registry;
pub mod types;

pub use name::{AccessoryName, NameResolution};
pub use registry::{AccessoryEntry, AccessoryRegistry};
pub use types::{
    Accessory, AccessoryId, Characteristic, CharacteristicType, CharacteristicValue, Service,
    ServiceType, StoredValue,
};

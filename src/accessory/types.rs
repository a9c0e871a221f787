//! Accessory data model
//!
//! Accessories own services, services own characteristics. The tree is built
//! once at registration and its structure never changes afterwards;
//! characteristic values may change behind the bridge's back.

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::name::AccessoryName;
use crate::Result;

/// Accessory instance id, stable for the accessory's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessoryId(pub u64);

impl std::fmt::Display for AccessoryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for AccessoryId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Service type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceType {
    AccessoryInformation,
    Lightbulb,
    Switch,
    Outlet,
    Fan,
    Thermostat,
    TemperatureSensor,
    HumiditySensor,
    ContactSensor,
    MotionSensor,
    LockMechanism,
    WindowCovering,
    Television,
    /// Type outside the built-in vocabulary
    Custom(String),
}

impl ServiceType {
    /// Parse from string representation
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "accessoryinformation" => Self::AccessoryInformation,
            "lightbulb" | "light" => Self::Lightbulb,
            "switch" => Self::Switch,
            "outlet" => Self::Outlet,
            "fan" => Self::Fan,
            "thermostat" => Self::Thermostat,
            "temperaturesensor" => Self::TemperatureSensor,
            "humiditysensor" => Self::HumiditySensor,
            "contactsensor" => Self::ContactSensor,
            "motionsensor" => Self::MotionSensor,
            "lockmechanism" | "lock" => Self::LockMechanism,
            "windowcovering" | "blinds" => Self::WindowCovering,
            "television" | "tv" => Self::Television,
            _ => Self::Custom(s.to_string()),
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AccessoryInformation => write!(f, "AccessoryInformation"),
            Self::Lightbulb => write!(f, "Lightbulb"),
            Self::Switch => write!(f, "Switch"),
            Self::Outlet => write!(f, "Outlet"),
            Self::Fan => write!(f, "Fan"),
            Self::Thermostat => write!(f, "Thermostat"),
            Self::TemperatureSensor => write!(f, "TemperatureSensor"),
            Self::HumiditySensor => write!(f, "HumiditySensor"),
            Self::ContactSensor => write!(f, "ContactSensor"),
            Self::MotionSensor => write!(f, "MotionSensor"),
            Self::LockMechanism => write!(f, "LockMechanism"),
            Self::WindowCovering => write!(f, "WindowCovering"),
            Self::Television => write!(f, "Television"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// Characteristic type tag
///
/// Kept as a free-form name: the bridge only lists characteristics, it
/// never interprets them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacteristicType(pub String);

impl std::fmt::Display for CharacteristicType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CharacteristicType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque accessor for a characteristic's current value
#[async_trait]
pub trait CharacteristicValue: Send + Sync {
    /// Read the current value
    ///
    /// # Errors
    ///
    /// Returns error if the backing item cannot be read
    async fn read(&self) -> Result<serde_json::Value>;
}

/// Value held in memory, updated by whoever owns the accessory
#[derive(Debug, Default)]
pub struct StoredValue(RwLock<serde_json::Value>);

impl StoredValue {
    /// Create a stored value
    #[must_use]
    pub const fn new(value: serde_json::Value) -> Self {
        Self(RwLock::new(value))
    }

    /// Replace the value
    pub fn set(&self, value: serde_json::Value) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = value;
    }
}

#[async_trait]
impl CharacteristicValue for StoredValue {
    async fn read(&self) -> Result<serde_json::Value> {
        Ok(self.0.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// A single observable/controllable attribute of a service
#[derive(Clone)]
pub struct Characteristic {
    kind: CharacteristicType,
    value: Arc<dyn CharacteristicValue>,
}

impl Characteristic {
    /// Create a characteristic backed by an accessor
    pub fn new(kind: impl Into<CharacteristicType>, value: Arc<dyn CharacteristicValue>) -> Self {
        Self {
            kind: kind.into(),
            value,
        }
    }

    /// Create a characteristic holding a null in-memory value
    pub fn stored(kind: impl Into<CharacteristicType>) -> Self {
        Self::new(kind, Arc::new(StoredValue::default()))
    }

    #[must_use]
    pub const fn kind(&self) -> &CharacteristicType {
        &self.kind
    }

    /// The value accessor
    #[must_use]
    pub fn value(&self) -> &Arc<dyn CharacteristicValue> {
        &self.value
    }
}

impl std::fmt::Debug for Characteristic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Characteristic")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A functional grouping of characteristics
#[derive(Debug, Clone)]
pub struct Service {
    kind: ServiceType,
    characteristics: Vec<Characteristic>,
}

impl Service {
    /// Create a service; its characteristic set is fixed from here on
    #[must_use]
    pub const fn new(kind: ServiceType, characteristics: Vec<Characteristic>) -> Self {
        Self {
            kind,
            characteristics,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &ServiceType {
        &self.kind
    }

    #[must_use]
    pub fn characteristics(&self) -> &[Characteristic] {
        &self.characteristics
    }
}

/// A device published through the bridge
#[derive(Debug)]
pub struct Accessory {
    id: AccessoryId,
    name: AccessoryName,
    services: Vec<Service>,
}

impl Accessory {
    /// Create an accessory
    #[must_use]
    pub const fn new(id: AccessoryId, name: AccessoryName, services: Vec<Service>) -> Self {
        Self { id, name, services }
    }

    #[must_use]
    pub const fn id(&self) -> AccessoryId {
        self.id
    }

    /// The accessory's asynchronously resolved name
    #[must_use]
    pub const fn name(&self) -> &AccessoryName {
        &self.name
    }

    #[must_use]
    pub fn services(&self) -> &[Service] {
        &self.services
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_from_str() {
        assert_eq!(ServiceType::from_str("lightbulb"), ServiceType::Lightbulb);
        assert_eq!(ServiceType::from_str("Light"), ServiceType::Lightbulb);
        assert_eq!(
            ServiceType::from_str("temperature_sensor"),
            ServiceType::TemperatureSensor
        );
        assert_eq!(ServiceType::from_str("TV"), ServiceType::Television);
        assert_eq!(
            ServiceType::from_str("Irrigation"),
            ServiceType::Custom("Irrigation".to_string())
        );
    }

    #[test]
    fn test_service_type_display_round_trips_builtins() {
        for kind in [
            ServiceType::Lightbulb,
            ServiceType::WindowCovering,
            ServiceType::AccessoryInformation,
        ] {
            assert_eq!(ServiceType::from_str(&kind.to_string()), kind);
        }
    }

    #[tokio::test]
    async fn test_stored_value_changes_without_structure_change() {
        let value = Arc::new(StoredValue::new(serde_json::json!(false)));
        let service = Service::new(
            ServiceType::Switch,
            vec![Characteristic::new("On", value.clone())],
        );

        value.set(serde_json::json!(true));

        let read = service.characteristics()[0].value().read().await.unwrap();
        assert_eq!(read, serde_json::json!(true));
        assert_eq!(service.characteristics().len(), 1);
    }
}

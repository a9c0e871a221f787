//! TOML configuration file loading
//!
//! Supports `~/.config/homekit-bridge/config.toml` (or `HKBRIDGE_CONFIG`) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::accessory::{
    Accessory, AccessoryId, AccessoryName, Characteristic, Service, ServiceType,
};

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct BridgeConfigFile {
    /// Bridge/runtime configuration
    #[serde(default)]
    pub bridge: BridgeFileConfig,

    /// Statically declared accessories
    #[serde(default)]
    pub accessories: Vec<AccessoryFileConfig>,
}

/// Bridge/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct BridgeFileConfig {
    /// Display name advertised to controllers
    pub name: Option<String>,

    /// HAP server port
    pub port: Option<u16>,

    /// Directory holding the database and identity
    pub data_dir: Option<String>,

    /// Bounded wait per accessory name, in milliseconds
    pub name_timeout_ms: Option<u64>,

    /// Initial unauthenticated-access policy
    pub allow_unauthenticated: Option<bool>,

    /// Publish the bridge over mDNS
    pub advertise: Option<bool>,
}

/// A statically declared accessory
#[derive(Debug, Clone, Deserialize)]
pub struct AccessoryFileConfig {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub services: Vec<ServiceFileConfig>,
}

/// A service of a declared accessory
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceFileConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub characteristics: Vec<String>,
}

impl AccessoryFileConfig {
    /// Build the accessory tree, with in-memory characteristic values
    #[must_use]
    pub fn to_accessory(&self) -> Accessory {
        let services = self
            .services
            .iter()
            .map(|s| {
                Service::new(
                    ServiceType::from_str(&s.kind),
                    s.characteristics
                        .iter()
                        .map(|c| Characteristic::stored(c.as_str()))
                        .collect(),
                )
            })
            .collect();

        Accessory::new(
            AccessoryId(self.id),
            AccessoryName::fixed(self.name.clone()),
            services,
        )
    }
}

/// Load the TOML config file from `path`, or the standard path when `None`
///
/// Returns `BridgeConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> BridgeConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return BridgeConfigFile::default();
    };

    if !path.exists() {
        return BridgeConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                BridgeConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            BridgeConfigFile::default()
        }
    }
}

/// Parse config file contents
///
/// # Errors
///
/// Returns error if the TOML is invalid
pub fn parse(content: &str) -> crate::Result<BridgeConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Return the config file path: `~/.config/homekit-bridge/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("homekit-bridge").join("config.toml"))
}

//! Configuration management for the HomeKit bridge

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use crate::accessory::registry::DEFAULT_NAME_TIMEOUT;
use crate::{Error, Result};

pub use file::{AccessoryFileConfig, BridgeConfigFile};

/// Default bridge display name
pub const DEFAULT_BRIDGE_NAME: &str = "openHAB";

/// Default HAP server port
pub const DEFAULT_PORT: u16 = 9123;

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to data directory (database, identity)
    pub data_dir: PathBuf,

    /// Bridge display name
    pub bridge_name: String,

    /// HAP server port
    pub port: u16,

    /// Bounded wait for each accessory name when listing
    pub name_timeout: Duration,

    /// Initial unauthenticated-access policy (denied unless configured)
    pub allow_unauthenticated: bool,

    /// Publish the bridge over mDNS
    pub advertise: bool,

    /// Statically declared accessories
    pub accessories: Vec<AccessoryFileConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            bridge_name: DEFAULT_BRIDGE_NAME.to_string(),
            port: DEFAULT_PORT,
            name_timeout: DEFAULT_NAME_TIMEOUT,
            allow_unauthenticated: false,
            advertise: true,
            accessories: Vec::new(),
        }
    }
}

/// Default data directory: `~/.local/share/homekit-bridge/`
fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/homekit-bridge"),
        |d| d.data_dir().join("homekit-bridge"),
    )
}

fn parse_bool(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

impl Config {
    /// Load configuration (env > toml > default)
    ///
    /// # Errors
    ///
    /// Returns error if an environment override is malformed
    pub fn load() -> Result<Self> {
        let path = std::env::var("HKBRIDGE_CONFIG").ok().map(PathBuf::from);
        let fc = file::load_config_file(path.as_deref());
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns error if an environment override is malformed
    pub fn from_sources<F>(fc: BridgeConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let data_dir = env("HKBRIDGE_DATA_DIR")
            .or(fc.bridge.data_dir)
            .map_or(defaults.data_dir, PathBuf::from);

        let bridge_name = env("HKBRIDGE_NAME")
            .or(fc.bridge.name)
            .unwrap_or(defaults.bridge_name);

        let port = match env("HKBRIDGE_PORT") {
            Some(v) => v
                .parse()
                .map_err(|e| Error::Config(format!("invalid HKBRIDGE_PORT '{v}': {e}")))?,
            None => fc.bridge.port.unwrap_or(defaults.port),
        };

        let name_timeout = match env("HKBRIDGE_NAME_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(v.parse().map_err(|e| {
                Error::Config(format!("invalid HKBRIDGE_NAME_TIMEOUT_MS '{v}': {e}"))
            })?),
            None => fc
                .bridge
                .name_timeout_ms
                .map_or(defaults.name_timeout, Duration::from_millis),
        };
        if name_timeout.is_zero() {
            return Err(Error::Config("name timeout must be non-zero".to_string()));
        }

        let allow_unauthenticated = env("HKBRIDGE_ALLOW_UNAUTHENTICATED")
            .map(|v| parse_bool(&v))
            .or(fc.bridge.allow_unauthenticated)
            .unwrap_or(defaults.allow_unauthenticated);

        let advertise = env("HKBRIDGE_ADVERTISE")
            .map(|v| parse_bool(&v))
            .or(fc.bridge.advertise)
            .unwrap_or(defaults.advertise);

        if allow_unauthenticated {
            tracing::warn!("unauthenticated HomeKit access enabled by configuration");
        }

        Ok(Self {
            data_dir,
            bridge_name,
            port,
            name_timeout,
            allow_unauthenticated,
            advertise,
            accessories: fc.accessories,
        })
    }

    /// Path of the pairing database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("bridge.db")
    }

    /// Path of the bridge identity file
    #[must_use]
    pub fn identity_path(&self) -> PathBuf {
        self.data_dir.join("identity.json")
    }
}

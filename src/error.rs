//! Error types for the HomeKit bridge

use std::time::Duration;

use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the HomeKit bridge
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence backend unavailable or failed mid-operation
    #[error("storage failure: {0}")]
    Storage(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Accessory name did not resolve within the allotted wait
    #[error("name resolution for accessory {accessory} timed out after {after:?}")]
    ResolutionTimeout { accessory: String, after: Duration },

    /// Accessory name resolution completed with an error
    #[error("name resolution for accessory {accessory} failed: {reason}")]
    ResolutionFailed { accessory: String, reason: String },

    /// A required collaborator has not been bound yet
    #[error("dependency not ready: {0}")]
    DependencyNotReady(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// Authentication/identity error
    #[error("auth error: {0}")]
    Auth(String),

    /// mDNS advertisement error
    #[error("advertisement error: {0}")]
    Advertise(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

//! Bridge identity management using Ed25519 cryptography
//!
//! The bridge presents a single accessory long-term key to every controller.
//! The device id advertised over mDNS is derived from the public key, and the
//! setup code is what users type into their controller during pair-setup.
//! Clearing pairings never touches the identity, so controllers can re-pair
//! with the same bridge.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::Rng;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// Setup codes a controller rejects as too easy to guess
const FORBIDDEN_SETUP_CODES: &[&str] = &["123-45-678", "876-54-321"];

/// Bridge identity stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeIdentity {
    /// MAC-style device identifier (e.g. `3F:A2:0B:19:C4:7E`)
    pub device_id: String,

    /// Ed25519 public key (base64 encoded)
    pub public_key: String,

    /// Ed25519 private key (base64 encoded)
    #[serde(skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,

    /// Setup code in `XXX-XX-XXX` form
    pub setup_code: String,

    /// Bridge display name
    pub name: String,

    /// When the identity was created
    pub created_at: DateTime<Utc>,
}

impl BridgeIdentity {
    /// Generate a new bridge identity with a random keypair and setup code
    #[must_use]
    pub fn generate(name: &str) -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key_bytes = signing_key.verifying_key().to_bytes();

        Self {
            device_id: compute_device_id(&public_key_bytes),
            public_key: base64_encode(&public_key_bytes),
            secret_key: Some(base64_encode(signing_key.as_bytes())),
            setup_code: generate_setup_code(),
            name: name.to_string(),
            created_at: Utc::now(),
        }
    }

    /// Load identity from a file, or create a new one if it doesn't exist
    ///
    /// # Errors
    ///
    /// Returns error if file operations fail or JSON is invalid
    pub fn load_or_create(path: &Path, default_name: &str) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)?;
            let identity: Self = serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("invalid bridge identity: {e}")))?;
            tracing::debug!(device_id = %identity.device_id, "loaded bridge identity");
            return Ok(identity);
        }

        let identity = Self::generate(default_name);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&identity)?;
        fs::write(path, content)?;

        tracing::info!(device_id = %identity.device_id, "created new bridge identity");
        Ok(identity)
    }

    /// Get the default identity file path
    ///
    /// Returns `~/.local/share/homekit-bridge/identity.json`
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::BaseDirs::new().map_or_else(
            || PathBuf::from(".local/share/homekit-bridge/identity.json"),
            |d| d.data_dir().join("homekit-bridge").join("identity.json"),
        )
    }

    /// Sign a payload with the accessory long-term key
    ///
    /// # Errors
    ///
    /// Returns error if identity has no secret key
    pub fn sign(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let secret_key = self
            .secret_key
            .as_ref()
            .ok_or_else(|| Error::Auth("identity has no secret key".to_string()))?;

        let key_bytes = base64_decode(secret_key)?;
        let signing_key = SigningKey::try_from(key_bytes.as_slice())
            .map_err(|e| Error::Auth(format!("invalid secret key: {e}")))?;

        Ok(signing_key.sign(payload).to_bytes().to_vec())
    }

    /// Verify a signature against this identity's public key
    ///
    /// # Errors
    ///
    /// Returns error if the public key or signature is malformed
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool> {
        let public_key_bytes = base64_decode(&self.public_key)?;
        let verifying_key = VerifyingKey::try_from(public_key_bytes.as_slice())
            .map_err(|e| Error::Auth(format!("invalid public key: {e}")))?;
        let signature = Signature::from_slice(signature)
            .map_err(|e| Error::Auth(format!("invalid signature format: {e}")))?;

        Ok(verifying_key.verify(payload, &signature).is_ok())
    }

    /// Setup code without dashes, as used in setup payload URIs
    #[must_use]
    pub fn setup_digits(&self) -> String {
        self.setup_code.chars().filter(char::is_ascii_digit).collect()
    }
}

/// Derive a MAC-style device id from the first six bytes of SHA-256(public key)
fn compute_device_id(public_key: &[u8]) -> String {
    let hash = Sha256::digest(public_key);
    hash[..6]
        .iter()
        .map(|b| hex::encode_upper([*b]))
        .collect::<Vec<_>>()
        .join(":")
}

/// Generate a random 8-digit setup code, skipping trivial ones
fn generate_setup_code() -> String {
    let mut rng = OsRng;
    loop {
        let digits: Vec<u8> = (0..8).map(|_| rng.gen_range(0..10)).collect();
        let code = format!(
            "{}{}{}-{}{}-{}{}{}",
            digits[0], digits[1], digits[2], digits[3], digits[4], digits[5], digits[6], digits[7]
        );
        if is_valid_setup_code(&code) {
            return code;
        }
    }
}

/// Check a setup code against the format and the forbidden list
#[must_use]
pub fn is_valid_setup_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    let well_formed = bytes.len() == 10
        && bytes[3] == b'-'
        && bytes[6] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 3 || i == 6 || b.is_ascii_digit());
    if !well_formed {
        return false;
    }

    let first = bytes[0];
    let all_same = bytes.iter().filter(|b| b.is_ascii_digit()).all(|b| *b == first);

    !all_same && !FORBIDDEN_SETUP_CODES.contains(&code)
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn base64_decode(data: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .map_err(|e| Error::Auth(format!("invalid base64: {e}")))
}

//! Controller pairing persistence
//!
//! A pairing record proves that a controller completed the pair-setup
//! handshake. Records are keyed by controller identity; there is never more
//! than one record per controller.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};

use crate::db::{DbConn, DbPool};
use crate::{Error, Result};

/// Length of a controller long-term public key
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// A paired controller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingRecord {
    /// Controller pairing identifier
    pub controller_id: String,

    /// Ed25519 long-term public key of the controller
    pub public_key: [u8; PUBLIC_KEY_LENGTH],

    /// Whether the controller may manage other pairings
    pub admin: bool,

    /// When the pairing was stored
    pub paired_at: DateTime<Utc>,
}

impl PairingRecord {
    /// Create a record for a controller that just finished pair-setup
    #[must_use]
    pub fn new(controller_id: &str, public_key: [u8; PUBLIC_KEY_LENGTH], admin: bool) -> Self {
        Self {
            controller_id: controller_id.to_string(),
            public_key,
            admin,
            paired_at: Utc::now(),
        }
    }

    /// Verify a controller signature against the stored long-term key
    ///
    /// # Errors
    ///
    /// Returns error if the stored key or the signature is malformed
    pub fn verify(&self, payload: &[u8], signature: &[u8]) -> Result<bool> {
        let verifying_key = VerifyingKey::from_bytes(&self.public_key)
            .map_err(|e| Error::Auth(format!("invalid controller key: {e}")))?;
        let signature = Signature::from_slice(signature)
            .map_err(|e| Error::Auth(format!("invalid signature format: {e}")))?;

        Ok(verifying_key.verify(payload, &signature).is_ok())
    }
}

/// Keyed persistence for controller pairings
///
/// Implementations must make `clear_all` a single observable step: readers
/// see either every record or none, never a partially cleared store. Writes
/// (`put`, `delete`, `clear_all`) are mutually exclusive.
pub trait PairingStore: Send + Sync {
    /// Look up the pairing for a controller
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend is unavailable
    fn get(&self, controller_id: &str) -> Result<Option<PairingRecord>>;

    /// Store a pairing, replacing any existing record for the same controller
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend is unavailable
    fn put(&self, record: &PairingRecord) -> Result<()>;

    /// Remove the pairing for a controller, returning whether one existed
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend is unavailable
    fn delete(&self, controller_id: &str) -> Result<bool>;

    /// Remove every pairing, returning how many were removed
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend is unavailable; the store is
    /// left untouched in that case
    fn clear_all(&self) -> Result<usize>;

    /// List all pairings, oldest first
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend is unavailable
    fn list(&self) -> Result<Vec<PairingRecord>>;

    /// Whether at least one controller is paired
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the backend is unavailable
    fn has_pairings(&self) -> Result<bool> {
        Ok(!self.list()?.is_empty())
    }
}

type Snapshot = Arc<HashMap<String, PairingRecord>>;

/// Table contents as of a write generation
struct Cached {
    generation: i64,
    records: Snapshot,
}

/// `SQLite`-backed pairing store with a read cache
///
/// The cache holds a full snapshot of the table tagged with the database's
/// write generation, which triggers bump on every row change. Each read
/// checks the generation first, so writes made through another store or
/// process on the same file are seen immediately. Every write runs in one
/// immediate transaction under the write lock.
pub struct SqlitePairingStore {
    pool: DbPool,
    write_lock: Mutex<()>,
    cache: RwLock<Option<Cached>>,
}

impl SqlitePairingStore {
    /// Create a new pairing store
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            write_lock: Mutex::new(()),
            cache: RwLock::new(None),
        }
    }

    fn conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| Error::Storage(e.to_string()))
    }

    fn cached_at(&self, generation: i64) -> Option<Snapshot> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .filter(|c| c.generation == generation)
            .map(|c| Arc::clone(&c.records))
    }

    fn invalidate(&self) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Current table contents, from the cache when it is still current
    ///
    /// A reload runs under the write lock, taken before a connection, the
    /// same order writers use.
    fn snapshot(&self) -> Result<Snapshot> {
        {
            let conn = self.conn()?;
            if let Some(snapshot) = self.cached_at(generation(&conn)?) {
                return Ok(snapshot);
            }
        }

        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut conn = self.conn()?;

        let tx = conn.transaction().map_err(storage)?;
        let current = generation(&tx)?;
        if let Some(snapshot) = self.cached_at(current) {
            return Ok(snapshot);
        }
        let records = load_all(&tx)?;
        tx.commit().map_err(storage)?;

        let snapshot: Snapshot = Arc::new(
            records
                .into_iter()
                .map(|r| (r.controller_id.clone(), r))
                .collect(),
        );
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Cached {
            generation: current,
            records: Arc::clone(&snapshot),
        });

        Ok(snapshot)
    }
}

impl PairingStore for SqlitePairingStore {
    fn get(&self, controller_id: &str) -> Result<Option<PairingRecord>> {
        Ok(self.snapshot()?.get(controller_id).cloned())
    }

    fn put(&self, record: &PairingRecord) -> Result<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut conn = self.conn()?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;
        tx.execute(
            "INSERT INTO pairings (controller_id, public_key, admin, paired_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(controller_id) DO UPDATE SET
                public_key = excluded.public_key,
                admin = excluded.admin,
                paired_at = excluded.paired_at",
            rusqlite::params![
                record.controller_id,
                base64_encode(&record.public_key),
                record.admin,
                record.paired_at.to_rfc3339(),
            ],
        )
        .map_err(storage)?;
        tx.commit().map_err(storage)?;
        self.invalidate();

        tracing::info!(
            controller_id = %record.controller_id,
            admin = record.admin,
            "pairing stored"
        );
        Ok(())
    }

    fn delete(&self, controller_id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut conn = self.conn()?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;
        let removed = tx
            .execute("DELETE FROM pairings WHERE controller_id = ?1", [controller_id])
            .map_err(storage)?;
        tx.commit().map_err(storage)?;
        self.invalidate();

        if removed > 0 {
            tracing::info!(controller_id, "pairing removed");
        }
        Ok(removed > 0)
    }

    fn clear_all(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut conn = self.conn()?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(storage)?;
        let removed = tx.execute("DELETE FROM pairings", []).map_err(storage)?;
        tx.commit().map_err(storage)?;
        self.invalidate();

        tracing::info!(removed, "cleared all pairings");
        Ok(removed)
    }

    fn list(&self) -> Result<Vec<PairingRecord>> {
        let mut records: Vec<_> = self.snapshot()?.values().cloned().collect();
        records.sort_by(|a, b| {
            a.paired_at
                .cmp(&b.paired_at)
                .then_with(|| a.controller_id.cmp(&b.controller_id))
        });
        Ok(records)
    }

    fn has_pairings(&self) -> Result<bool> {
        Ok(!self.snapshot()?.is_empty())
    }
}

fn generation(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT generation FROM pairings_generation", [], |row| row.get(0))
        .map_err(storage)
}

fn load_all(conn: &Connection) -> Result<Vec<PairingRecord>> {
    let mut stmt = conn
        .prepare("SELECT controller_id, public_key, admin, paired_at FROM pairings")
        .map_err(storage)?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, bool>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(storage)?;

    let mut records = Vec::new();
    for row in rows {
        let (controller_id, key, admin, raw_paired_at) = row.map_err(storage)?;
        let Some(public_key) = decode_key(&key) else {
            tracing::warn!(controller_id, "skipping pairing with malformed public key");
            continue;
        };
        let paired_at = parse_datetime(&raw_paired_at).unwrap_or_else(|| {
            tracing::warn!(
                controller_id,
                paired_at = raw_paired_at,
                "malformed pairing timestamp, using now"
            );
            Utc::now()
        });
        records.push(PairingRecord {
            controller_id,
            public_key,
            admin,
            paired_at,
        });
    }

    Ok(records)
}

#[allow(clippy::needless_pass_by_value)]
fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn decode_key(data: &str) -> Option<[u8; PUBLIC_KEY_LENGTH]> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(data)
        .ok()
        .and_then(|bytes| bytes.try_into().ok())
}

fn base64_encode(data: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(data)
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

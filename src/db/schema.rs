//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 3;

/// Initialize the database schema
///
/// Each migration commits together with its `user_version` bump.
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &mut Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate(conn, MIGRATE_V1)?;
        tracing::info!("migrated to schema v1 (controller pairings)");
    }
    if version < 2 {
        migrate(conn, MIGRATE_V2)?;
        tracing::info!("migrated to schema v2 (controller permissions)");
    }
    if version < 3 {
        migrate(conn, MIGRATE_V3)?;
        tracing::info!("migrated to schema v3 (pairing write generation)");
    }

    Ok(())
}

fn migrate(conn: &mut Connection, sql: &str) -> Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(sql)?;
    tx.commit()?;
    Ok(())
}

const MIGRATE_V1: &str = r"
    -- Controller pairings, one row per controller identity
    CREATE TABLE IF NOT EXISTS pairings (
        controller_id TEXT PRIMARY KEY,
        public_key TEXT NOT NULL,
        paired_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_pairings_paired_at ON pairings(paired_at);

    PRAGMA user_version = 1;
";

const MIGRATE_V2: &str = r"
    -- Admin controllers may add and remove other pairings
    ALTER TABLE pairings ADD COLUMN admin INTEGER NOT NULL DEFAULT 0;

    PRAGMA user_version = 2;
";

const MIGRATE_V3: &str = r"
    -- Bumped on every pairing row change, from any connection
    CREATE TABLE IF NOT EXISTS pairings_generation (
        id INTEGER PRIMARY KEY CHECK (id = 0),
        generation INTEGER NOT NULL
    );

    INSERT OR IGNORE INTO pairings_generation (id, generation) VALUES (0, 0);

    CREATE TRIGGER IF NOT EXISTS pairings_bump_insert AFTER INSERT ON pairings
    BEGIN UPDATE pairings_generation SET generation = generation + 1; END;

    CREATE TRIGGER IF NOT EXISTS pairings_bump_update AFTER UPDATE ON pairings
    BEGIN UPDATE pairings_generation SET generation = generation + 1; END;

    CREATE TRIGGER IF NOT EXISTS pairings_bump_delete AFTER DELETE ON pairings
    BEGIN UPDATE pairings_generation SET generation = generation + 1; END;

    PRAGMA user_version = 3;
";

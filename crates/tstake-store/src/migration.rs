//! Database schema migrations for SQLite.
//!
//! Versioned migrations: each version transforms the schema from N-1 to N.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 1;

/// Initialize or migrate the database schema.
///
/// Idempotent; safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {} is newer than supported version {}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_secs()],
            )?;
        }

        tx.commit()?;
        tracing::debug!(from = current, to = CURRENT_VERSION, "migrated ledger schema");
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: Initial schema.
///
/// Amounts are 16-byte big-endian BLOBs; addresses are 20-byte BLOBs.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- Single row: governance parameters and treasury
        CREATE TABLE ledger_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            governance BLOB NOT NULL,
            min_t_stake_amount BLOB NOT NULL,
            authorization_ceiling INTEGER NOT NULL,
            min_stake_time INTEGER NOT NULL,
            treasury_balance BLOB NOT NULL,
            notification_reward BLOB NOT NULL,
            slashing_processed INTEGER NOT NULL
        );

        CREATE TABLE providers (
            provider BLOB PRIMARY KEY,
            owner BLOB NOT NULL,
            beneficiary BLOB NOT NULL,
            authorizer BLOB NOT NULL,
            t_stake BLOB NOT NULL,
            keep_in_t_stake BLOB NOT NULL,
            nu_in_t_stake BLOB NOT NULL,
            start_staking_timestamp INTEGER NOT NULL
        );

        CREATE TABLE applications (
            application BLOB PRIMARY KEY,
            status INTEGER NOT NULL,            -- 0=unapproved, 1=approved, 2=paused, 3=disabled
            panic_button BLOB,
            list_index INTEGER UNIQUE           -- position in the enumeration list, if listed
        );

        CREATE TABLE authorizations (
            provider BLOB NOT NULL,
            application BLOB NOT NULL,
            list_index INTEGER NOT NULL,        -- position in the provider's authorized list
            authorized BLOB NOT NULL,
            pending_amount BLOB,
            pending_requested_at INTEGER,
            PRIMARY KEY (provider, application),
            UNIQUE (provider, list_index)
        );

        CREATE TABLE slashing_queue (
            position INTEGER PRIMARY KEY,       -- 0 is the head
            provider BLOB NOT NULL,
            application BLOB NOT NULL,
            amount BLOB NOT NULL,
            notifier BLOB,
            reward_multiplier INTEGER NOT NULL
        );

        CREATE TABLE checkpoints (
            version INTEGER PRIMARY KEY AUTOINCREMENT,
            state_hash BLOB NOT NULL,
            saved_at INTEGER NOT NULL
        );
        "#,
    )?;

    Ok(())
}

fn now_secs() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "ledger_meta",
            "providers",
            "applications",
            "authorizations",
            "slashing_queue",
            "checkpoints",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}

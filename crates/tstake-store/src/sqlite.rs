//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking. The ledger is stored
//! relationally, one table per registry, and rewritten in a single
//! transaction on every save.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use tstake_core::{
    Address, Amount, ApplicationInfo, ApplicationRegistry, ApplicationStatus, Authorization,
    AuthorizationLedger, LedgerState, NotifierTreasury, Parameters, PendingDecrease, Roles,
    SlashingEvent, SlashingQueue, StakeRegistry, StakingProvider, StateHash, Timestamp,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{verify, Checkpoint, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` on the connection from the blocking pool.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(format!("spawn_blocking failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Column helpers
// ─────────────────────────────────────────────────────────────────────────────

fn blob_error(column: &str) -> rusqlite::Error {
    rusqlite::Error::InvalidColumnType(0, column.into(), rusqlite::types::Type::Blob)
}

fn amount_bytes(amount: Amount) -> [u8; 16] {
    amount.to_be_bytes()
}

fn get_amount(row: &Row<'_>, column: &str) -> rusqlite::Result<Amount> {
    let bytes: Vec<u8> = row.get(column)?;
    let arr: [u8; 16] = bytes.as_slice().try_into().map_err(|_| blob_error(column))?;
    Ok(Amount::from_be_bytes(arr))
}

fn get_opt_amount(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Amount>> {
    let bytes: Option<Vec<u8>> = row.get(column)?;
    bytes
        .map(|b| {
            let arr: [u8; 16] = b.as_slice().try_into().map_err(|_| blob_error(column))?;
            Ok(Amount::from_be_bytes(arr))
        })
        .transpose()
}

fn get_address(row: &Row<'_>, column: &str) -> rusqlite::Result<Address> {
    let bytes: Vec<u8> = row.get(column)?;
    Address::try_from(bytes.as_slice()).map_err(|_| blob_error(column))
}

fn get_opt_address(row: &Row<'_>, column: &str) -> rusqlite::Result<Option<Address>> {
    let bytes: Option<Vec<u8>> = row.get(column)?;
    bytes
        .map(|b| Address::try_from(b.as_slice()).map_err(|_| blob_error(column)))
        .transpose()
}

fn row_to_checkpoint(row: &Row<'_>) -> rusqlite::Result<Checkpoint> {
    let hash: Vec<u8> = row.get("state_hash")?;
    let hash: [u8; 32] = hash.as_slice().try_into().map_err(|_| blob_error("state_hash"))?;
    Ok(Checkpoint {
        version: row.get::<_, i64>("version")? as u64,
        state_hash: StateHash(hash),
        saved_at: row.get::<_, i64>("saved_at")? as Timestamp,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Writing
// ─────────────────────────────────────────────────────────────────────────────

fn write_state(tx: &Transaction<'_>, state: &LedgerState) -> Result<()> {
    tx.execute_batch(
        "DELETE FROM ledger_meta;
         DELETE FROM providers;
         DELETE FROM applications;
         DELETE FROM authorizations;
         DELETE FROM slashing_queue;",
    )?;

    tx.execute(
        "INSERT INTO ledger_meta (
            id, governance, min_t_stake_amount, authorization_ceiling, min_stake_time,
            treasury_balance, notification_reward, slashing_processed
        ) VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            state.params.governance.as_bytes().as_slice(),
            amount_bytes(state.params.min_t_stake_amount).as_slice(),
            state.params.authorization_ceiling as i64,
            state.params.min_stake_time as i64,
            amount_bytes(state.treasury.balance()).as_slice(),
            amount_bytes(state.treasury.notification_reward()).as_slice(),
            state.slashing.processed() as i64,
        ],
    )?;

    {
        let mut stmt = tx.prepare(
            "INSERT INTO providers (
                provider, owner, beneficiary, authorizer,
                t_stake, keep_in_t_stake, nu_in_t_stake, start_staking_timestamp
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (provider, record) in state.stakes.iter() {
            stmt.execute(params![
                provider.as_bytes().as_slice(),
                record.roles.owner.as_bytes().as_slice(),
                record.roles.beneficiary.as_bytes().as_slice(),
                record.roles.authorizer.as_bytes().as_slice(),
                amount_bytes(record.t_stake).as_slice(),
                amount_bytes(record.keep_in_t_stake).as_slice(),
                amount_bytes(record.nu_in_t_stake).as_slice(),
                record.start_staking_timestamp as i64,
            ])?;
        }
    }

    {
        let positions: HashMap<Address, usize> = state
            .applications
            .listed()
            .enumerate()
            .map(|(index, app)| (*app, index))
            .collect();
        let mut stmt = tx.prepare(
            "INSERT INTO applications (application, status, panic_button, list_index)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (application, info) in state.applications.iter() {
            stmt.execute(params![
                application.as_bytes().as_slice(),
                info.status.as_u8(),
                info.panic_button.as_ref().map(|a| a.as_bytes().as_slice()),
                positions.get(application).map(|i| *i as i64),
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO authorizations (
                provider, application, list_index, authorized,
                pending_amount, pending_requested_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (provider, application, index, auth) in state.authorizations.iter() {
            stmt.execute(params![
                provider.as_bytes().as_slice(),
                application.as_bytes().as_slice(),
                index as i64,
                amount_bytes(auth.authorized).as_slice(),
                auth.pending.map(|p| amount_bytes(p.amount).to_vec()),
                auth.pending.map(|p| p.requested_at as i64),
            ])?;
        }
    }

    {
        let mut stmt = tx.prepare(
            "INSERT INTO slashing_queue (
                position, provider, application, amount, notifier, reward_multiplier
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (position, event) in state.slashing.iter().enumerate() {
            stmt.execute(params![
                position as i64,
                event.provider.as_bytes().as_slice(),
                event.application.as_bytes().as_slice(),
                amount_bytes(event.amount).as_slice(),
                event.notifier.as_ref().map(|a| a.as_bytes().as_slice()),
                event.reward_multiplier,
            ])?;
        }
    }

    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Reading
// ─────────────────────────────────────────────────────────────────────────────

struct Meta {
    params: Parameters,
    treasury: NotifierTreasury,
    slashing_processed: u64,
}

fn read_meta(conn: &Connection) -> Result<Option<Meta>> {
    conn.query_row(
        "SELECT governance, min_t_stake_amount, authorization_ceiling, min_stake_time,
                treasury_balance, notification_reward, slashing_processed
         FROM ledger_meta WHERE id = 1",
        [],
        |row| {
            Ok(Meta {
                params: Parameters {
                    governance: get_address(row, "governance")?,
                    min_t_stake_amount: get_amount(row, "min_t_stake_amount")?,
                    authorization_ceiling: row.get::<_, i64>("authorization_ceiling")? as usize,
                    min_stake_time: row.get::<_, i64>("min_stake_time")? as u64,
                },
                treasury: NotifierTreasury::restore(
                    get_amount(row, "treasury_balance")?,
                    get_amount(row, "notification_reward")?,
                ),
                slashing_processed: row.get::<_, i64>("slashing_processed")? as u64,
            })
        },
    )
    .optional()
    .map_err(StoreError::from)
}

fn read_stakes(conn: &Connection) -> Result<StakeRegistry> {
    let mut stmt = conn.prepare(
        "SELECT provider, owner, beneficiary, authorizer,
                t_stake, keep_in_t_stake, nu_in_t_stake, start_staking_timestamp
         FROM providers",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let provider = get_address(row, "provider")?;
            let record = StakingProvider {
                roles: Roles::new(
                    get_address(row, "owner")?,
                    get_address(row, "beneficiary")?,
                    get_address(row, "authorizer")?,
                ),
                t_stake: get_amount(row, "t_stake")?,
                keep_in_t_stake: get_amount(row, "keep_in_t_stake")?,
                nu_in_t_stake: get_amount(row, "nu_in_t_stake")?,
                start_staking_timestamp: row.get::<_, i64>("start_staking_timestamp")? as Timestamp,
            };
            Ok((provider, record))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stakes = StakeRegistry::new();
    for (provider, record) in rows {
        stakes.insert(provider, record);
    }
    Ok(stakes)
}

fn read_applications(conn: &Connection) -> Result<ApplicationRegistry> {
    let mut stmt = conn.prepare(
        "SELECT application, status, panic_button, list_index FROM applications",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                get_address(row, "application")?,
                row.get::<_, u8>("status")?,
                get_opt_address(row, "panic_button")?,
                row.get::<_, Option<i64>>("list_index")?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut infos = Vec::with_capacity(rows.len());
    let mut listed = Vec::new();
    for (application, status, panic_button, list_index) in rows {
        let status = ApplicationStatus::from_u8(status)
            .ok_or_else(|| StoreError::InvalidData(format!("unknown application status {}", status)))?;
        infos.push((application, ApplicationInfo { status, panic_button }));
        if let Some(index) = list_index {
            listed.push((index, application));
        }
    }
    listed.sort_unstable_by_key(|(index, _)| *index);

    Ok(ApplicationRegistry::restore(
        infos,
        listed.into_iter().map(|(_, app)| app),
    ))
}

fn read_authorizations(conn: &Connection) -> Result<AuthorizationLedger> {
    let mut stmt = conn.prepare(
        "SELECT provider, application, authorized, pending_amount, pending_requested_at
         FROM authorizations ORDER BY provider, list_index",
    )?;
    let rows = stmt
        .query_map([], |row| {
            let pending_amount = get_opt_amount(row, "pending_amount")?;
            let requested_at: Option<i64> = row.get("pending_requested_at")?;
            let pending = pending_amount.map(|amount| PendingDecrease {
                amount,
                requested_at: requested_at.unwrap_or(0) as Timestamp,
            });
            Ok((
                get_address(row, "provider")?,
                get_address(row, "application")?,
                Authorization {
                    authorized: get_amount(row, "authorized")?,
                    pending,
                },
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(AuthorizationLedger::restore(rows))
}

fn read_slashing(conn: &Connection, processed: u64) -> Result<SlashingQueue> {
    let mut stmt = conn.prepare(
        "SELECT provider, application, amount, notifier, reward_multiplier
         FROM slashing_queue ORDER BY position",
    )?;
    let events = stmt
        .query_map([], |row| {
            Ok(SlashingEvent {
                provider: get_address(row, "provider")?,
                amount: get_amount(row, "amount")?,
                application: get_address(row, "application")?,
                notifier: get_opt_address(row, "notifier")?,
                reward_multiplier: row.get("reward_multiplier")?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(SlashingQueue::restore(events, processed))
}

fn read_state(conn: &Connection) -> Result<Option<LedgerState>> {
    let Some(meta) = read_meta(conn)? else {
        return Ok(None);
    };
    Ok(Some(LedgerState {
        params: meta.params,
        stakes: read_stakes(conn)?,
        applications: read_applications(conn)?,
        authorizations: read_authorizations(conn)?,
        slashing: read_slashing(conn, meta.slashing_processed)?,
        treasury: meta.treasury,
    }))
}

fn read_latest_checkpoint(conn: &Connection) -> Result<Option<Checkpoint>> {
    conn.query_row(
        "SELECT version, state_hash, saved_at FROM checkpoints ORDER BY version DESC LIMIT 1",
        [],
        row_to_checkpoint,
    )
    .optional()
    .map_err(StoreError::from)
}

#[async_trait]
impl Store for SqliteStore {
    async fn save_state(&self, state: &LedgerState, saved_at: Timestamp) -> Result<Checkpoint> {
        let state_hash = state.state_hash()?;
        let state = state.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;
            write_state(&tx, &state)?;
            tx.execute(
                "INSERT INTO checkpoints (state_hash, saved_at) VALUES (?1, ?2)",
                params![state_hash.0.as_slice(), saved_at as i64],
            )?;
            let version = tx.last_insert_rowid() as u64;
            tx.commit()?;

            tracing::debug!(version, hash = %state_hash, "saved ledger checkpoint");
            Ok(Checkpoint {
                version,
                state_hash,
                saved_at,
            })
        })
        .await
    }

    async fn load_state(&self) -> Result<Option<LedgerState>> {
        self.run(|conn| {
            let Some(state) = read_state(conn)? else {
                return Ok(None);
            };
            let checkpoint = read_latest_checkpoint(conn)?.ok_or_else(|| {
                StoreError::InvalidData("ledger rows present without a checkpoint".into())
            })?;
            verify(&state, &checkpoint)?;
            Ok(Some(state))
        })
        .await
    }

    async fn latest_checkpoint(&self) -> Result<Option<Checkpoint>> {
        self.run(|conn| read_latest_checkpoint(conn)).await
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT version, state_hash, saved_at FROM checkpoints ORDER BY version")?;
            let checkpoints = stmt
                .query_map([], row_to_checkpoint)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(checkpoints)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Parties {
        governance: Address,
        owner: Address,
        provider: Address,
        authorizer: Address,
        app: Address,
        notifier: Address,
    }

    fn parties() -> Parties {
        Parties {
            governance: Address::derive("governance"),
            owner: Address::derive("owner"),
            provider: Address::derive("provider"),
            authorizer: Address::derive("authorizer"),
            app: Address::derive("application"),
            notifier: Address::derive("notifier"),
        }
    }

    /// A state touching every table.
    fn busy_state() -> LedgerState {
        let p = parties();
        let mut state = LedgerState::new(Parameters::new(p.governance));
        state.set_authorization_ceiling(&p.governance, 3).unwrap();
        state.set_notification_reward(&p.governance, 10).unwrap();
        state.push_notification_reward(1_000).unwrap();
        state
            .stake(&p.owner, p.provider, Address::derive("beneficiary"), p.authorizer, 500, 42)
            .unwrap();
        state.approve_application(&p.governance, p.app).unwrap();
        state
            .set_panic_button(&p.governance, p.app, Address::derive("panic"))
            .unwrap();
        state
            .disable_application(&p.governance, Address::derive("never-approved"))
            .unwrap();
        state
            .increase_authorization(&p.authorizer, p.provider, p.app, 300)
            .unwrap();
        state
            .request_authorization_decrease(&p.authorizer, p.provider, p.app, 100, 77)
            .unwrap();
        state.seize(&p.app, 50, 20, p.notifier, &[p.provider]).unwrap();
        state.slash(&p.app, 10, &[p.provider]).unwrap();
        state.process_slashing(1).unwrap();
        state
    }

    #[tokio::test]
    async fn test_roundtrip_all_tables() {
        let store = SqliteStore::open_memory().unwrap();
        let state = busy_state();

        let checkpoint = store.save_state(&state, 1_000).await.unwrap();
        assert_eq!(checkpoint.version, 1);
        assert_eq!(checkpoint.state_hash, state.state_hash().unwrap());

        let loaded = store.load_state().await.unwrap().unwrap();
        assert_eq!(loaded, state);
        assert_eq!(loaded.slashing.len(), 1);
        assert_eq!(loaded.slashing.processed(), 1);
    }

    #[tokio::test]
    async fn test_empty_database() {
        let store = SqliteStore::open_memory().unwrap();
        assert!(store.load_state().await.unwrap().is_none());
        assert!(store.latest_checkpoint().await.unwrap().is_none());
        assert!(store.list_checkpoints().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_previous_state() {
        let p = parties();
        let store = SqliteStore::open_memory().unwrap();
        let mut state = busy_state();
        store.save_state(&state, 1).await.unwrap();

        state
            .approve_authorization_decrease(&p.app, p.provider)
            .unwrap();
        state.process_slashing(10).unwrap();
        let second = store.save_state(&state, 2).await.unwrap();

        assert_eq!(store.load_state().await.unwrap(), Some(state));
        assert_eq!(store.latest_checkpoint().await.unwrap(), Some(second));
        assert_eq!(store.list_checkpoints().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_tampered_row_fails_integrity() {
        let p = parties();
        let store = SqliteStore::open_memory().unwrap();
        store.save_state(&busy_state(), 1).await.unwrap();

        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE providers SET t_stake = ?1 WHERE provider = ?2",
                params![amount_bytes(1).as_slice(), p.provider.as_bytes().as_slice()],
            )
            .unwrap();
        }

        assert!(matches!(
            store.load_state().await,
            Err(StoreError::Integrity { .. })
        ));
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let state = busy_state();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_state(&state, 5).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.load_state().await.unwrap(), Some(state));
        assert_eq!(store.latest_checkpoint().await.unwrap().map(|c| c.saved_at), Some(5));
    }
}

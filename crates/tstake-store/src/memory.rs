//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It keeps the canonical encoding of the
//! latest state, so loads go through the same decode-and-verify path as
//! SQLite.

use std::sync::RwLock;

use async_trait::async_trait;
use tstake_core::{LedgerState, StateHash, Timestamp};

use crate::error::{Result, StoreError};
use crate::traits::{verify, Checkpoint, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Canonical bytes of the latest state.
    latest: Option<Vec<u8>>,

    /// Checkpoints, oldest first.
    checkpoints: Vec<Checkpoint>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    /// Overwrite the stored bytes without touching checkpoints.
    #[cfg(test)]
    fn corrupt(&self, bytes: Vec<u8>) {
        if let Ok(mut inner) = self.inner.write() {
            inner.latest = Some(bytes);
        }
    }

    fn poisoned() -> StoreError {
        StoreError::InvalidData("memory store lock poisoned".into())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_state(&self, state: &LedgerState, saved_at: Timestamp) -> Result<Checkpoint> {
        let bytes = state.canonical_bytes()?;
        let state_hash = StateHash::hash(&bytes);

        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let checkpoint = Checkpoint {
            version: inner.checkpoints.len() as u64 + 1,
            state_hash,
            saved_at,
        };
        inner.latest = Some(bytes);
        inner.checkpoints.push(checkpoint);
        Ok(checkpoint)
    }

    async fn load_state(&self) -> Result<Option<LedgerState>> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        let (Some(bytes), Some(checkpoint)) = (&inner.latest, inner.checkpoints.last()) else {
            return Ok(None);
        };
        let state = LedgerState::from_canonical_bytes(bytes)?;
        verify(&state, checkpoint)?;
        Ok(Some(state))
    }

    async fn latest_checkpoint(&self) -> Result<Option<Checkpoint>> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.checkpoints.last().copied())
    }

    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.checkpoints.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tstake_core::{Address, Parameters};

    fn sample_state() -> LedgerState {
        let governance = Address::derive("governance");
        let mut state = LedgerState::new(Parameters::new(governance));
        state
            .stake(
                &Address::derive("owner"),
                Address::derive("provider"),
                Address::derive("beneficiary"),
                Address::derive("authorizer"),
                500,
                10,
            )
            .unwrap();
        state
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryStore::new();
        assert!(store.load_state().await.unwrap().is_none());
        assert!(store.latest_checkpoint().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = MemoryStore::new();
        let state = sample_state();

        let first = store.save_state(&state, 100).await.unwrap();
        let second = store.save_state(&state, 200).await.unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert_eq!(first.state_hash, second.state_hash);

        assert_eq!(store.load_state().await.unwrap(), Some(state));
        assert_eq!(store.list_checkpoints().await.unwrap(), vec![first, second]);
    }

    #[tokio::test]
    async fn test_tampered_state_fails_integrity() {
        let store = MemoryStore::new();
        store.save_state(&sample_state(), 100).await.unwrap();

        let other = LedgerState::new(Parameters::new(Address::derive("governance")));
        store.corrupt(other.canonical_bytes().unwrap());

        assert!(matches!(
            store.load_state().await,
            Err(StoreError::Integrity { .. })
        ));
    }
}

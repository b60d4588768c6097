//! Store trait: the abstract interface for ledger persistence.
//!
//! The engine saves whole-ledger checkpoints. Implementations include SQLite
//! (primary) and in-memory (for tests).

use async_trait::async_trait;
use tstake_core::{LedgerState, StateHash, Timestamp};

use crate::error::{Result, StoreError};

/// Metadata recorded with every saved state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    /// Monotonic save counter, starting at 1.
    pub version: u64,
    /// Blake3 of the canonical state encoding.
    pub state_hash: StateHash,
    /// When the state was saved (unix seconds).
    pub saved_at: Timestamp,
}

/// The Store trait: async interface for ledger persistence.
///
/// # Design Notes
///
/// - **Latest wins**: `load_state` returns the most recently saved state.
/// - **Verified loads**: the loaded state is hashed and compared with the
///   latest checkpoint; a mismatch is `StoreError::Integrity`.
/// - **History**: every save appends a checkpoint, even if the state is
///   unchanged.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist `state`, replacing the previous one.
    async fn save_state(&self, state: &LedgerState, saved_at: Timestamp) -> Result<Checkpoint>;

    /// Load the latest saved state, if any.
    async fn load_state(&self) -> Result<Option<LedgerState>>;

    /// The latest checkpoint, if any.
    async fn latest_checkpoint(&self) -> Result<Option<Checkpoint>>;

    /// All checkpoints, oldest first.
    async fn list_checkpoints(&self) -> Result<Vec<Checkpoint>>;
}

/// Compare a loaded state with the checkpoint it was saved under.
pub(crate) fn verify(state: &LedgerState, checkpoint: &Checkpoint) -> Result<()> {
    let actual = state.state_hash()?;
    if actual != checkpoint.state_hash {
        return Err(StoreError::Integrity {
            expected: checkpoint.state_hash,
            actual,
        });
    }
    Ok(())
}

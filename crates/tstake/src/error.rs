//! Error types for the staking engine.

use thiserror::Error;
use tstake_core::{Address, CodecError, StakingError};
use tstake_store::StoreError;

use crate::collaborator::{ApplicationError, TokenError};

/// Errors that can occur during engine operations.
///
/// Every error leaves the ledger exactly as it was before the call.
#[derive(Debug, Error)]
pub enum StakingEngineError {
    /// A ledger rule was violated.
    #[error("staking error: {0}")]
    Staking(#[from] StakingError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// A token transfer failed.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// State encoding error.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// An application refused a change it must accept for it to happen.
    #[error("application {application} rejected the call: {reason}")]
    ApplicationRejected {
        application: Address,
        reason: ApplicationError,
    },

    /// No handle is attached for an application that must be called.
    #[error("application {0} is not attached")]
    ApplicationUnreachable(Address),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, StakingEngineError>;

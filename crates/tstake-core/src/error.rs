//! Error types for the ledger core.

use std::fmt;

use thiserror::Error;

use crate::application::ApplicationStatus;
use crate::stake::StakeType;
use crate::types::{Address, Amount, Timestamp};

/// The role a caller must hold for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Governance,
    OwnerOrProvider,
    Authorizer,
    PanicButton,
    Application,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Governance => "governance",
            Role::OwnerOrProvider => "the owner or staking provider",
            Role::Authorizer => "the authorizer",
            Role::PanicButton => "the panic button",
            Role::Application => "an approved application",
        };
        f.write_str(name)
    }
}

/// Ledger rule violations.
///
/// Any of these aborts the operation that produced it; the engine discards
/// every state change made by that operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakingError {
    #[error("caller {caller} is not {role}")]
    Unauthorized { caller: Address, role: Role },

    #[error("application {application} is {status}")]
    InvalidApplicationState {
        application: Address,
        status: ApplicationStatus,
    },

    #[error("not enough stake to authorize: available {available}, requested {requested}")]
    InsufficientStake { available: Amount, requested: Amount },

    #[error("cannot unstake {requested} {stake_type}: {min_staked} must stay staked")]
    InsufficientUnstakedAmount {
        stake_type: StakeType,
        requested: Amount,
        min_staked: Amount,
    },

    #[error("stake amount {amount} is below the minimum of {minimum}")]
    BelowMinimumStake { amount: Amount, minimum: Amount },

    #[error("staking provider {0} is already registered")]
    AlreadyRegistered(Address),

    #[error("staking provider {0} not found")]
    ProviderNotFound(Address),

    #[error("authorization ceiling of {ceiling} applications reached")]
    CeilingExceeded { ceiling: usize },

    #[error("application {application} refused to replace the pending decrease for {provider}")]
    PendingDecreaseConflict {
        provider: Address,
        application: Address,
    },

    #[error("no pending authorization decrease for {provider} at {application}")]
    NoPendingDecrease {
        provider: Address,
        application: Address,
    },

    #[error("amount must be greater than zero")]
    ZeroAmount,

    #[error("address must not be zero")]
    ZeroAddress,

    #[error("decrease of {requested} exceeds authorized amount {authorized}")]
    AmountExceedsAuthorized { authorized: Amount, requested: Amount },

    #[error("nothing authorized for staking provider {provider}")]
    NothingAuthorized { provider: Address },

    #[error("staking provider {provider} authorized {authorized}, cannot slash {amount}")]
    InsufficientAuthorization {
        provider: Address,
        authorized: Amount,
        amount: Amount,
    },

    #[error("staking provider {0} still has authorized applications")]
    StillAuthorized(Address),

    #[error("no {0} stake to unstake")]
    NothingToUnstake(StakeType),

    #[error("stake is locked until {unlocks_at}")]
    UnstakeTooEarly { unlocks_at: Timestamp },

    #[error("reward multiplier {0} exceeds 100 percent")]
    InvalidRewardMultiplier(u8),

    #[error("notifiers treasury holds {available}, requested {requested}")]
    InsufficientTreasury { available: Amount, requested: Amount },

    #[error("staking provider list must not be empty")]
    EmptyProviderList,

    #[error("operation not supported for {0} stake")]
    InvalidStakeType(StakeType),

    #[error("amount overflow")]
    Overflow,
}

/// Encoding errors for the canonical state encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, StakingError>;

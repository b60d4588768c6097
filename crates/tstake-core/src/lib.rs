//! # tstake Core
//!
//! The staking ledger as a plain value: stake registry, application
//! registry, authorization ledger, slashing queue and notifiers treasury.
//!
//! This crate performs no I/O and calls no collaborators. Every operation
//! checks its preconditions and mutates a [`LedgerState`]; token transfers
//! and application notifications are driven by the `tstake` engine on top.
//!
//! ## Key Types
//!
//! - [`LedgerState`] - Every registry in one cheaply clonable value
//! - [`StakingProvider`] - Roles and balances of one provider
//! - [`AuthorizationLedger`] - Per-application claims on provider stake
//! - [`SlashingQueue`] - FIFO of pending slashes
//!
//! ## Invariant
//!
//! For every provider, the largest authorization held by any application
//! never exceeds the provider's total stake. See
//! [`LedgerState::invariant_violations`].

pub mod application;
pub mod authorization;
pub mod error;
pub mod params;
pub mod slashing;
pub mod stake;
pub mod state;
pub mod treasury;
pub mod types;

pub use application::{ApplicationInfo, ApplicationRegistry, ApplicationStatus};
pub use authorization::{
    Authorization, AuthorizationChange, AuthorizationLedger, DecreaseRequest, PendingDecrease,
};
pub use error::{CodecError, Role, StakingError};
pub use params::{Parameters, MAX_REWARD_MULTIPLIER, SLASHING_REWARD_PERCENT};
pub use slashing::{SlashingEvent, SlashingOutcome, SlashingQueue, SlashingReport};
pub use stake::{Roles, SlashedAmounts, StakeRegistry, StakeType, StakingProvider, UnstakedAll};
pub use state::{InvariantViolation, LedgerState, StateHash};
pub use treasury::NotifierTreasury;
pub use types::{Address, Amount, Timestamp};

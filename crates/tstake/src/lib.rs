//! # tstake
//!
//! A token staking ledger: providers stake tokens, authorize applications
//! against that stake, and applications slash misbehaving providers.
//!
//! ## Overview
//!
//! - **Stake**: T tokens held in custody, plus legacy Keep and Nu stake
//!   imported by governance and expressed in T.
//! - **Roles**: every provider has an owner, a beneficiary and an
//!   authorizer.
//! - **Authorization**: the authorizer lets approved applications use part
//!   of the stake. Each application may be authorized for the full stake;
//!   decreases wait for the application's approval.
//! - **Slashing**: applications queue slashes against providers they are
//!   authorized for. Anyone processes the queue and earns a share.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tstake::{StakingConfig, TokenStaking};
//! use tstake::collaborator::memory::{MemoryToken, ScriptedApplication};
//! use tstake::core::Address;
//!
//! async fn example() -> tstake::Result<()> {
//!     let governance = Address::derive("governance");
//!     let owner = Address::derive("owner");
//!     let provider = Address::derive("provider");
//!     let authorizer = Address::derive("authorizer");
//!     let application = Address::derive("application");
//!
//!     let token = Arc::new(MemoryToken::new());
//!     token.mint(owner, 1_000);
//!
//!     let mut staking = TokenStaking::new(StakingConfig::new(governance), token)?;
//!     staking.stake(&owner, provider, owner, authorizer, 1_000).await?;
//!     staking.approve_application(&governance, application, Arc::new(ScriptedApplication::new()))?;
//!     staking
//!         .increase_authorization(&authorizer, provider, application, 500)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `tstake::core` - ledger state and rules
//! - `tstake::store` - persistence

pub mod clock;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod events;
pub mod staking;

// Re-export component crates
pub use tstake_core as core;
pub use tstake_store as store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborator::{Application, ApplicationError, Token, TokenError};
pub use config::StakingConfig;
pub use error::{Result, StakingEngineError};
pub use events::StakingEvent;
pub use staking::TokenStaking;

pub use tstake_core::{
    Address, Amount, ApplicationStatus, DecreaseRequest, Roles, SlashingReport, StakeType,
    StakingError,
};

//! # tstake Testkit
//!
//! Testing utilities for tstake.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: an engine over in-memory collaborators with a pool of
//!   funded providers and approved applications
//! - **Generators**: Proptest strategies for addresses, amounts, configs
//!   and whole operation sequences
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tstake_testkit::generators::{arb_operations, staking_config};
//! use tstake_testkit::fixtures::StakingFixture;
//!
//! proptest! {
//!     #[test]
//!     fn custody_is_backed(config in staking_config(), ops in arb_operations(32)) {
//!         let rt = tokio::runtime::Runtime::new().unwrap();
//!         rt.block_on(async {
//!             let mut fixture = StakingFixture::new(config).unwrap();
//!             for op in &ops {
//!                 let _ = fixture.apply(op).await;
//!                 assert!(fixture.custody_matches_ledger());
//!             }
//!         });
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use tstake::StakingConfig;
//! use tstake_testkit::fixtures::{governance, StakingFixture};
//!
//! let fixture = StakingFixture::new(StakingConfig::new(governance())).unwrap();
//! assert_eq!(fixture.staking.applications_len(), 3);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{governance, ApplicationActor, ProviderActors, StakingFixture};
pub use generators::{arb_operation, arb_operations, staking_config, Op};

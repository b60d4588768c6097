//! # tstake Store
//!
//! Checkpoint storage for the tstake ledger. Provides a trait-based
//! interface for saving and loading a [`LedgerState`](tstake_core::LedgerState)
//! with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`Checkpoint`] - Version, state hash and time of a save
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tstake_core::{Address, LedgerState, Parameters};
//! use tstake_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("ledger.db").unwrap();
//!
//!     let state = LedgerState::new(Parameters::new(Address::derive("governance")));
//!     let checkpoint = store.save_state(&state, 0).await.unwrap();
//!
//!     let loaded = store.load_state().await.unwrap();
//!     assert_eq!(loaded, Some(state));
//!     println!("saved version {}", checkpoint.version);
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Relational layout**: one table per registry, rewritten per save
//! - **Verified loads**: the loaded state must hash to the latest checkpoint

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{Checkpoint, Store};

//! Random operation sequences against the staking engine.
//!
//! After every operation:
//! - no provider's largest authorization exceeds its total stake
//! - custody holds the T stakes plus the notifiers treasury, less unbacked
//!   processor rewards
//! - a failed operation leaves state and events untouched

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

use tstake_store::{MemoryStore, SqliteStore, Store};
use tstake_testkit::fixtures::StakingFixture;
use tstake_testkit::generators::{arb_operations, staking_config, Op};

async fn run(config: tstake::StakingConfig, ops: Vec<Op>) -> Result<StakingFixture, TestCaseError> {
    let mut fixture = StakingFixture::new(config).map_err(|e| TestCaseError::fail(e.to_string()))?;

    for op in &ops {
        let before = fixture.staking.state().clone();
        let events_before = fixture.staking.events().len();

        let result = fixture.apply(op).await;

        if result.is_err() {
            prop_assert_eq!(fixture.staking.state(), &before, "{:?} left changes behind", op);
            prop_assert_eq!(fixture.staking.events().len(), events_before);
        }
        let violations = fixture.staking.state().invariant_violations();
        prop_assert!(violations.is_empty(), "{:?} after {:?}", violations, op);
        prop_assert!(fixture.custody_matches_ledger(), "custody drifted after {:?}", op);
    }
    Ok(fixture)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_operations_preserve_invariants(config in staking_config(), ops in arb_operations(48)) {
        runtime().block_on(run(config, ops))?;
    }

    #[test]
    fn prop_state_survives_memory_store(config in staking_config(), ops in arb_operations(24)) {
        let rt = runtime();
        let fixture = rt.block_on(run(config, ops))?;

        let store = MemoryStore::new();
        let loaded = rt.block_on(async {
            fixture.staking.save_to(&store).await.unwrap();
            store.load_state().await.unwrap()
        });
        prop_assert_eq!(loaded.as_ref(), Some(fixture.staking.state()));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_state_survives_sqlite(config in staking_config(), ops in arb_operations(32)) {
        let rt = runtime();
        let fixture = rt.block_on(run(config, ops))?;

        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("ledger.db")).unwrap();
        let (checkpoint, loaded) = rt.block_on(async {
            let checkpoint = fixture.staking.save_to(&store).await.unwrap();
            (checkpoint, store.load_state().await.unwrap())
        });

        prop_assert_eq!(checkpoint.state_hash, fixture.staking.state().state_hash().unwrap());
        prop_assert_eq!(loaded.as_ref(), Some(fixture.staking.state()));
    }
}

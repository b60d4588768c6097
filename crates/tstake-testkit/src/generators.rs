//! Proptest generators for property-based testing.
//!
//! Operations refer to actors by index into a [`StakingFixture`] pool, so a
//! generated sequence hits the same providers and applications repeatedly.
//!
//! [`StakingFixture`]: crate::fixtures::StakingFixture

use proptest::prelude::*;

use tstake::StakingConfig;
use tstake_core::{Address, Amount, StakeType};

use crate::fixtures::governance;

/// Generate a random address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address)
}

/// Generate a non-zero amount small enough that sequences interact.
pub fn amount() -> impl Strategy<Value = Amount> {
    1u128..=10_000u128
}

/// Generate a legacy stake type.
pub fn legacy_stake_type() -> impl Strategy<Value = StakeType> {
    prop_oneof![Just(StakeType::Keep), Just(StakeType::Nu)]
}

/// Generate a reward multiplier, occasionally out of range.
pub fn reward_multiplier() -> impl Strategy<Value = u8> {
    prop_oneof![9 => 0u8..=100u8, 1 => 101u8..=u8::MAX]
}

/// Generate a configuration governed by the fixture's governance address.
pub fn staking_config() -> impl Strategy<Value = StakingConfig> {
    (0u128..=500, 0usize..=3, 0u128..=200, prop_oneof![Just(0u64), 1u64..=7_200]).prop_map(
        |(min_stake, ceiling, reward, lock)| {
            StakingConfig::new(governance())
                .with_min_t_stake_amount(min_stake)
                .with_authorization_ceiling(ceiling)
                .with_notification_reward(reward)
                .with_min_stake_time(lock)
        },
    )
}

/// A single operation against a [`crate::fixtures::StakingFixture`].
///
/// Indices are reduced modulo the pool size when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Stake { provider: usize, amount: Amount },
    TopUp { provider: usize, amount: Amount },
    UnstakeT { provider: usize, amount: Amount },
    ImportLegacy { provider: usize, stake_type: StakeType, amount: Amount },
    UnstakeLegacy { provider: usize, stake_type: StakeType },
    UnstakeAll { provider: usize },
    IncreaseAuthorization { provider: usize, application: usize, amount: Amount },
    RequestDecrease { provider: usize, application: usize, amount: Amount },
    RequestDecreaseAll { provider: usize },
    ApproveDecrease { provider: usize, application: usize },
    ForceDecrease { provider: usize, application: usize },
    Pause { application: usize },
    Disable { application: usize },
    Approve { application: usize },
    Slash { application: usize, providers: Vec<usize>, amount: Amount },
    Seize { application: usize, providers: Vec<usize>, amount: Amount, multiplier: u8 },
    ProcessSlashing { count: usize },
    PushReward { amount: Amount },
    WithdrawReward { amount: Amount },
    SetCeiling { ceiling: usize },
    AdvanceClock { seconds: u64 },
    RejectCallbacks { application: usize, reject: bool },
}

fn index() -> impl Strategy<Value = usize> {
    0usize..8
}

fn provider_indices() -> impl Strategy<Value = Vec<usize>> {
    prop::collection::vec(index(), 1..=3)
}

/// Generate one operation, weighted towards stake and authorization.
pub fn arb_operation() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (index(), amount()).prop_map(|(provider, amount)| Op::Stake { provider, amount }),
        2 => (index(), amount()).prop_map(|(provider, amount)| Op::TopUp { provider, amount }),
        2 => (index(), amount()).prop_map(|(provider, amount)| Op::UnstakeT { provider, amount }),
        1 => (index(), legacy_stake_type(), amount())
            .prop_map(|(provider, stake_type, amount)| Op::ImportLegacy { provider, stake_type, amount }),
        1 => (index(), legacy_stake_type())
            .prop_map(|(provider, stake_type)| Op::UnstakeLegacy { provider, stake_type }),
        1 => index().prop_map(|provider| Op::UnstakeAll { provider }),
        5 => (index(), index(), amount()).prop_map(|(provider, application, amount)| {
            Op::IncreaseAuthorization { provider, application, amount }
        }),
        2 => (index(), index(), amount()).prop_map(|(provider, application, amount)| {
            Op::RequestDecrease { provider, application, amount }
        }),
        1 => index().prop_map(|provider| Op::RequestDecreaseAll { provider }),
        2 => (index(), index())
            .prop_map(|(provider, application)| Op::ApproveDecrease { provider, application }),
        1 => (index(), index())
            .prop_map(|(provider, application)| Op::ForceDecrease { provider, application }),
        1 => index().prop_map(|application| Op::Pause { application }),
        1 => index().prop_map(|application| Op::Disable { application }),
        1 => index().prop_map(|application| Op::Approve { application }),
        2 => (index(), provider_indices(), amount())
            .prop_map(|(application, providers, amount)| Op::Slash { application, providers, amount }),
        2 => (index(), provider_indices(), amount(), reward_multiplier()).prop_map(
            |(application, providers, amount, multiplier)| Op::Seize { application, providers, amount, multiplier }
        ),
        3 => (0usize..=4).prop_map(|count| Op::ProcessSlashing { count }),
        1 => amount().prop_map(|amount| Op::PushReward { amount }),
        1 => amount().prop_map(|amount| Op::WithdrawReward { amount }),
        1 => (0usize..=3).prop_map(|ceiling| Op::SetCeiling { ceiling }),
        1 => (1u64..=3_600).prop_map(|seconds| Op::AdvanceClock { seconds }),
        1 => (index(), any::<bool>()).prop_map(|(application, reject)| Op::RejectCallbacks { application, reject }),
    ]
}

/// Generate a sequence of up to `max_len` operations.
pub fn arb_operations(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(arb_operation(), 1..=max_len)
}

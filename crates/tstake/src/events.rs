//! Structured record of what the engine did.
//!
//! Events are appended only by operations that succeed; a rolled-back
//! operation leaves no events behind.

use tstake_core::{Address, Amount, ApplicationStatus, StakeType};

/// A state change observed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StakingEvent {
    Staked {
        provider: Address,
        owner: Address,
        beneficiary: Address,
        authorizer: Address,
        amount: Amount,
    },
    ToppedUp {
        provider: Address,
        amount: Amount,
    },
    Unstaked {
        provider: Address,
        stake_type: StakeType,
        amount: Amount,
    },
    LegacyStakeImported {
        provider: Address,
        stake_type: StakeType,
        amount: Amount,
    },
    ApplicationStatusChanged {
        application: Address,
        status: ApplicationStatus,
    },
    PanicButtonSet {
        application: Address,
        panic_button: Address,
    },
    AuthorizationCeilingSet {
        ceiling: usize,
    },
    AuthorizationIncreased {
        provider: Address,
        application: Address,
        from: Amount,
        to: Amount,
    },
    AuthorizationDecreaseRequested {
        provider: Address,
        application: Address,
        from: Amount,
        to: Amount,
    },
    AuthorizationDecreaseApproved {
        provider: Address,
        application: Address,
        from: Amount,
        to: Amount,
    },
    AuthorizationInvoluntaryDecreased {
        provider: Address,
        application: Address,
        from: Amount,
        to: Amount,
        /// Whether the application accepted the notification.
        notified: bool,
    },
    SlashingQueued {
        application: Address,
        provider: Address,
        amount: Amount,
        notifier: Option<Address>,
    },
    SlashingProcessed {
        processor: Address,
        count: usize,
        total_slashed: Amount,
        processor_reward: Amount,
    },
    NotifierRewarded {
        notifier: Address,
        amount: Amount,
    },
    NotificationRewardSet {
        reward: Amount,
    },
    NotificationRewardPushed {
        from: Address,
        amount: Amount,
    },
    NotificationRewardWithdrawn {
        recipient: Address,
        amount: Amount,
    },
    MinimumStakeAmountSet {
        amount: Amount,
    },
    MinStakeTimeSet {
        seconds: u64,
    },
    GovernanceTransferred {
        from: Address,
        to: Address,
    },
}

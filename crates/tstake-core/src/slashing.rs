//! Slashing queue.
//!
//! Applications enqueue slashes; anyone drains the queue in FIFO order and is
//! paid a share of what was slashed. Seizures additionally reward the
//! notifier who reported the misbehaviour.

use im::Vector;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationStatus;
use crate::authorization::AuthorizationChange;
use crate::error::{Result, StakingError};
use crate::params::{MAX_REWARD_MULTIPLIER, SLASHING_REWARD_PERCENT};
use crate::stake::SlashedAmounts;
use crate::state::LedgerState;
use crate::types::{Address, Amount};

/// One queued slash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingEvent {
    pub provider: Address,
    pub amount: Amount,
    /// Application that requested the slash.
    pub application: Address,
    /// Notifier to reward, for seizures.
    pub notifier: Option<Address>,
    /// Share of the notification reward paid to the notifier, in percent.
    pub reward_multiplier: u8,
}

/// FIFO queue of pending slashes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashingQueue {
    events: Vector<SlashingEvent>,
    processed: u64,
}

impl SlashingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries still waiting.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Entry at `index`, counted from the head.
    pub fn get(&self, index: usize) -> Option<&SlashingEvent> {
        self.events.get(index)
    }

    /// Iterate waiting entries from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &SlashingEvent> {
        self.events.iter()
    }

    /// Total entries dequeued since the ledger was created.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Append an entry at the tail.
    pub fn push(&mut self, event: SlashingEvent) {
        self.events.push_back(event);
    }

    /// Remove and return up to `count` entries from the head.
    pub fn take_front(&mut self, count: usize) -> Vector<SlashingEvent> {
        let count = count.min(self.events.len());
        let rest = self.events.split_off(count);
        let taken = std::mem::replace(&mut self.events, rest);
        self.processed += taken.len() as u64;
        taken
    }

    /// Rebuild the queue from persisted rows.
    pub fn restore(events: impl IntoIterator<Item = SlashingEvent>, processed: u64) -> Self {
        Self {
            events: events.into_iter().collect(),
            processed,
        }
    }
}

/// What processing one entry did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashingOutcome {
    pub event: SlashingEvent,
    pub slashed: SlashedAmounts,
    /// Authorizations lowered because of the slash.
    pub changes: Vec<AuthorizationChange>,
    /// Paid to the entry's notifier out of the treasury.
    pub notifier_reward: Amount,
}

/// Result of one `process_slashing` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashingReport {
    pub outcomes: Vec<SlashingOutcome>,
    /// Stake removed across all denominations.
    pub total_slashed: Amount,
    /// T stake removed; the only part held in custody.
    pub t_slashed: Amount,
    /// Owed to the caller: `SLASHING_REWARD_PERCENT` of `total_slashed`.
    pub processor_reward: Amount,
    /// Slashed T left after the processor reward, credited to the
    /// notifiers treasury.
    pub treasury_credit: Amount,
    /// Part of the processor reward beyond `t_slashed`, taken from the
    /// notifiers treasury.
    pub treasury_draw: Amount,
    /// Part of the processor reward covered by neither slashed T nor the
    /// treasury.
    pub unbacked_reward: Amount,
}

impl SlashingReport {
    /// Number of entries dequeued.
    pub fn processed(&self) -> usize {
        self.outcomes.len()
    }

    /// Rewards owed to notifiers, one per rewarded entry.
    pub fn notifier_rewards(&self) -> impl Iterator<Item = (Address, Amount)> + '_ {
        self.outcomes.iter().filter_map(|outcome| {
            outcome
                .event
                .notifier
                .filter(|_| outcome.notifier_reward > 0)
                .map(|notifier| (notifier, outcome.notifier_reward))
        })
    }
}

impl LedgerState {
    fn enqueue_slashing(
        &mut self,
        caller: &Address,
        amount: Amount,
        notifier: Option<Address>,
        reward_multiplier: u8,
        providers: &[Address],
    ) -> Result<usize> {
        self.applications
            .require_status(caller, &[ApplicationStatus::Approved])?;
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if providers.is_empty() {
            return Err(StakingError::EmptyProviderList);
        }
        for provider in providers {
            let authorized = self.authorizations.authorized(provider, caller);
            if authorized < amount {
                return Err(StakingError::InsufficientAuthorization {
                    provider: *provider,
                    authorized,
                    amount,
                });
            }
        }

        for provider in providers {
            self.slashing.push(SlashingEvent {
                provider: *provider,
                amount,
                application: *caller,
                notifier,
                reward_multiplier,
            });
        }
        Ok(providers.len())
    }

    /// Queue a slash of `amount` against each provider. `caller` is the
    /// application. Returns the number of entries queued.
    pub fn slash(&mut self, caller: &Address, amount: Amount, providers: &[Address]) -> Result<usize> {
        self.enqueue_slashing(caller, amount, None, 0, providers)
    }

    /// Queue a slash that rewards `notifier` when processed.
    pub fn seize(
        &mut self,
        caller: &Address,
        amount: Amount,
        reward_multiplier: u8,
        notifier: Address,
        providers: &[Address],
    ) -> Result<usize> {
        if reward_multiplier > MAX_REWARD_MULTIPLIER {
            return Err(StakingError::InvalidRewardMultiplier(reward_multiplier));
        }
        if notifier.is_zero() {
            return Err(StakingError::ZeroAddress);
        }
        self.enqueue_slashing(caller, amount, Some(notifier), reward_multiplier, providers)
    }

    /// Dequeue and apply up to `count` slashes.
    ///
    /// Stake, authorizations and the treasury are updated here. Paying the
    /// processor and notifiers and telling applications about lowered
    /// authorizations is left to the caller, using the returned report.
    pub fn process_slashing(&mut self, count: usize) -> Result<SlashingReport> {
        if count == 0 {
            return Err(StakingError::ZeroAmount);
        }

        let mut report = SlashingReport::default();
        for event in self.slashing.take_front(count) {
            let slashed = self.stakes.slash(&event.provider, event.amount);
            let remaining = self.total_stake(&event.provider);
            let changes = self
                .authorizations
                .apply_slash(event.provider, slashed.total(), remaining);

            let notifier_reward = match event.notifier {
                Some(_) => {
                    let owed = self.treasury.reward_for(event.reward_multiplier);
                    self.treasury.pay_capped(owed)
                }
                None => 0,
            };

            report.total_slashed = report.total_slashed.saturating_add(slashed.total());
            report.t_slashed = report.t_slashed.saturating_add(slashed.t);
            report.outcomes.push(SlashingOutcome {
                event,
                slashed,
                changes,
                notifier_reward,
            });
        }

        report.processor_reward = report.total_slashed.saturating_mul(SLASHING_REWARD_PERCENT) / 100;
        report.treasury_credit = report.t_slashed.saturating_sub(report.processor_reward);
        // Legacy stake is not in custody; the rest of the reward is funded by the treasury.
        let excess = report.processor_reward.saturating_sub(report.t_slashed);
        report.treasury_draw = self.treasury.pay_capped(excess);
        report.unbacked_reward = excess - report.treasury_draw;
        self.treasury.deposit(report.treasury_credit)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;
    use crate::stake::{Roles, StakeType};

    struct Setup {
        state: LedgerState,
        provider: Address,
        app: Address,
        notifier: Address,
    }

    fn setup(stake: Amount, authorized: Amount) -> Setup {
        let governance = Address::derive("governance");
        let provider = Address::derive("provider");
        let authorizer = Address::derive("authorizer");
        let app = Address::derive("application");
        let mut state = LedgerState::new(Parameters::new(governance));
        state
            .stake(
                &Address::derive("owner"),
                provider,
                Address::derive("beneficiary"),
                authorizer,
                stake,
                0,
            )
            .unwrap();
        state.approve_application(&governance, app).unwrap();
        state
            .increase_authorization(&authorizer, provider, app, authorized)
            .unwrap();
        Setup {
            state,
            provider,
            app,
            notifier: Address::derive("notifier"),
        }
    }

    #[test]
    fn test_slash_requires_approved_caller() {
        let mut s = setup(100, 50);
        let stranger = Address::derive("stranger");
        assert!(matches!(
            s.state.slash(&stranger, 10, &[s.provider]),
            Err(StakingError::InvalidApplicationState { .. })
        ));
    }

    #[test]
    fn test_slash_is_all_or_nothing() {
        let mut s = setup(100, 50);
        let unauthorized = Address::derive("unauthorized-provider");

        assert_eq!(
            s.state.slash(&s.app, 10, &[s.provider, unauthorized]),
            Err(StakingError::InsufficientAuthorization {
                provider: unauthorized,
                authorized: 0,
                amount: 10,
            })
        );
        assert!(s.state.slashing.is_empty());

        assert_eq!(s.state.slash(&s.app, 10, &[]), Err(StakingError::EmptyProviderList));
        assert_eq!(s.state.slash(&s.app, 0, &[s.provider]), Err(StakingError::ZeroAmount));
        assert_eq!(s.state.slash(&s.app, 10, &[s.provider]), Ok(1));
        assert_eq!(s.state.slashing.len(), 1);
    }

    #[test]
    fn test_seize_validates_multiplier() {
        let mut s = setup(100, 50);
        assert_eq!(
            s.state.seize(&s.app, 10, 101, s.notifier, &[s.provider]),
            Err(StakingError::InvalidRewardMultiplier(101))
        );
        assert_eq!(s.state.seize(&s.app, 10, 100, s.notifier, &[s.provider]), Ok(1));
        let event = s.state.slashing.get(0).unwrap();
        assert_eq!(event.notifier, Some(s.notifier));
        assert_eq!(event.reward_multiplier, 100);
    }

    #[test]
    fn test_process_zero_count() {
        let mut s = setup(100, 50);
        assert_eq!(s.state.process_slashing(0), Err(StakingError::ZeroAmount));
    }

    #[test]
    fn test_process_in_fifo_order_with_notifier_rewards() {
        let mut s = setup(100, 50);
        s.state.treasury.set_notification_reward(10);
        s.state.treasury.deposit(100).unwrap();
        for _ in 0..3 {
            s.state.seize(&s.app, 10, 10, s.notifier, &[s.provider]).unwrap();
        }

        let report = s.state.process_slashing(2).unwrap();
        assert_eq!(report.processed(), 2);
        assert_eq!(report.total_slashed, 20);
        assert_eq!(report.processor_reward, 1);
        assert_eq!(report.notifier_rewards().map(|(_, r)| r).sum::<Amount>(), 2);
        assert_eq!(report.treasury_credit, 19);
        assert_eq!(s.state.treasury.balance(), 100 - 2 + 19);

        assert_eq!(s.state.stakes.get(&s.provider).unwrap().t_stake, 80);
        assert_eq!(s.state.authorizations.authorized(&s.provider, &s.app), 30);
        assert_eq!(s.state.slashing.len(), 1);
        assert_eq!(s.state.slashing.processed(), 2);
    }

    #[test]
    fn test_notifier_reward_capped_by_treasury() {
        let mut s = setup(100, 50);
        s.state.treasury.set_notification_reward(10);
        s.state.treasury.deposit(1).unwrap();
        for _ in 0..2 {
            s.state.seize(&s.app, 10, 50, s.notifier, &[s.provider]).unwrap();
        }

        let report = s.state.process_slashing(10).unwrap();
        let rewards: Vec<Amount> = report.outcomes.iter().map(|o| o.notifier_reward).collect();
        // Treasury is replenished only after rewards are paid.
        assert_eq!(rewards, vec![1, 0]);
        assert!(s.state.slashing.is_empty());
    }

    #[test]
    fn test_slash_beyond_stake_is_absorbed() {
        let mut s = setup(30, 30);
        let roles = Roles::new(
            Address::derive("owner"),
            Address::derive("beneficiary"),
            Address::derive("authorizer"),
        );
        s.state
            .import_legacy_stake(
                &Address::derive("governance"),
                s.provider,
                roles,
                StakeType::Nu,
                10,
                0,
            )
            .unwrap();
        s.state.slash(&s.app, 30, &[s.provider]).unwrap();
        s.state.slash(&s.app, 30, &[s.provider]).unwrap();

        let report = s.state.process_slashing(2).unwrap();
        assert_eq!(report.outcomes[0].slashed, SlashedAmounts { t: 30, keep: 0, nu: 0 });
        assert_eq!(report.outcomes[1].slashed, SlashedAmounts { t: 0, keep: 0, nu: 10 });
        assert_eq!(report.total_slashed, 40);
        assert_eq!(report.t_slashed, 30);
        assert_eq!(report.processor_reward, 2);

        assert_eq!(s.state.total_stake(&s.provider), 0);
        assert_eq!(s.state.authorizations.application_count(&s.provider), 0);
        assert!(s.state.invariant_violations().is_empty());
    }

    #[test]
    fn test_legacy_slash_pays_full_processor_reward() {
        let governance = Address::derive("governance");
        let provider = Address::derive("legacy-provider");
        let authorizer = Address::derive("authorizer");
        let app = Address::derive("application");
        let roles = Roles::new(Address::derive("owner"), Address::derive("beneficiary"), authorizer);
        let mut state = LedgerState::new(Parameters::new(governance));
        state
            .import_legacy_stake(&governance, provider, roles, StakeType::Keep, 100, 0)
            .unwrap();
        state.approve_application(&governance, app).unwrap();
        state
            .increase_authorization(&authorizer, provider, app, 100)
            .unwrap();
        state.slash(&app, 100, &[provider]).unwrap();

        let report = state.process_slashing(1).unwrap();
        assert_eq!(report.total_slashed, 100);
        assert_eq!(report.t_slashed, 0);
        assert_eq!(report.processor_reward, 5);
        assert_eq!(report.treasury_credit, 0);
        // Empty treasury: nothing backs the reward.
        assert_eq!(report.treasury_draw, 0);
        assert_eq!(report.unbacked_reward, 5);
    }

    #[test]
    fn test_legacy_slash_reward_drawn_from_treasury() {
        let mut s = setup(30, 30);
        let authorizer = Address::derive("authorizer");
        let roles = Roles::new(Address::derive("owner"), Address::derive("beneficiary"), authorizer);
        s.state
            .import_legacy_stake(&Address::derive("governance"), s.provider, roles, StakeType::Keep, 100, 0)
            .unwrap();
        s.state
            .increase_authorization(&authorizer, s.provider, s.app, 100)
            .unwrap();
        s.state.slash(&s.app, 30, &[s.provider]).unwrap();
        s.state.slash(&s.app, 100, &[s.provider]).unwrap();

        let first = s.state.process_slashing(1).unwrap();
        assert_eq!((first.t_slashed, first.processor_reward, first.treasury_credit), (30, 1, 29));

        // Only Keep is slashed now; the reward comes out of the treasury.
        let second = s.state.process_slashing(1).unwrap();
        assert_eq!(second.total_slashed, 100);
        assert_eq!(second.t_slashed, 0);
        assert_eq!(second.processor_reward, 5);
        assert_eq!(second.treasury_draw, 5);
        assert_eq!(second.unbacked_reward, 0);
        assert_eq!(s.state.treasury.balance(), 24);
    }

    #[test]
    fn test_take_front_on_short_queue() {
        let mut queue = SlashingQueue::new();
        let event = SlashingEvent {
            provider: Address::derive("p"),
            amount: 1,
            application: Address::derive("a"),
            notifier: None,
            reward_multiplier: 0,
        };
        queue.push(event.clone());
        let taken = queue.take_front(5);
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0], event);
        assert!(queue.is_empty());
        assert_eq!(queue.processed(), 1);
    }
}

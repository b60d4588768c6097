//! Notifiers treasury.

use serde::{Deserialize, Serialize};

use crate::error::{Result, StakingError};
use crate::params::MAX_REWARD_MULTIPLIER;
use crate::state::LedgerState;
use crate::types::{Address, Amount};

/// Pool funding rewards for notifiers of seized stake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifierTreasury {
    balance: Amount,
    notification_reward: Amount,
}

impl NotifierTreasury {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(balance: Amount, notification_reward: Amount) -> Self {
        Self {
            balance,
            notification_reward,
        }
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    /// Full reward for a notifier at a 100% multiplier.
    pub fn notification_reward(&self) -> Amount {
        self.notification_reward
    }

    pub fn set_notification_reward(&mut self, reward: Amount) {
        self.notification_reward = reward;
    }

    /// Reward owed for a seizure with `multiplier` percent.
    pub fn reward_for(&self, multiplier: u8) -> Amount {
        let multiplier = Amount::from(multiplier.min(MAX_REWARD_MULTIPLIER));
        self.notification_reward.saturating_mul(multiplier) / 100
    }

    pub fn deposit(&mut self, amount: Amount) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or(StakingError::Overflow)?;
        Ok(())
    }

    pub fn withdraw(&mut self, amount: Amount) -> Result<()> {
        if amount > self.balance {
            return Err(StakingError::InsufficientTreasury {
                available: self.balance,
                requested: amount,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    /// Take up to `amount`, as much as the balance allows. Returns what was taken.
    pub fn pay_capped(&mut self, amount: Amount) -> Amount {
        let paid = amount.min(self.balance);
        self.balance -= paid;
        paid
    }
}

impl LedgerState {
    /// Set the notification reward.
    pub fn set_notification_reward(&mut self, caller: &Address, reward: Amount) -> Result<()> {
        self.require_governance(caller)?;
        self.treasury.set_notification_reward(reward);
        Ok(())
    }

    /// Fund the treasury. Returns the new balance.
    pub fn push_notification_reward(&mut self, amount: Amount) -> Result<Amount> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        self.treasury.deposit(amount)?;
        Ok(self.treasury.balance())
    }

    /// Take funds out of the treasury.
    pub fn withdraw_notification_reward(&mut self, caller: &Address, recipient: &Address, amount: Amount) -> Result<()> {
        self.require_governance(caller)?;
        if recipient.is_zero() {
            return Err(StakingError::ZeroAddress);
        }
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        self.treasury.withdraw(amount)
    }
}

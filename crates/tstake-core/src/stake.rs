//! Stake registry: per-provider balances and roles.
//!
//! A provider holds stake in three denominations. Native T stake is held in
//! custody by the ledger; Keep and Nu are legacy stakes migrated from older
//! staking contracts and cached here in T-equivalent value.

use std::fmt;

use im::OrdMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, Role, StakingError};
use crate::state::LedgerState;
use crate::types::{Address, Amount, Timestamp};

/// Stake denomination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StakeType {
    T,
    Keep,
    Nu,
}

impl fmt::Display for StakeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StakeType::T => "T",
            StakeType::Keep => "Keep",
            StakeType::Nu => "Nu",
        };
        f.write_str(name)
    }
}

/// The role triple attached to a provider at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub owner: Address,
    pub beneficiary: Address,
    pub authorizer: Address,
}

impl Roles {
    pub fn new(owner: Address, beneficiary: Address, authorizer: Address) -> Self {
        Self {
            owner,
            beneficiary,
            authorizer,
        }
    }

    fn any_zero(&self) -> bool {
        self.owner.is_zero() || self.beneficiary.is_zero() || self.authorizer.is_zero()
    }
}

/// A staking provider record. Never removed once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingProvider {
    pub roles: Roles,
    pub t_stake: Amount,
    pub keep_in_t_stake: Amount,
    pub nu_in_t_stake: Amount,
    pub start_staking_timestamp: Timestamp,
}

/// How a slash was drawn from the three denominations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlashedAmounts {
    pub t: Amount,
    pub keep: Amount,
    pub nu: Amount,
}

impl SlashedAmounts {
    pub fn total(&self) -> Amount {
        self.t.saturating_add(self.keep).saturating_add(self.nu)
    }
}

impl StakingProvider {
    /// Create an empty record stamped with the first staking time.
    pub fn new(roles: Roles, now: Timestamp) -> Self {
        Self {
            roles,
            t_stake: 0,
            keep_in_t_stake: 0,
            nu_in_t_stake: 0,
            start_staking_timestamp: now,
        }
    }

    /// Sum of all three denominations.
    pub fn total_stake(&self) -> Amount {
        self.t_stake
            .saturating_add(self.keep_in_t_stake)
            .saturating_add(self.nu_in_t_stake)
    }

    /// Balance of one denomination.
    pub fn balance(&self, stake_type: StakeType) -> Amount {
        match stake_type {
            StakeType::T => self.t_stake,
            StakeType::Keep => self.keep_in_t_stake,
            StakeType::Nu => self.nu_in_t_stake,
        }
    }

    fn balance_mut(&mut self, stake_type: StakeType) -> &mut Amount {
        match stake_type {
            StakeType::T => &mut self.t_stake,
            StakeType::Keep => &mut self.keep_in_t_stake,
            StakeType::Nu => &mut self.nu_in_t_stake,
        }
    }

    /// Part of `stake_type` still needed to back `max_authorization` after
    /// the other two denominations are counted.
    pub fn min_staked(&self, stake_type: StakeType, max_authorization: Amount) -> Amount {
        if max_authorization == 0 {
            return 0;
        }
        let others = match stake_type {
            StakeType::T => self.keep_in_t_stake.saturating_add(self.nu_in_t_stake),
            StakeType::Keep => self.t_stake.saturating_add(self.nu_in_t_stake),
            StakeType::Nu => self.t_stake.saturating_add(self.keep_in_t_stake),
        };
        max_authorization.saturating_sub(others)
    }

    /// Reduce stake by up to `amount`, drawing T first, then Keep, then Nu.
    ///
    /// Balances floor at zero; any shortfall is simply not slashed.
    pub fn slash(&mut self, amount: Amount) -> SlashedAmounts {
        let mut remaining = amount;
        let mut take = |balance: &mut Amount| {
            let taken = remaining.min(*balance);
            *balance -= taken;
            remaining -= taken;
            taken
        };
        let t = take(&mut self.t_stake);
        let keep = take(&mut self.keep_in_t_stake);
        let nu = take(&mut self.nu_in_t_stake);
        SlashedAmounts { t, keep, nu }
    }
}

/// All provider records, keyed by provider address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeRegistry {
    providers: OrdMap<Address, StakingProvider>,
}

impl StakeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a provider.
    pub fn get(&self, provider: &Address) -> Option<&StakingProvider> {
        self.providers.get(provider)
    }

    /// Whether a provider record exists.
    pub fn contains(&self, provider: &Address) -> bool {
        self.providers.contains_key(provider)
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether no provider is registered.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Iterate providers in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &StakingProvider)> {
        self.providers.iter()
    }

    fn get_mut(&mut self, provider: &Address) -> Result<&mut StakingProvider> {
        self.providers
            .get_mut(provider)
            .ok_or(StakingError::ProviderNotFound(*provider))
    }

    /// Create a new, empty provider record.
    pub fn register(&mut self, provider: Address, roles: Roles, now: Timestamp) -> Result<()> {
        if provider.is_zero() || roles.any_zero() {
            return Err(StakingError::ZeroAddress);
        }
        if self.providers.contains_key(&provider) {
            return Err(StakingError::AlreadyRegistered(provider));
        }
        self.providers
            .insert(provider, StakingProvider::new(roles, now));
        Ok(())
    }

    /// Insert a record as-is. Used when loading persisted state.
    pub fn insert(&mut self, provider: Address, record: StakingProvider) {
        self.providers.insert(provider, record);
    }

    /// Add to one denomination. Returns the new balance.
    pub fn deposit(&mut self, provider: &Address, stake_type: StakeType, amount: Amount) -> Result<Amount> {
        let balance = self.get_mut(provider)?.balance_mut(stake_type);
        *balance = balance.checked_add(amount).ok_or(StakingError::Overflow)?;
        Ok(*balance)
    }

    /// Subtract from one denomination. Returns the new balance.
    pub fn withdraw(&mut self, provider: &Address, stake_type: StakeType, amount: Amount) -> Result<Amount> {
        let balance = self.get_mut(provider)?.balance_mut(stake_type);
        if amount > *balance {
            return Err(StakingError::InsufficientUnstakedAmount {
                stake_type,
                requested: amount,
                min_staked: 0,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }

    /// Zero one denomination. Returns what it held.
    pub fn zero(&mut self, provider: &Address, stake_type: StakeType) -> Result<Amount> {
        let balance = self.get_mut(provider)?.balance_mut(stake_type);
        Ok(std::mem::take(balance))
    }

    /// Slash a provider. Unknown providers slash nothing.
    pub fn slash(&mut self, provider: &Address, amount: Amount) -> SlashedAmounts {
        match self.providers.get_mut(provider) {
            Some(record) => record.slash(amount),
            None => SlashedAmounts::default(),
        }
    }

    /// Whether `caller` may manage the provider's principal.
    pub fn is_owner_or_provider(&self, provider: &Address, caller: &Address) -> bool {
        caller == provider
            || self
                .providers
                .get(provider)
                .is_some_and(|p| p.roles.owner == *caller)
    }
}

/// Outcome of `unstake_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnstakedAll {
    pub owner: Address,
    pub t: Amount,
    pub keep: Amount,
    pub nu: Amount,
}

impl LedgerState {
    fn require_owner_or_provider(&self, caller: &Address, provider: &Address) -> Result<&StakingProvider> {
        let record = self
            .stakes
            .get(provider)
            .ok_or(StakingError::ProviderNotFound(*provider))?;
        if caller != provider && record.roles.owner != *caller {
            return Err(StakingError::Unauthorized {
                caller: *caller,
                role: Role::OwnerOrProvider,
            });
        }
        Ok(record)
    }

    fn require_unlocked(&self, record: &StakingProvider, now: Timestamp) -> Result<()> {
        if self.params.min_stake_time == 0 {
            return Ok(());
        }
        let unlocks_at = record
            .start_staking_timestamp
            .saturating_add(self.params.min_stake_time);
        if now < unlocks_at {
            return Err(StakingError::UnstakeTooEarly { unlocks_at });
        }
        Ok(())
    }

    /// Register a new provider owned by `caller` and credit `amount` of T.
    pub fn stake(
        &mut self,
        caller: &Address,
        provider: Address,
        beneficiary: Address,
        authorizer: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<()> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        if amount < self.params.min_t_stake_amount {
            return Err(StakingError::BelowMinimumStake {
                amount,
                minimum: self.params.min_t_stake_amount,
            });
        }
        let roles = Roles::new(*caller, beneficiary, authorizer);
        self.stakes.register(provider, roles, now)?;
        self.stakes.deposit(&provider, StakeType::T, amount)?;
        Ok(())
    }

    /// Add T stake to an existing provider. Anyone may top up.
    pub fn top_up(&mut self, provider: &Address, amount: Amount) -> Result<Amount> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        self.stakes.deposit(provider, StakeType::T, amount)
    }

    /// Withdraw part of the T stake. Returns the owner to pay out to.
    pub fn unstake_t(
        &mut self,
        caller: &Address,
        provider: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Address> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let record = self.require_owner_or_provider(caller, provider)?;
        self.require_unlocked(record, now)?;
        let owner = record.roles.owner;
        let t_stake = record.t_stake;

        let min_staked = self.min_staked(provider, StakeType::T);
        let fits = amount
            .checked_add(min_staked)
            .is_some_and(|needed| needed <= t_stake);
        if !fits {
            return Err(StakingError::InsufficientUnstakedAmount {
                stake_type: StakeType::T,
                requested: amount,
                min_staked,
            });
        }

        self.stakes.withdraw(provider, StakeType::T, amount)?;
        Ok(owner)
    }

    /// Zero a legacy denomination in one shot. Returns the amount released.
    pub fn unstake_legacy(
        &mut self,
        caller: &Address,
        provider: &Address,
        stake_type: StakeType,
    ) -> Result<Amount> {
        if stake_type == StakeType::T {
            return Err(StakingError::InvalidStakeType(stake_type));
        }
        let balance = self
            .require_owner_or_provider(caller, provider)?
            .balance(stake_type);
        if balance == 0 {
            return Err(StakingError::NothingToUnstake(stake_type));
        }
        let min_staked = self.min_staked(provider, stake_type);
        if min_staked > 0 {
            return Err(StakingError::InsufficientUnstakedAmount {
                stake_type,
                requested: balance,
                min_staked,
            });
        }
        self.stakes.zero(provider, stake_type)
    }

    /// Release everything. Only possible once no application is authorized.
    pub fn unstake_all(&mut self, caller: &Address, provider: &Address, now: Timestamp) -> Result<UnstakedAll> {
        let record = self.require_owner_or_provider(caller, provider)?;
        if self.authorizations.application_count(provider) > 0 {
            return Err(StakingError::StillAuthorized(*provider));
        }
        if record.t_stake > 0 {
            self.require_unlocked(record, now)?;
        }
        let owner = record.roles.owner;

        Ok(UnstakedAll {
            owner,
            t: self.stakes.zero(provider, StakeType::T)?,
            keep: self.stakes.zero(provider, StakeType::Keep)?,
            nu: self.stakes.zero(provider, StakeType::Nu)?,
        })
    }

    /// Credit legacy stake migrated from an older staking contract.
    ///
    /// Creates the provider with `roles` if it does not exist yet; an
    /// existing provider must have the same owner.
    pub fn import_legacy_stake(
        &mut self,
        caller: &Address,
        provider: Address,
        roles: Roles,
        stake_type: StakeType,
        amount: Amount,
        now: Timestamp,
    ) -> Result<Amount> {
        self.require_governance(caller)?;
        if stake_type == StakeType::T {
            return Err(StakingError::InvalidStakeType(stake_type));
        }
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        match self.stakes.get(&provider) {
            Some(existing) if existing.roles.owner != roles.owner => {
                return Err(StakingError::AlreadyRegistered(provider));
            }
            Some(_) => {}
            None => self.stakes.register(provider, roles, now)?,
        }
        self.stakes.deposit(&provider, stake_type, amount)
    }
}

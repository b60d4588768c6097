//! Test fixtures and helpers.
//!
//! A [`StakingFixture`] wires a [`TokenStaking`] engine to in-memory
//! collaborators and a pool of deterministic actors.

use std::sync::Arc;

use tstake::collaborator::memory::{MemoryToken, ScriptedApplication};
use tstake::{ManualClock, StakingConfig, TokenStaking};
use tstake_core::{Address, Amount, Roles, StakeType};

use crate::generators::Op;

/// Providers in the fixture pool.
pub const PROVIDERS: usize = 4;

/// Applications in the fixture pool.
pub const APPLICATIONS: usize = 3;

/// Tokens minted to every owner and to the funder.
pub const INITIAL_BALANCE: Amount = 1_000_000_000;

/// Clock start for fixtures.
pub const GENESIS: u64 = 1_700_000_000;

/// The governance address every fixture config uses.
pub fn governance() -> Address {
    Address::derive("governance")
}

/// The addresses around one staking provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderActors {
    pub provider: Address,
    pub owner: Address,
    pub beneficiary: Address,
    pub authorizer: Address,
}

impl ProviderActors {
    /// Deterministic actors for pool slot `index`.
    pub fn derive(index: usize) -> Self {
        Self {
            provider: Address::derive(&format!("provider-{}", index)),
            owner: Address::derive(&format!("owner-{}", index)),
            beneficiary: Address::derive(&format!("beneficiary-{}", index)),
            authorizer: Address::derive(&format!("authorizer-{}", index)),
        }
    }

    pub fn roles(&self) -> Roles {
        Roles::new(self.owner, self.beneficiary, self.authorizer)
    }
}

/// An application in the pool with its scripted handle.
#[derive(Clone)]
pub struct ApplicationActor {
    pub address: Address,
    pub panic_button: Address,
    pub handle: Arc<ScriptedApplication>,
}

/// An engine over in-memory collaborators with funded actors.
pub struct StakingFixture {
    pub governance: Address,
    pub funder: Address,
    pub notifier: Address,
    pub processor: Address,
    pub token: Arc<MemoryToken>,
    pub clock: Arc<ManualClock>,
    pub staking: TokenStaking,
    pub providers: Vec<ProviderActors>,
    pub applications: Vec<ApplicationActor>,
    /// Processor rewards paid on legacy slashes that neither slashed T nor
    /// the treasury covered.
    pub unbacked_rewards: Amount,
}

impl StakingFixture {
    /// Create a fixture with the default pool. Applications are approved
    /// and have panic buttons; no provider has staked yet.
    pub fn new(config: StakingConfig) -> tstake::Result<Self> {
        let token = Arc::new(MemoryToken::new());
        let clock = Arc::new(ManualClock::new(GENESIS));
        let governance = config.governance;
        let staking = TokenStaking::with_clock(config, token.clone(), clock.clone())?;

        let providers: Vec<_> = (0..PROVIDERS).map(ProviderActors::derive).collect();
        for actors in &providers {
            token.mint(actors.owner, INITIAL_BALANCE);
        }
        let funder = Address::derive("funder");
        token.mint(funder, INITIAL_BALANCE);

        let mut fixture = Self {
            governance,
            funder,
            notifier: Address::derive("notifier"),
            processor: Address::derive("processor"),
            token,
            clock,
            staking,
            providers,
            applications: Vec::new(),
            unbacked_rewards: 0,
        };
        for index in 0..APPLICATIONS {
            fixture.add_application(index)?;
        }
        fixture.staking.drain_events();
        Ok(fixture)
    }

    /// Create a fixture where every provider has staked `stake`.
    pub async fn with_stakes(config: StakingConfig, stake: Amount) -> tstake::Result<Self> {
        let mut fixture = Self::new(config)?;
        for index in 0..fixture.providers.len() {
            fixture.stake(index, stake).await?;
        }
        Ok(fixture)
    }

    fn add_application(&mut self, index: usize) -> tstake::Result<()> {
        let actor = ApplicationActor {
            address: Address::derive(&format!("application-{}", index)),
            panic_button: Address::derive(&format!("panic-button-{}", index)),
            handle: Arc::new(ScriptedApplication::new()),
        };
        self.staking
            .approve_application(&self.governance, actor.address, actor.handle.clone())?;
        self.staking
            .set_panic_button(&self.governance, actor.address, actor.panic_button)?;
        self.applications.push(actor);
        Ok(())
    }

    pub fn provider(&self, index: usize) -> ProviderActors {
        self.providers[index % self.providers.len()]
    }

    pub fn application(&self, index: usize) -> &ApplicationActor {
        &self.applications[index % self.applications.len()]
    }

    /// Stake for pool slot `index`, paid by its owner.
    pub async fn stake(&mut self, index: usize, amount: Amount) -> tstake::Result<()> {
        let actors = self.provider(index);
        self.staking
            .stake(&actors.owner, actors.provider, actors.beneficiary, actors.authorizer, amount)
            .await
    }

    /// Sum of T stake over all providers.
    pub fn total_t_stake(&self) -> Amount {
        self.staking
            .state()
            .stakes
            .iter()
            .map(|(_, p)| p.t_stake)
            .sum()
    }

    /// Custody holds the T stakes plus the notifiers treasury, less the
    /// processor rewards nothing backed.
    pub fn custody_matches_ledger(&self) -> bool {
        self.token.custody() + self.unbacked_rewards
            == self.total_t_stake() + self.staking.notifiers_treasury()
    }

    /// Run one generated operation.
    pub async fn apply(&mut self, op: &Op) -> tstake::Result<()> {
        match op {
            Op::Stake { provider, amount } => self.stake(*provider, *amount).await,
            Op::TopUp { provider, amount } => {
                let actors = self.provider(*provider);
                self.staking
                    .top_up(&self.funder, actors.provider, *amount)
                    .await
            }
            Op::UnstakeT { provider, amount } => {
                let actors = self.provider(*provider);
                self.staking
                    .unstake_t(&actors.owner, actors.provider, *amount)
                    .await
            }
            Op::ImportLegacy {
                provider,
                stake_type,
                amount,
            } => {
                let actors = self.provider(*provider);
                self.staking.import_legacy_stake(
                    &self.governance,
                    actors.provider,
                    actors.roles(),
                    *stake_type,
                    *amount,
                )
            }
            Op::UnstakeLegacy {
                provider,
                stake_type,
            } => {
                let actors = self.provider(*provider);
                let released = match stake_type {
                    StakeType::Keep => self.staking.unstake_keep(&actors.owner, actors.provider),
                    _ => self.staking.unstake_nu(&actors.owner, actors.provider),
                };
                released.map(|_| ())
            }
            Op::UnstakeAll { provider } => {
                let actors = self.provider(*provider);
                self.staking
                    .unstake_all(&actors.owner, actors.provider)
                    .await
            }
            Op::IncreaseAuthorization {
                provider,
                application,
                amount,
            } => {
                let actors = self.provider(*provider);
                let app = self.application(*application).address;
                self.staking
                    .increase_authorization(&actors.authorizer, actors.provider, app, *amount)
                    .await
            }
            Op::RequestDecrease {
                provider,
                application,
                amount,
            } => {
                let actors = self.provider(*provider);
                let app = self.application(*application).address;
                self.staking
                    .request_authorization_decrease(&actors.authorizer, actors.provider, app, *amount)
                    .await
                    .map(|_| ())
            }
            Op::RequestDecreaseAll { provider } => {
                let actors = self.provider(*provider);
                self.staking
                    .request_authorization_decrease_all(&actors.authorizer, actors.provider)
                    .await
            }
            Op::ApproveDecrease {
                provider,
                application,
            } => {
                let actors = self.provider(*provider);
                let app = self.application(*application).address;
                self.staking
                    .approve_authorization_decrease(&app, actors.provider)
                    .map(|_| ())
            }
            Op::ForceDecrease {
                provider,
                application,
            } => {
                let actors = self.provider(*provider);
                let app = self.application(*application).address;
                self.staking
                    .force_decrease_authorization(&self.processor, actors.provider, app)
                    .map(|_| ())
            }
            Op::Pause { application } => {
                let app = self.application(*application).clone();
                self.staking
                    .pause_application(&app.panic_button, app.address)
            }
            Op::Disable { application } => {
                let app = self.application(*application).address;
                self.staking.disable_application(&self.governance, app)
            }
            Op::Approve { application } => {
                let app = self.application(*application).clone();
                self.staking
                    .approve_application(&self.governance, app.address, app.handle)
            }
            Op::Slash {
                application,
                providers,
                amount,
            } => {
                let app = self.application(*application).address;
                let targets = self.targets(providers);
                self.staking.slash(&app, *amount, &targets)
            }
            Op::Seize {
                application,
                providers,
                amount,
                multiplier,
            } => {
                let app = self.application(*application).address;
                let targets = self.targets(providers);
                self.staking
                    .seize(&app, *amount, *multiplier, self.notifier, &targets)
            }
            Op::ProcessSlashing { count } => {
                let report = self
                    .staking
                    .process_slashing(&self.processor, *count)
                    .await?;
                self.unbacked_rewards += report.unbacked_reward;
                Ok(())
            }
            Op::PushReward { amount } => {
                self.staking
                    .push_notification_reward(&self.funder, *amount)
                    .await
            }
            Op::WithdrawReward { amount } => {
                self.staking
                    .withdraw_notification_reward(&self.governance, self.funder, *amount)
                    .await
            }
            Op::SetCeiling { ceiling } => self
                .staking
                .set_authorization_ceiling(&self.governance, *ceiling),
            Op::AdvanceClock { seconds } => {
                self.clock.advance(*seconds);
                Ok(())
            }
            Op::RejectCallbacks {
                application,
                reject,
            } => {
                let handle = &self.application(*application).handle;
                handle.reject_increases(*reject);
                handle.reject_decrease_requests(*reject);
                handle.reject_involuntary(*reject);
                Ok(())
            }
        }
    }

    fn targets(&self, providers: &[usize]) -> Vec<Address> {
        providers.iter().map(|i| self.provider(*i).provider).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_approves_pool() {
        let fixture = StakingFixture::new(StakingConfig::new(governance())).unwrap();
        assert_eq!(fixture.staking.applications_len(), APPLICATIONS);
        assert!(fixture.staking.events().is_empty());
        assert!(fixture.custody_matches_ledger());
    }

    #[test]
    fn test_actors_are_deterministic() {
        assert_eq!(ProviderActors::derive(1), ProviderActors::derive(1));
        assert_ne!(ProviderActors::derive(1).provider, ProviderActors::derive(2).provider);
    }

    #[tokio::test]
    async fn test_with_stakes() {
        let fixture = StakingFixture::with_stakes(StakingConfig::new(governance()), 500)
            .await
            .unwrap();
        assert_eq!(fixture.total_t_stake(), 500 * PROVIDERS as Amount);
        assert!(fixture.custody_matches_ledger());
        assert_eq!(
            fixture.token.balance_of(&fixture.provider(0).owner),
            INITIAL_BALANCE - 500
        );
    }
}

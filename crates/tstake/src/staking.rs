//! The staking engine.
//!
//! [`TokenStaking`] owns the ledger state and drives the collaborators:
//! tokens move in and out of custody through the [`Token`], and
//! applications are told about authorization changes through their
//! [`Application`] handles.
//!
//! Every public operation is atomic. The state is snapshotted first (an
//! O(1) clone of persistent maps) and put back if anything fails, including
//! a token transfer or a required application callback. Only the documented
//! best-effort notifications may fail without undoing the operation.

use std::collections::HashMap;
use std::sync::Arc;

use tstake_core::{
    Address, Amount, ApplicationInfo, ApplicationStatus, DecreaseRequest, LedgerState,
    PendingDecrease, Roles, SlashingEvent, SlashingReport, StakeType, StakingError,
    StakingProvider,
};
use tstake_store::{Checkpoint, Store};

use crate::clock::{Clock, SystemClock};
use crate::collaborator::{Application, Token};
use crate::config::StakingConfig;
use crate::error::{Result, StakingEngineError};
use crate::events::StakingEvent;

/// State to return to if an operation fails.
struct Snapshot {
    state: LedgerState,
    events: usize,
}

/// The token staking engine.
pub struct TokenStaking {
    /// The ledger.
    state: LedgerState,
    /// Token held in custody.
    token: Arc<dyn Token>,
    /// Time source.
    clock: Arc<dyn Clock>,
    /// Callback handles, keyed by application address.
    applications: HashMap<Address, Arc<dyn Application>>,
    /// Events of successful operations, oldest first.
    events: Vec<StakingEvent>,
}

impl TokenStaking {
    /// Create an empty ledger using the system clock.
    pub fn new(config: StakingConfig, token: Arc<dyn Token>) -> Result<Self> {
        Self::with_clock(config, token, Arc::new(SystemClock))
    }

    /// Create an empty ledger with an explicit clock.
    pub fn with_clock(config: StakingConfig, token: Arc<dyn Token>, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.governance.is_zero() {
            return Err(StakingError::ZeroAddress.into());
        }
        let mut state = LedgerState::new(config.parameters());
        state
            .treasury
            .set_notification_reward(config.notification_reward);
        Ok(Self::restore(state, token, clock))
    }

    /// Wrap an existing ledger state.
    ///
    /// Application handles are not part of the state; re-bind them with
    /// [`TokenStaking::attach_application`].
    pub fn restore(state: LedgerState, token: Arc<dyn Token>, clock: Arc<dyn Clock>) -> Self {
        Self {
            state,
            token,
            clock,
            applications: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Load the latest saved ledger from `store`.
    pub async fn load_from<S: Store + ?Sized>(
        store: &S,
        token: Arc<dyn Token>,
        clock: Arc<dyn Clock>,
    ) -> Result<Option<Self>> {
        let state = store.load_state().await?;
        Ok(state.map(|state| Self::restore(state, token, clock)))
    }

    /// Save the ledger to `store`.
    pub async fn save_to<S: Store + ?Sized>(&self, store: &S) -> Result<Checkpoint> {
        let checkpoint = store.save_state(&self.state, self.clock.now()).await?;
        tracing::info!(
            version = checkpoint.version,
            hash = %checkpoint.state_hash,
            "ledger saved"
        );
        Ok(checkpoint)
    }

    /// Bind the callback handle of an application.
    pub fn attach_application(&mut self, application: Address, handle: Arc<dyn Application>) {
        self.applications.insert(application, handle);
    }

    /// The ledger state.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Events recorded so far.
    pub fn events(&self) -> &[StakingEvent] {
        &self.events
    }

    /// Take all recorded events.
    pub fn drain_events(&mut self) -> Vec<StakingEvent> {
        std::mem::take(&mut self.events)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Atomicity
    // ─────────────────────────────────────────────────────────────────────────

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            events: self.events.len(),
        }
    }

    fn settle<T>(&mut self, snapshot: Snapshot, operation: &'static str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::warn!("{} rolled back: {}", operation, e);
            self.state = snapshot.state;
            self.events.truncate(snapshot.events);
        }
        result
    }

    fn atomically<T>(&mut self, operation: &'static str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let snapshot = self.snapshot();
        let result = f(self);
        self.settle(snapshot, operation, result)
    }

    fn emit(&mut self, event: StakingEvent) {
        self.events.push(event);
    }

    fn handle(&self, application: &Address) -> Result<Arc<dyn Application>> {
        self.applications
            .get(application)
            .cloned()
            .ok_or(StakingEngineError::ApplicationUnreachable(*application))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Stake Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register `provider` owned by `caller` and stake `amount` of T.
    pub async fn stake(
        &mut self,
        caller: &Address,
        provider: Address,
        beneficiary: Address,
        authorizer: Address,
        amount: Amount,
    ) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self
            .stake_inner(caller, provider, beneficiary, authorizer, amount)
            .await;
        self.settle(snapshot, "stake", result)
    }

    async fn stake_inner(
        &mut self,
        caller: &Address,
        provider: Address,
        beneficiary: Address,
        authorizer: Address,
        amount: Amount,
    ) -> Result<()> {
        let now = self.clock.now();
        self.state
            .stake(caller, provider, beneficiary, authorizer, amount, now)?;
        self.token.transfer_from(caller, amount).await?;

        tracing::debug!(provider = %provider, amount, "staked");
        self.emit(StakingEvent::Staked {
            provider,
            owner: *caller,
            beneficiary,
            authorizer,
            amount,
        });
        Ok(())
    }

    /// Add T stake to an existing provider, paid by `caller`.
    pub async fn top_up(&mut self, caller: &Address, provider: Address, amount: Amount) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self.top_up_inner(caller, provider, amount).await;
        self.settle(snapshot, "top_up", result)
    }

    async fn top_up_inner(&mut self, caller: &Address, provider: Address, amount: Amount) -> Result<()> {
        self.state.top_up(&provider, amount)?;
        self.token.transfer_from(caller, amount).await?;

        tracing::debug!(provider = %provider, amount, "topped up");
        self.emit(StakingEvent::ToppedUp { provider, amount });
        Ok(())
    }

    /// Withdraw `amount` of T stake to the owner.
    pub async fn unstake_t(&mut self, caller: &Address, provider: Address, amount: Amount) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self.unstake_t_inner(caller, provider, amount).await;
        self.settle(snapshot, "unstake_t", result)
    }

    async fn unstake_t_inner(&mut self, caller: &Address, provider: Address, amount: Amount) -> Result<()> {
        let now = self.clock.now();
        let owner = self.state.unstake_t(caller, &provider, amount, now)?;
        self.token.transfer(&owner, amount).await?;

        tracing::debug!(provider = %provider, amount, "unstaked T");
        self.emit(StakingEvent::Unstaked {
            provider,
            stake_type: StakeType::T,
            amount,
        });
        Ok(())
    }

    /// Release the whole legacy Keep stake.
    pub fn unstake_keep(&mut self, caller: &Address, provider: Address) -> Result<Amount> {
        self.unstake_legacy(caller, provider, StakeType::Keep)
    }

    /// Release the whole legacy Nu stake.
    pub fn unstake_nu(&mut self, caller: &Address, provider: Address) -> Result<Amount> {
        self.unstake_legacy(caller, provider, StakeType::Nu)
    }

    fn unstake_legacy(&mut self, caller: &Address, provider: Address, stake_type: StakeType) -> Result<Amount> {
        self.atomically("unstake_legacy", |this| {
            let amount = this.state.unstake_legacy(caller, &provider, stake_type)?;
            tracing::debug!(provider = %provider, %stake_type, amount, "unstaked legacy stake");
            this.emit(StakingEvent::Unstaked {
                provider,
                stake_type,
                amount,
            });
            Ok(amount)
        })
    }

    /// Release every denomination. Fails while any application is authorized.
    pub async fn unstake_all(&mut self, caller: &Address, provider: Address) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self.unstake_all_inner(caller, provider).await;
        self.settle(snapshot, "unstake_all", result)
    }

    async fn unstake_all_inner(&mut self, caller: &Address, provider: Address) -> Result<()> {
        let now = self.clock.now();
        let released = self.state.unstake_all(caller, &provider, now)?;
        if released.t > 0 {
            self.token.transfer(&released.owner, released.t).await?;
        }

        tracing::debug!(provider = %provider, "unstaked all");
        for (stake_type, amount) in [
            (StakeType::T, released.t),
            (StakeType::Keep, released.keep),
            (StakeType::Nu, released.nu),
        ] {
            if amount > 0 {
                self.emit(StakingEvent::Unstaked {
                    provider,
                    stake_type,
                    amount,
                });
            }
        }
        Ok(())
    }

    /// Credit migrated Keep or Nu stake. Governance only.
    pub fn import_legacy_stake(
        &mut self,
        caller: &Address,
        provider: Address,
        roles: Roles,
        stake_type: StakeType,
        amount: Amount,
    ) -> Result<()> {
        let now = self.clock.now();
        self.atomically("import_legacy_stake", |this| {
            this.state
                .import_legacy_stake(caller, provider, roles, stake_type, amount, now)?;
            tracing::info!(provider = %provider, %stake_type, amount, "imported legacy stake");
            this.emit(StakingEvent::LegacyStakeImported {
                provider,
                stake_type,
                amount,
            });
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Application Registry
    // ─────────────────────────────────────────────────────────────────────────

    /// Approve `application` and bind its handle. Governance only.
    pub fn approve_application(
        &mut self,
        caller: &Address,
        application: Address,
        handle: Arc<dyn Application>,
    ) -> Result<()> {
        self.atomically("approve_application", |this| {
            this.state.approve_application(caller, application)?;
            this.applications.insert(application, handle);
            tracing::info!(application = %application, "application approved");
            this.emit(StakingEvent::ApplicationStatusChanged {
                application,
                status: ApplicationStatus::Approved,
            });
            Ok(())
        })
    }

    /// Pause `application`. Panic button only.
    pub fn pause_application(&mut self, caller: &Address, application: Address) -> Result<()> {
        self.atomically("pause_application", |this| {
            this.state.pause_application(caller, application)?;
            tracing::info!(application = %application, "application paused");
            this.emit(StakingEvent::ApplicationStatusChanged {
                application,
                status: ApplicationStatus::Paused,
            });
            Ok(())
        })
    }

    /// Disable `application` for good. Governance only.
    pub fn disable_application(&mut self, caller: &Address, application: Address) -> Result<()> {
        self.atomically("disable_application", |this| {
            this.state.disable_application(caller, application)?;
            tracing::info!(application = %application, "application disabled");
            this.emit(StakingEvent::ApplicationStatusChanged {
                application,
                status: ApplicationStatus::Disabled,
            });
            Ok(())
        })
    }

    /// Assign the panic button of `application`. Governance only.
    pub fn set_panic_button(&mut self, caller: &Address, application: Address, panic_button: Address) -> Result<()> {
        self.atomically("set_panic_button", |this| {
            this.state
                .set_panic_button(caller, application, panic_button)?;
            tracing::info!(application = %application, panic_button = %panic_button, "panic button set");
            this.emit(StakingEvent::PanicButtonSet {
                application,
                panic_button,
            });
            Ok(())
        })
    }

    /// Set the max number of applications per provider. Governance only.
    pub fn set_authorization_ceiling(&mut self, caller: &Address, ceiling: usize) -> Result<()> {
        self.atomically("set_authorization_ceiling", |this| {
            this.state.set_authorization_ceiling(caller, ceiling)?;
            tracing::info!(ceiling, "authorization ceiling set");
            this.emit(StakingEvent::AuthorizationCeilingSet { ceiling });
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authorization
    // ─────────────────────────────────────────────────────────────────────────

    /// Raise `application`'s authorization against `provider` by `amount`.
    ///
    /// The application is told after the state changes; if it refuses, the
    /// increase is undone.
    pub async fn increase_authorization(
        &mut self,
        caller: &Address,
        provider: Address,
        application: Address,
        amount: Amount,
    ) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self
            .increase_authorization_inner(caller, provider, application, amount)
            .await;
        self.settle(snapshot, "increase_authorization", result)
    }

    async fn increase_authorization_inner(
        &mut self,
        caller: &Address,
        provider: Address,
        application: Address,
        amount: Amount,
    ) -> Result<()> {
        let (from, to) = self
            .state
            .increase_authorization(caller, provider, application, amount)?;
        self.handle(&application)?
            .authorization_increased(&provider, from, to)
            .await
            .map_err(|reason| StakingEngineError::ApplicationRejected {
                application,
                reason,
            })?;

        tracing::debug!(provider = %provider, application = %application, from, to, "authorization increased");
        self.emit(StakingEvent::AuthorizationIncreased {
            provider,
            application,
            from,
            to,
        });
        Ok(())
    }

    /// Ask to lower `application`'s authorization by `amount`.
    ///
    /// The application is asked first and the request is recorded only if
    /// it agrees. Disabled applications are not asked; the decrease applies
    /// at once.
    pub async fn request_authorization_decrease(
        &mut self,
        caller: &Address,
        provider: Address,
        application: Address,
        amount: Amount,
    ) -> Result<DecreaseRequest> {
        let snapshot = self.snapshot();
        let result = self
            .request_authorization_decrease_inner(caller, provider, application, amount)
            .await;
        self.settle(snapshot, "request_authorization_decrease", result)
    }

    async fn request_authorization_decrease_inner(
        &mut self,
        caller: &Address,
        provider: Address,
        application: Address,
        amount: Amount,
    ) -> Result<DecreaseRequest> {
        let request = self
            .state
            .check_decrease_request(caller, &provider, &application, amount)?;
        let now = self.clock.now();

        if request.status == ApplicationStatus::Disabled {
            self.state
                .request_authorization_decrease(caller, provider, application, amount, now)?;
            tracing::debug!(provider = %provider, application = %application, "decrease applied to disabled application");
            self.emit(StakingEvent::AuthorizationDecreaseApproved {
                provider,
                application,
                from: request.from,
                to: request.to,
            });
            return Ok(request);
        }

        let handle = self.handle(&application)?;
        if let Err(reason) = handle
            .authorization_decrease_requested(&provider, request.from, request.to)
            .await
        {
            if request.replaces_pending {
                return Err(StakingError::PendingDecreaseConflict {
                    provider,
                    application,
                }
                .into());
            }
            return Err(StakingEngineError::ApplicationRejected {
                application,
                reason,
            });
        }

        self.state
            .request_authorization_decrease(caller, provider, application, amount, now)?;
        tracing::debug!(provider = %provider, application = %application, amount, "authorization decrease requested");
        self.emit(StakingEvent::AuthorizationDecreaseRequested {
            provider,
            application,
            from: request.from,
            to: request.to,
        });
        Ok(request)
    }

    /// Request a full decrease for every application `provider` is
    /// authorized for.
    ///
    /// Existing requests are replaced. Applications are notified on a
    /// best-effort basis; a refusal is logged and the request stands.
    pub async fn request_authorization_decrease_all(&mut self, caller: &Address, provider: Address) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self
            .request_authorization_decrease_all_inner(caller, provider)
            .await;
        self.settle(snapshot, "request_authorization_decrease_all", result)
    }

    async fn request_authorization_decrease_all_inner(&mut self, caller: &Address, provider: Address) -> Result<()> {
        let now = self.clock.now();
        let requested = self
            .state
            .request_authorization_decrease_all(caller, provider, now)?;

        for (change, status) in requested {
            let application = change.application;
            if status == ApplicationStatus::Disabled {
                self.emit(StakingEvent::AuthorizationDecreaseApproved {
                    provider,
                    application,
                    from: change.from,
                    to: 0,
                });
                continue;
            }

            match self.applications.get(&application).cloned() {
                Some(handle) => {
                    if let Err(e) = handle
                        .authorization_decrease_requested(&provider, change.from, 0)
                        .await
                    {
                        tracing::warn!("application {} refused decrease request for {}: {}", application, provider, e);
                    }
                }
                None => tracing::warn!("application {} is not attached, decrease request not delivered", application),
            }
            self.emit(StakingEvent::AuthorizationDecreaseRequested {
                provider,
                application,
                from: change.from,
                to: 0,
            });
        }
        Ok(())
    }

    /// Apply the pending decrease. `caller` is the application.
    /// Returns the authorization after the decrease.
    pub fn approve_authorization_decrease(&mut self, caller: &Address, provider: Address) -> Result<Amount> {
        self.atomically("approve_authorization_decrease", |this| {
            let (from, to) = this.state.approve_authorization_decrease(caller, provider)?;
            tracing::debug!(provider = %provider, application = %caller, from, to, "authorization decrease approved");
            this.emit(StakingEvent::AuthorizationDecreaseApproved {
                provider,
                application: *caller,
                from,
                to,
            });
            Ok(to)
        })
    }

    /// Zero the authorization of a paused or disabled application.
    ///
    /// Anyone may call; the application is not notified.
    pub fn force_decrease_authorization(&mut self, caller: &Address, provider: Address, application: Address) -> Result<Amount> {
        self.atomically("force_decrease_authorization", |this| {
            let from = this
                .state
                .force_decrease_authorization(provider, application)?;
            tracing::info!(
                provider = %provider,
                application = %application,
                caller = %caller,
                amount = from,
                "authorization force-decreased"
            );
            this.emit(StakingEvent::AuthorizationInvoluntaryDecreased {
                provider,
                application,
                from,
                to: 0,
                notified: false,
            });
            Ok(from)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Slashing
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue a slash of `amount` against each of `providers`. `caller` is
    /// the application.
    pub fn slash(&mut self, caller: &Address, amount: Amount, providers: &[Address]) -> Result<()> {
        self.atomically("slash", |this| {
            this.state.slash(caller, amount, providers)?;
            this.emit_queued(caller, amount, None, providers);
            Ok(())
        })
    }

    /// Queue a slash that rewards `notifier` with `reward_multiplier`
    /// percent of the notification reward.
    pub fn seize(
        &mut self,
        caller: &Address,
        amount: Amount,
        reward_multiplier: u8,
        notifier: Address,
        providers: &[Address],
    ) -> Result<()> {
        self.atomically("seize", |this| {
            this.state
                .seize(caller, amount, reward_multiplier, notifier, providers)?;
            this.emit_queued(caller, amount, Some(notifier), providers);
            Ok(())
        })
    }

    fn emit_queued(&mut self, application: &Address, amount: Amount, notifier: Option<Address>, providers: &[Address]) {
        tracing::debug!(application = %application, amount, count = providers.len(), "slashing queued");
        for provider in providers {
            self.emit(StakingEvent::SlashingQueued {
                application: *application,
                provider: *provider,
                amount,
                notifier,
            });
        }
    }

    /// Apply up to `count` queued slashes, paying `caller` a share of what
    /// was slashed and notifiers their rewards.
    pub async fn process_slashing(&mut self, caller: &Address, count: usize) -> Result<SlashingReport> {
        let snapshot = self.snapshot();
        let result = self.process_slashing_inner(caller, count).await;
        self.settle(snapshot, "process_slashing", result)
    }

    async fn process_slashing_inner(&mut self, caller: &Address, count: usize) -> Result<SlashingReport> {
        let mut report = self.state.process_slashing(count)?;
        if report.processor_reward > 0 {
            self.token.transfer(caller, report.processor_reward).await?;
        }
        if report.unbacked_reward > 0 {
            tracing::warn!(
                "processor reward exceeds slashed T and treasury by {}, paid from custody",
                report.unbacked_reward
            );
        }

        for outcome in &report.outcomes {
            let provider = outcome.event.provider;
            for change in &outcome.changes {
                let notified = match self.applications.get(&change.application).cloned() {
                    Some(handle) => match handle
                        .involuntary_authorization_decrease(&provider, change.from, change.to)
                        .await
                    {
                        Ok(()) => true,
                        Err(e) => {
                            tracing::warn!("application {} failed involuntary decrease notice for {}: {}", change.application, provider, e);
                            false
                        }
                    },
                    None => {
                        tracing::warn!("application {} is not attached, involuntary decrease not delivered", change.application);
                        false
                    }
                };
                self.emit(StakingEvent::AuthorizationInvoluntaryDecreased {
                    provider,
                    application: change.application,
                    from: change.from,
                    to: change.to,
                    notified,
                });
            }
        }

        for outcome in report.outcomes.iter_mut() {
            let Some(notifier) = outcome.event.notifier else {
                continue;
            };
            if outcome.notifier_reward == 0 {
                continue;
            }
            match self.token.transfer(&notifier, outcome.notifier_reward).await {
                Ok(()) => self.emit(StakingEvent::NotifierRewarded {
                    notifier,
                    amount: outcome.notifier_reward,
                }),
                Err(e) => {
                    tracing::warn!("notifier reward to {} failed, returned to treasury: {}", notifier, e);
                    self.state.treasury.deposit(outcome.notifier_reward)?;
                    outcome.notifier_reward = 0;
                }
            }
        }

        tracing::info!(
            processed = report.processed(),
            total_slashed = report.total_slashed,
            processor_reward = report.processor_reward,
            remaining = self.state.slashing.len(),
            "slashing processed"
        );
        self.emit(StakingEvent::SlashingProcessed {
            processor: *caller,
            count: report.processed(),
            total_slashed: report.total_slashed,
            processor_reward: report.processor_reward,
        });
        Ok(report)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Notifiers Treasury
    // ─────────────────────────────────────────────────────────────────────────

    /// Set the full notifier reward. Governance only.
    pub fn set_notification_reward(&mut self, caller: &Address, reward: Amount) -> Result<()> {
        self.atomically("set_notification_reward", |this| {
            this.state.set_notification_reward(caller, reward)?;
            tracing::info!(reward, "notification reward set");
            this.emit(StakingEvent::NotificationRewardSet { reward });
            Ok(())
        })
    }

    /// Fund the treasury with tokens from `caller`.
    pub async fn push_notification_reward(&mut self, caller: &Address, amount: Amount) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self.push_notification_reward_inner(caller, amount).await;
        self.settle(snapshot, "push_notification_reward", result)
    }

    async fn push_notification_reward_inner(&mut self, caller: &Address, amount: Amount) -> Result<()> {
        let balance = self.state.push_notification_reward(amount)?;
        self.token.transfer_from(caller, amount).await?;

        tracing::debug!(from = %caller, amount, balance, "notification reward pushed");
        self.emit(StakingEvent::NotificationRewardPushed {
            from: *caller,
            amount,
        });
        Ok(())
    }

    /// Pay treasury funds to `recipient`. Governance only.
    pub async fn withdraw_notification_reward(&mut self, caller: &Address, recipient: Address, amount: Amount) -> Result<()> {
        let snapshot = self.snapshot();
        let result = self
            .withdraw_notification_reward_inner(caller, recipient, amount)
            .await;
        self.settle(snapshot, "withdraw_notification_reward", result)
    }

    async fn withdraw_notification_reward_inner(&mut self, caller: &Address, recipient: Address, amount: Amount) -> Result<()> {
        self.state
            .withdraw_notification_reward(caller, &recipient, amount)?;
        self.token.transfer(&recipient, amount).await?;

        tracing::info!(recipient = %recipient, amount, "notification reward withdrawn");
        self.emit(StakingEvent::NotificationRewardWithdrawn { recipient, amount });
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance
    // ─────────────────────────────────────────────────────────────────────────

    /// Governance only: set the minimum T stake a provider must keep.
    pub fn set_minimum_stake_amount(&mut self, caller: &Address, amount: Amount) -> Result<()> {
        self.atomically("set_minimum_stake_amount", |this| {
            this.state.set_minimum_stake_amount(caller, amount)?;
            tracing::info!(amount, "minimum stake amount set");
            this.emit(StakingEvent::MinimumStakeAmountSet { amount });
            Ok(())
        })
    }

    /// Governance only: set how long a fresh stake is locked before T can be unstaked.
    pub fn set_min_stake_time(&mut self, caller: &Address, seconds: u64) -> Result<()> {
        self.atomically("set_min_stake_time", |this| {
            this.state.set_min_stake_time(caller, seconds)?;
            tracing::info!(seconds, "minimum stake time set");
            this.emit(StakingEvent::MinStakeTimeSet { seconds });
            Ok(())
        })
    }

    /// Governance only: hand governance to a new non-zero address.
    pub fn transfer_governance(&mut self, caller: &Address, new_governance: Address) -> Result<()> {
        self.atomically("transfer_governance", |this| {
            this.state.transfer_governance(caller, new_governance)?;
            tracing::info!(from = %caller, to = %new_governance, "governance transferred");
            this.emit(StakingEvent::GovernanceTransferred {
                from: *caller,
                to: new_governance,
            });
            Ok(())
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Views
    // ─────────────────────────────────────────────────────────────────────────

    /// Current governance address.
    pub fn governance(&self) -> Address {
        self.state.params.governance
    }

    /// The provider's stake record, if it has staked or imported.
    pub fn stakes(&self, provider: &Address) -> Option<&StakingProvider> {
        self.state.stakes.get(provider)
    }

    /// Owner, beneficiary and authorizer of a provider.
    pub fn roles_of(&self, provider: &Address) -> Option<Roles> {
        self.stakes(provider).map(|p| p.roles)
    }

    /// When the provider's stake record was created.
    pub fn start_staking_timestamp(&self, provider: &Address) -> Option<u64> {
        self.stakes(provider).map(|p| p.start_staking_timestamp)
    }

    /// T plus legacy stake of a provider.
    pub fn total_stake(&self, provider: &Address) -> Amount {
        self.state.total_stake(provider)
    }

    /// The part of `stake_type` stake that authorizations keep locked.
    pub fn min_staked(&self, provider: &Address, stake_type: StakeType) -> Amount {
        self.state.min_staked(provider, stake_type)
    }

    /// Stake the provider has authorized for `application`.
    pub fn authorized_stake(&self, provider: &Address, application: &Address) -> Amount {
        self.state.authorizations.authorized(provider, application)
    }

    /// The decrease request awaiting approval, if any.
    pub fn pending_decrease(&self, provider: &Address, application: &Address) -> Option<PendingDecrease> {
        self.state.authorizations.pending(provider, application)
    }

    /// Applications the provider is authorized for, in first-authorization order.
    pub fn authorized_applications(&self, provider: &Address) -> Vec<Address> {
        self.state.authorizations.applications_of(provider)
    }

    /// The provider's largest authorization across applications.
    pub fn max_authorization(&self, provider: &Address) -> Amount {
        self.state.max_authorization(provider)
    }

    /// How much more the provider can authorize for `application`.
    pub fn available_to_authorize(&self, provider: &Address, application: &Address) -> Amount {
        self.state.available_to_authorize(provider, application)
    }

    /// Status and panic button of an application.
    pub fn application_info(&self, application: &Address) -> ApplicationInfo {
        self.state.applications.info(application)
    }

    /// Number of applications ever approved.
    pub fn applications_len(&self) -> usize {
        self.state.applications.applications_len()
    }

    /// Application at `index`, in first-approval order.
    pub fn application_at(&self, index: usize) -> Option<Address> {
        self.state.applications.application_at(index)
    }

    /// Slashing events still waiting to be processed.
    pub fn slashing_queue_len(&self) -> usize {
        self.state.slashing.len()
    }

    /// Queued slashing event at `index`, counted from the queue head.
    pub fn slashing_event(&self, index: usize) -> Option<&SlashingEvent> {
        self.state.slashing.get(index)
    }

    /// Balance of the notifiers treasury.
    pub fn notifiers_treasury(&self) -> Amount {
        self.state.treasury.balance()
    }

    /// Per-notifier reward before the seize multiplier.
    pub fn notification_reward(&self) -> Amount {
        self.state.treasury.notification_reward()
    }
}

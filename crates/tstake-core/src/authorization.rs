//! Authorization ledger: bounded claims applications hold on provider stake.
//!
//! An entry for a `(provider, application)` pair exists exactly while the
//! authorized amount is non-zero. Each provider also keeps the list of
//! applications it is authorized for, in the order they were first
//! authorized; the list bounds every per-provider loop and is what the
//! authorization ceiling counts.

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use crate::application::ApplicationStatus;
use crate::error::{Result, Role, StakingError};
use crate::state::LedgerState;
use crate::types::{Address, Amount, Timestamp};

/// An outstanding decrease request awaiting application approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDecrease {
    pub amount: Amount,
    pub requested_at: Timestamp,
}

/// Authorization of one application against one provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub authorized: Amount,
    pub pending: Option<PendingDecrease>,
}

/// A change to one authorization made without the application's consent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationChange {
    pub application: Address,
    pub from: Amount,
    pub to: Amount,
}

/// A validated decrease request, not yet recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecreaseRequest {
    pub from: Amount,
    pub to: Amount,
    pub status: ApplicationStatus,
    /// Whether an earlier request for the same pair is still pending.
    pub replaces_pending: bool,
}

/// All authorizations, keyed by `(provider, application)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationLedger {
    authorizations: OrdMap<(Address, Address), Authorization>,
    authorized_applications: OrdMap<Address, Vector<Address>>,
}

impl AuthorizationLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// The authorization of `application` against `provider`, if any.
    pub fn get(&self, provider: &Address, application: &Address) -> Option<&Authorization> {
        self.authorizations.get(&(*provider, *application))
    }

    /// Authorized amount (zero if none).
    pub fn authorized(&self, provider: &Address, application: &Address) -> Amount {
        self.get(provider, application)
            .map(|a| a.authorized)
            .unwrap_or(0)
    }

    /// Pending decrease for the pair, if any.
    pub fn pending(&self, provider: &Address, application: &Address) -> Option<PendingDecrease> {
        self.get(provider, application).and_then(|a| a.pending)
    }

    /// Applications the provider is authorized for, in first-authorization order.
    pub fn applications_of(&self, provider: &Address) -> Vec<Address> {
        self.authorized_applications
            .get(provider)
            .map(|apps| apps.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of applications the provider is authorized for.
    pub fn application_count(&self, provider: &Address) -> usize {
        self.authorized_applications
            .get(provider)
            .map(Vector::len)
            .unwrap_or(0)
    }

    /// Largest authorized amount across the provider's applications.
    pub fn max_authorization(&self, provider: &Address) -> Amount {
        self.authorized_applications
            .get(provider)
            .into_iter()
            .flatten()
            .map(|app| self.authorized(provider, app))
            .max()
            .unwrap_or(0)
    }

    /// Providers holding at least one authorization.
    pub fn providers(&self) -> impl Iterator<Item = Address> + '_ {
        self.authorized_applications.keys().copied()
    }

    /// Iterate all entries with their position in the provider's list.
    pub fn iter(&self) -> impl Iterator<Item = (Address, Address, usize, &Authorization)> + '_ {
        self.authorized_applications
            .iter()
            .flat_map(move |(provider, apps)| {
                apps.iter().enumerate().filter_map(move |(index, app)| {
                    self.get(provider, app)
                        .map(|auth| (*provider, *app, index, auth))
                })
            })
    }

    /// Write an authorization. A zero amount removes the entry and the
    /// application from the provider's list.
    fn write(&mut self, provider: Address, application: Address, authorization: Authorization) {
        let key = (provider, application);
        if authorization.authorized == 0 {
            if self.authorizations.remove(&key).is_some() {
                self.unlist(&provider, &application);
            }
            return;
        }
        if self.authorizations.insert(key, authorization).is_none() {
            self.authorized_applications
                .entry(provider)
                .or_insert_with(Vector::new)
                .push_back(application);
        }
    }

    fn unlist(&mut self, provider: &Address, application: &Address) {
        let Some(apps) = self.authorized_applications.get_mut(provider) else {
            return;
        };
        apps.retain(|app| app != application);
        if apps.is_empty() {
            self.authorized_applications.remove(provider);
        }
    }

    /// Raise an authorization. Returns `(from, to)`.
    pub fn increase(&mut self, provider: Address, application: Address, amount: Amount) -> Result<(Amount, Amount)> {
        let mut auth = self.get(&provider, &application).copied().unwrap_or_default();
        let from = auth.authorized;
        auth.authorized = from.checked_add(amount).ok_or(StakingError::Overflow)?;
        let to = auth.authorized;
        self.write(provider, application, auth);
        Ok((from, to))
    }

    /// Record (or overwrite) a pending decrease.
    pub fn record_pending(&mut self, provider: Address, application: Address, amount: Amount, now: Timestamp) {
        if let Some(auth) = self.authorizations.get_mut(&(provider, application)) {
            auth.pending = Some(PendingDecrease {
                amount,
                requested_at: now,
            });
        }
    }

    /// Lower an authorization right away, clearing any pending request.
    /// Returns `(from, to)`.
    pub fn decrease_now(&mut self, provider: Address, application: Address, amount: Amount) -> (Amount, Amount) {
        let from = self.authorized(&provider, &application);
        let to = from.saturating_sub(amount);
        self.write(
            provider,
            application,
            Authorization {
                authorized: to,
                pending: None,
            },
        );
        (from, to)
    }

    /// Apply the pending decrease. Returns `(from, to)`.
    pub fn approve_pending(&mut self, provider: Address, application: Address) -> Result<(Amount, Amount)> {
        let pending = self
            .pending(&provider, &application)
            .ok_or(StakingError::NoPendingDecrease {
                provider,
                application,
            })?;
        Ok(self.decrease_now(provider, application, pending.amount))
    }

    /// Reduce every authorization of `provider` by `slashed`, then clamp it
    /// to `remaining_stake`. Pending decreases are clamped to the new amount.
    pub fn apply_slash(&mut self, provider: Address, slashed: Amount, remaining_stake: Amount) -> Vec<AuthorizationChange> {
        let mut changes = Vec::new();
        for application in self.applications_of(&provider) {
            let Some(mut auth) = self.get(&provider, &application).copied() else {
                continue;
            };
            let from = auth.authorized;
            let to = from.saturating_sub(slashed).min(remaining_stake);
            if to == from {
                continue;
            }
            auth.authorized = to;
            auth.pending = auth.pending.map(|p| PendingDecrease {
                amount: p.amount.min(to),
                ..p
            });
            self.write(provider, application, auth);
            changes.push(AuthorizationChange {
                application,
                from,
                to,
            });
        }
        changes
    }

    /// Rebuild the ledger from persisted rows, ordered per provider by list index.
    pub fn restore(rows: impl IntoIterator<Item = (Address, Address, Authorization)>) -> Self {
        let mut ledger = Self::new();
        for (provider, application, authorization) in rows {
            ledger.write(provider, application, authorization);
        }
        ledger
    }
}

impl LedgerState {
    fn require_authorizer(&self, caller: &Address, provider: &Address) -> Result<()> {
        let record = self
            .stakes
            .get(provider)
            .ok_or(StakingError::ProviderNotFound(*provider))?;
        if record.roles.authorizer != *caller {
            return Err(StakingError::Unauthorized {
                caller: *caller,
                role: Role::Authorizer,
            });
        }
        Ok(())
    }

    /// Grow `application`'s authorization against `provider` by `amount`.
    /// Returns `(from, to)`.
    pub fn increase_authorization(
        &mut self,
        caller: &Address,
        provider: Address,
        application: Address,
        amount: Amount,
    ) -> Result<(Amount, Amount)> {
        self.require_authorizer(caller, &provider)?;
        self.applications
            .require_status(&application, &[ApplicationStatus::Approved])?;
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }

        let is_new = self.authorizations.authorized(&provider, &application) == 0;
        let count = self.authorizations.application_count(&provider);
        if is_new && !self.params.ceiling_allows(count) {
            return Err(StakingError::CeilingExceeded {
                ceiling: self.params.authorization_ceiling,
            });
        }

        let available = self.available_to_authorize(&provider, &application);
        if amount > available {
            return Err(StakingError::InsufficientStake {
                available,
                requested: amount,
            });
        }

        self.authorizations.increase(provider, application, amount)
    }

    /// Validate a decrease request without recording it.
    pub fn check_decrease_request(
        &self,
        caller: &Address,
        provider: &Address,
        application: &Address,
        amount: Amount,
    ) -> Result<DecreaseRequest> {
        self.require_authorizer(caller, provider)?;
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }
        let authorized = self.authorizations.authorized(provider, application);
        if amount > authorized {
            return Err(StakingError::AmountExceedsAuthorized {
                authorized,
                requested: amount,
            });
        }
        Ok(DecreaseRequest {
            from: authorized,
            to: authorized - amount,
            status: self.applications.status(application),
            replaces_pending: self.authorizations.pending(provider, application).is_some(),
        })
    }

    /// Validate and record a decrease request.
    ///
    /// Disabled applications lose the amount immediately; otherwise the
    /// request waits for the application to approve it.
    pub fn request_authorization_decrease(
        &mut self,
        caller: &Address,
        provider: Address,
        application: Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<DecreaseRequest> {
        let request = self.check_decrease_request(caller, &provider, &application, amount)?;
        if request.status == ApplicationStatus::Disabled {
            self.authorizations.decrease_now(provider, application, amount);
        } else {
            self.authorizations
                .record_pending(provider, application, amount, now);
        }
        Ok(request)
    }

    /// Request a full decrease for every authorized application.
    ///
    /// Existing requests are overwritten. Returns one change per application
    /// with `to` set to zero; disabled ones are already zeroed.
    pub fn request_authorization_decrease_all(
        &mut self,
        caller: &Address,
        provider: Address,
        now: Timestamp,
    ) -> Result<Vec<(AuthorizationChange, ApplicationStatus)>> {
        self.require_authorizer(caller, &provider)?;
        let applications = self.authorizations.applications_of(&provider);
        if applications.is_empty() {
            return Err(StakingError::NothingAuthorized { provider });
        }

        let mut requested = Vec::with_capacity(applications.len());
        for application in applications {
            let from = self.authorizations.authorized(&provider, &application);
            let status = self.applications.status(&application);
            if status == ApplicationStatus::Disabled {
                self.authorizations.decrease_now(provider, application, from);
            } else {
                self.authorizations
                    .record_pending(provider, application, from, now);
            }
            requested.push((
                AuthorizationChange {
                    application,
                    from,
                    to: 0,
                },
                status,
            ));
        }
        Ok(requested)
    }

    /// Apply the pending decrease; `caller` is the application.
    /// Returns `(from, to)`.
    pub fn approve_authorization_decrease(&mut self, caller: &Address, provider: Address) -> Result<(Amount, Amount)> {
        self.authorizations.approve_pending(provider, *caller)
    }

    /// Zero the authorization of a paused or disabled application.
    /// Anyone may call. Returns the amount removed.
    pub fn force_decrease_authorization(&mut self, provider: Address, application: Address) -> Result<Amount> {
        self.applications.require_status(
            &application,
            &[ApplicationStatus::Paused, ApplicationStatus::Disabled],
        )?;
        let authorized = self.authorizations.authorized(&provider, &application);
        if authorized == 0 {
            return Err(StakingError::NothingAuthorized { provider });
        }
        self.authorizations
            .decrease_now(provider, application, authorized);
        Ok(authorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    struct Setup {
        state: LedgerState,
        governance: Address,
        provider: Address,
        authorizer: Address,
        app: Address,
    }

    fn setup(stake: Amount) -> Setup {
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
        Setup {
            state,
            governance,
            provider,
            authorizer,
            app,
        }
    }

    #[test]
    fn test_increase_updates_list_and_amount() {
        let mut s = setup(100);
        assert_eq!(
            s.state
                .increase_authorization(&s.authorizer, s.provider, s.app, 60)
                .unwrap(),
            (0, 60)
        );
        assert_eq!(
            s.state
                .increase_authorization(&s.authorizer, s.provider, s.app, 40)
                .unwrap(),
            (60, 100)
        );
        assert_eq!(s.state.authorizations.applications_of(&s.provider), vec![s.app]);
        assert_eq!(s.state.max_authorization(&s.provider), 100);
    }

    #[test]
    fn test_increase_checks() {
        let mut s = setup(100);
        let stranger = Address::derive("stranger");
        assert!(matches!(
            s.state.increase_authorization(&stranger, s.provider, s.app, 10),
            Err(StakingError::Unauthorized { role: Role::Authorizer, .. })
        ));
        assert_eq!(
            s.state.increase_authorization(&s.authorizer, s.provider, s.app, 0),
            Err(StakingError::ZeroAmount)
        );
        assert_eq!(
            s.state.increase_authorization(&s.authorizer, s.provider, s.app, 101),
            Err(StakingError::InsufficientStake { available: 100, requested: 101 })
        );

        let unknown = Address::derive("unknown-app");
        assert!(matches!(
            s.state.increase_authorization(&s.authorizer, s.provider, unknown, 10),
            Err(StakingError::InvalidApplicationState { status: ApplicationStatus::Unapproved, .. })
        ));
    }

    #[test]
    fn test_each_application_is_capped_by_whole_stake() {
        let mut s = setup(100);
        let other = Address::derive("other-app");
        s.state.approve_application(&s.governance, other).unwrap();

        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 100)
            .unwrap();
        s.state
            .increase_authorization(&s.authorizer, s.provider, other, 100)
            .unwrap();
        assert_eq!(s.state.available_to_authorize(&s.provider, &s.app), 0);
        assert!(s.state.invariant_violations().is_empty());
    }

    #[test]
    fn test_ceiling_blocks_new_applications_only() {
        let mut s = setup(100);
        let other = Address::derive("other-app");
        s.state.approve_application(&s.governance, other).unwrap();
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 10)
            .unwrap();
        s.state.set_authorization_ceiling(&s.governance, 1).unwrap();

        assert_eq!(
            s.state.increase_authorization(&s.authorizer, s.provider, other, 10),
            Err(StakingError::CeilingExceeded { ceiling: 1 })
        );
        // Existing application may still grow.
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 10)
            .unwrap();
    }

    #[test]
    fn test_request_and_approve_decrease() {
        let mut s = setup(100);
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 80)
            .unwrap();

        let request = s
            .state
            .request_authorization_decrease(&s.authorizer, s.provider, s.app, 30, 7)
            .unwrap();
        assert_eq!(request.from, 80);
        assert_eq!(request.to, 50);
        assert!(!request.replaces_pending);
        assert_eq!(
            s.state.authorizations.pending(&s.provider, &s.app),
            Some(PendingDecrease { amount: 30, requested_at: 7 })
        );
        // Nothing changes until approval.
        assert_eq!(s.state.authorizations.authorized(&s.provider, &s.app), 80);

        assert_eq!(
            s.state
                .approve_authorization_decrease(&s.app, s.provider)
                .unwrap(),
            (80, 50)
        );
        assert_eq!(s.state.authorizations.pending(&s.provider, &s.app), None);
        assert_eq!(
            s.state.approve_authorization_decrease(&s.app, s.provider),
            Err(StakingError::NoPendingDecrease { provider: s.provider, application: s.app })
        );
    }

    #[test]
    fn test_decrease_exceeding_authorized() {
        let mut s = setup(100);
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 10)
            .unwrap();
        assert_eq!(
            s.state
                .request_authorization_decrease(&s.authorizer, s.provider, s.app, 11, 0),
            Err(StakingError::AmountExceedsAuthorized { authorized: 10, requested: 11 })
        );
    }

    #[test]
    fn test_full_decrease_removes_from_list() {
        let mut s = setup(100);
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 10)
            .unwrap();
        s.state
            .request_authorization_decrease(&s.authorizer, s.provider, s.app, 10, 0)
            .unwrap();
        s.state
            .approve_authorization_decrease(&s.app, s.provider)
            .unwrap();

        assert_eq!(s.state.authorizations.application_count(&s.provider), 0);
        assert!(s.state.authorizations.get(&s.provider, &s.app).is_none());
        assert_eq!(s.state.authorizations.providers().count(), 0);
    }

    #[test]
    fn test_disabled_application_decreases_immediately() {
        let mut s = setup(100);
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 50)
            .unwrap();
        s.state.disable_application(&s.governance, s.app).unwrap();

        let request = s
            .state
            .request_authorization_decrease(&s.authorizer, s.provider, s.app, 20, 0)
            .unwrap();
        assert_eq!(request.status, ApplicationStatus::Disabled);
        assert_eq!(s.state.authorizations.authorized(&s.provider, &s.app), 30);
        assert_eq!(s.state.authorizations.pending(&s.provider, &s.app), None);
    }

    #[test]
    fn test_decrease_all_overwrites_pending() {
        let mut s = setup(100);
        let other = Address::derive("other-app");
        s.state.approve_application(&s.governance, other).unwrap();
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 40)
            .unwrap();
        s.state
            .increase_authorization(&s.authorizer, s.provider, other, 70)
            .unwrap();
        s.state
            .request_authorization_decrease(&s.authorizer, s.provider, s.app, 5, 1)
            .unwrap();
        s.state.disable_application(&s.governance, other).unwrap();

        let requested = s
            .state
            .request_authorization_decrease_all(&s.authorizer, s.provider, 2)
            .unwrap();
        assert_eq!(requested.len(), 2);
        assert_eq!(
            s.state.authorizations.pending(&s.provider, &s.app),
            Some(PendingDecrease { amount: 40, requested_at: 2 })
        );
        assert_eq!(s.state.authorizations.authorized(&s.provider, &other), 0);
        assert_eq!(s.state.authorizations.applications_of(&s.provider), vec![s.app]);
    }

    #[test]
    fn test_decrease_all_with_nothing_authorized() {
        let mut s = setup(100);
        assert_eq!(
            s.state
                .request_authorization_decrease_all(&s.authorizer, s.provider, 0),
            Err(StakingError::NothingAuthorized { provider: s.provider })
        );
    }

    #[test]
    fn test_force_decrease_requires_paused_or_disabled() {
        let mut s = setup(100);
        s.state
            .increase_authorization(&s.authorizer, s.provider, s.app, 50)
            .unwrap();
        assert!(matches!(
            s.state.force_decrease_authorization(s.provider, s.app),
            Err(StakingError::InvalidApplicationState { status: ApplicationStatus::Approved, .. })
        ));

        s.state.disable_application(&s.governance, s.app).unwrap();
        assert_eq!(s.state.force_decrease_authorization(s.provider, s.app), Ok(50));
        assert_eq!(
            s.state.force_decrease_authorization(s.provider, s.app),
            Err(StakingError::NothingAuthorized { provider: s.provider })
        );
    }

    #[test]
    fn test_apply_slash_clamps_to_remaining_stake() {
        let provider = Address::derive("provider");
        let a = Address::derive("a");
        let b = Address::derive("b");
        let mut ledger = AuthorizationLedger::new();
        ledger.increase(provider, a, 100).unwrap();
        ledger.increase(provider, b, 30).unwrap();
        ledger.record_pending(provider, a, 90, 0);

        let changes = ledger.apply_slash(provider, 20, 60);
        assert_eq!(
            changes,
            vec![
                AuthorizationChange { application: a, from: 100, to: 60 },
                AuthorizationChange { application: b, from: 30, to: 10 },
            ]
        );
        assert_eq!(ledger.pending(&provider, &a).map(|p| p.amount), Some(60));

        let changes = ledger.apply_slash(provider, 10, 50);
        assert_eq!(changes[1], AuthorizationChange { application: b, from: 10, to: 0 });
        assert_eq!(ledger.applications_of(&provider), vec![a]);
    }

    #[test]
    fn test_restore_preserves_list_order() {
        let provider = Address::derive("provider");
        let a = Address::derive("a");
        let b = Address::derive("b");
        let mut ledger = AuthorizationLedger::new();
        ledger.increase(provider, b, 1).unwrap();
        ledger.increase(provider, a, 2).unwrap();

        let rows: Vec<_> = ledger
            .iter()
            .map(|(p, app, _, auth)| (p, app, *auth))
            .collect();
        let restored = AuthorizationLedger::restore(rows);
        assert_eq!(restored, ledger);
        assert_eq!(restored.applications_of(&provider), vec![b, a]);
    }
}

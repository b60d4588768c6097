//! Application registry: lifecycle status and panic buttons.

use std::fmt;

use im::{OrdMap, Vector};
use serde::{Deserialize, Serialize};

use crate::error::{Result, Role, StakingError};
use crate::state::LedgerState;
use crate::types::Address;

/// Lifecycle status of an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApplicationStatus {
    #[default]
    Unapproved,
    Approved,
    Paused,
    Disabled,
}

impl ApplicationStatus {
    /// Stable numeric encoding.
    pub fn as_u8(self) -> u8 {
        match self {
            ApplicationStatus::Unapproved => 0,
            ApplicationStatus::Approved => 1,
            ApplicationStatus::Paused => 2,
            ApplicationStatus::Disabled => 3,
        }
    }

    /// Parse the numeric encoding.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(ApplicationStatus::Unapproved),
            1 => Some(ApplicationStatus::Approved),
            2 => Some(ApplicationStatus::Paused),
            3 => Some(ApplicationStatus::Disabled),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApplicationStatus::Unapproved => "unapproved",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Paused => "paused",
            ApplicationStatus::Disabled => "disabled",
        };
        f.write_str(name)
    }
}

/// Per-application record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub status: ApplicationStatus,
    pub panic_button: Option<Address>,
}

/// Status of every application that was ever approved, plus the
/// enumeration list in first-approval order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRegistry {
    infos: OrdMap<Address, ApplicationInfo>,
    applications: Vector<Address>,
}

impl ApplicationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record for `application`; unknown applications read as Unapproved.
    pub fn info(&self, application: &Address) -> ApplicationInfo {
        self.infos.get(application).cloned().unwrap_or_default()
    }

    /// Status of `application`.
    pub fn status(&self, application: &Address) -> ApplicationStatus {
        self.infos
            .get(application)
            .map(|info| info.status)
            .unwrap_or_default()
    }

    /// Fail with `InvalidApplicationState` unless the status is one of `allowed`.
    pub fn require_status(&self, application: &Address, allowed: &[ApplicationStatus]) -> Result<ApplicationStatus> {
        let status = self.status(application);
        if !allowed.contains(&status) {
            return Err(StakingError::InvalidApplicationState {
                application: *application,
                status,
            });
        }
        Ok(status)
    }

    /// Number of applications ever approved.
    pub fn applications_len(&self) -> usize {
        self.applications.len()
    }

    /// Application at `index` in first-approval order.
    pub fn application_at(&self, index: usize) -> Option<Address> {
        self.applications.get(index).copied()
    }

    /// Iterate application records in address order.
    pub fn iter(&self) -> impl Iterator<Item = (&Address, &ApplicationInfo)> {
        self.infos.iter()
    }

    /// Iterate the enumeration list.
    pub fn listed(&self) -> impl Iterator<Item = &Address> {
        self.applications.iter()
    }

    fn set_status(&mut self, application: Address, status: ApplicationStatus) {
        let mut info = self.info(&application);
        info.status = status;
        self.infos.insert(application, info);
    }

    /// Rebuild the registry from persisted rows.
    pub fn restore(infos: impl IntoIterator<Item = (Address, ApplicationInfo)>, listed: impl IntoIterator<Item = Address>) -> Self {
        Self {
            infos: infos.into_iter().collect(),
            applications: listed.into_iter().collect(),
        }
    }
}

impl LedgerState {
    /// Approve an application, or re-approve a paused one.
    ///
    /// Returns `true` when the application was added to the enumeration
    /// list by this call.
    pub fn approve_application(&mut self, caller: &Address, application: Address) -> Result<bool> {
        self.require_governance(caller)?;
        if application.is_zero() {
            return Err(StakingError::ZeroAddress);
        }
        let previous = self.applications.require_status(
            &application,
            &[
                ApplicationStatus::Unapproved,
                ApplicationStatus::Approved,
                ApplicationStatus::Paused,
            ],
        )?;
        self.applications
            .set_status(application, ApplicationStatus::Approved);

        let first_approval = previous == ApplicationStatus::Unapproved;
        if first_approval {
            self.applications.applications.push_back(application);
        }
        Ok(first_approval)
    }

    /// Pause an approved application. Only its panic button may do this.
    pub fn pause_application(&mut self, caller: &Address, application: Address) -> Result<()> {
        let info = self.applications.info(&application);
        if info.panic_button != Some(*caller) {
            return Err(StakingError::Unauthorized {
                caller: *caller,
                role: Role::PanicButton,
            });
        }
        self.applications
            .require_status(&application, &[ApplicationStatus::Approved])?;
        self.applications
            .set_status(application, ApplicationStatus::Paused);
        Ok(())
    }

    /// Disable an application for good.
    pub fn disable_application(&mut self, caller: &Address, application: Address) -> Result<()> {
        self.require_governance(caller)?;
        self.applications.require_status(
            &application,
            &[
                ApplicationStatus::Unapproved,
                ApplicationStatus::Approved,
                ApplicationStatus::Paused,
            ],
        )?;
        self.applications
            .set_status(application, ApplicationStatus::Disabled);
        Ok(())
    }

    /// Assign the identity allowed to pause `application`.
    pub fn set_panic_button(&mut self, caller: &Address, application: Address, panic_button: Address) -> Result<()> {
        self.require_governance(caller)?;
        self.applications.require_status(
            &application,
            &[ApplicationStatus::Approved, ApplicationStatus::Paused],
        )?;
        let mut info = self.applications.info(&application);
        info.panic_button = Some(panic_button);
        self.applications.infos.insert(application, info);
        Ok(())
    }

    /// Set the max number of applications per provider. Zero removes the cap.
    ///
    /// Providers already above the new value keep their authorizations.
    pub fn set_authorization_ceiling(&mut self, caller: &Address, ceiling: usize) -> Result<()> {
        self.require_governance(caller)?;
        self.params.authorization_ceiling = ceiling;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Parameters;

    fn governance() -> Address {
        Address::derive("governance")
    }

    fn app() -> Address {
        Address::derive("application")
    }

    fn state() -> LedgerState {
        LedgerState::new(Parameters::new(governance()))
    }

    #[test]
    fn test_approve_is_idempotent() {
        let mut state = state();
        assert!(state.approve_application(&governance(), app()).unwrap());
        assert!(!state.approve_application(&governance(), app()).unwrap());

        assert_eq!(state.applications.applications_len(), 1);
        assert_eq!(state.applications.application_at(0), Some(app()));
        assert_eq!(state.applications.status(&app()), ApplicationStatus::Approved);
    }

    #[test]
    fn test_pause_requires_panic_button() {
        let mut state = state();
        let button = Address::derive("panic-button");
        state.approve_application(&governance(), app()).unwrap();

        assert!(matches!(
            state.pause_application(&button, app()),
            Err(StakingError::Unauthorized { role: Role::PanicButton, .. })
        ));

        state.set_panic_button(&governance(), app(), button).unwrap();
        state.pause_application(&button, app()).unwrap();
        assert_eq!(state.applications.status(&app()), ApplicationStatus::Paused);

        // Paused apps cannot be paused again.
        assert!(matches!(
            state.pause_application(&button, app()),
            Err(StakingError::InvalidApplicationState { status: ApplicationStatus::Paused, .. })
        ));
    }

    #[test]
    fn test_reapprove_paused_keeps_single_entry() {
        let mut state = state();
        let button = Address::derive("panic-button");
        state.approve_application(&governance(), app()).unwrap();
        state.set_panic_button(&governance(), app(), button).unwrap();
        state.pause_application(&button, app()).unwrap();

        assert!(!state.approve_application(&governance(), app()).unwrap());
        assert_eq!(state.applications.status(&app()), ApplicationStatus::Approved);
        assert_eq!(state.applications.applications_len(), 1);
    }

    #[test]
    fn test_disabled_is_terminal() {
        let mut state = state();
        state.approve_application(&governance(), app()).unwrap();
        state.disable_application(&governance(), app()).unwrap();

        assert_eq!(
            state.approve_application(&governance(), app()),
            Err(StakingError::InvalidApplicationState {
                application: app(),
                status: ApplicationStatus::Disabled,
            })
        );
        assert!(state.disable_application(&governance(), app()).is_err());
        assert!(state
            .set_panic_button(&governance(), app(), Address::derive("b"))
            .is_err());
    }

    #[test]
    fn test_panic_button_requires_known_application() {
        let mut state = state();
        assert!(matches!(
            state.set_panic_button(&governance(), app(), Address::derive("b")),
            Err(StakingError::InvalidApplicationState { status: ApplicationStatus::Unapproved, .. })
        ));
    }

    #[test]
    fn test_status_numeric_encoding() {
        for status in [
            ApplicationStatus::Unapproved,
            ApplicationStatus::Approved,
            ApplicationStatus::Paused,
            ApplicationStatus::Disabled,
        ] {
            assert_eq!(ApplicationStatus::from_u8(status.as_u8()), Some(status));
        }
        assert_eq!(ApplicationStatus::from_u8(4), None);
    }
}

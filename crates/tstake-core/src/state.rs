//! Ledger state: every registry of the system in one value.
//!
//! The registries are backed by `im` persistent collections, so cloning a
//! [`LedgerState`] is O(1). The engine snapshots the state before each
//! operation and puts the snapshot back if the operation fails.
//!
//! Operations that need nothing but the state itself (role checks, balance
//! rules, queue bookkeeping) are implemented on `LedgerState` in the module
//! of the component they belong to.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::application::ApplicationRegistry;
use crate::authorization::AuthorizationLedger;
use crate::error::{CodecError, Result, Role, StakingError};
use crate::params::Parameters;
use crate::slashing::SlashingQueue;
use crate::stake::{StakeRegistry, StakeType};
use crate::treasury::NotifierTreasury;
use crate::types::{Address, Amount};

/// Blake3 digest of the canonical state encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateHash(pub [u8; 32]);

impl StateHash {
    /// Hash arbitrary bytes.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> std::result::Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StateHash({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for StateHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A provider whose largest authorization exceeds its total stake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantViolation {
    pub provider: Address,
    pub max_authorization: Amount,
    pub total_stake: Amount,
}

/// The complete ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub params: Parameters,
    pub stakes: StakeRegistry,
    pub applications: ApplicationRegistry,
    pub authorizations: AuthorizationLedger,
    pub slashing: SlashingQueue,
    pub treasury: NotifierTreasury,
}

impl LedgerState {
    /// Create an empty ledger.
    pub fn new(params: Parameters) -> Self {
        Self {
            params,
            stakes: StakeRegistry::new(),
            applications: ApplicationRegistry::new(),
            authorizations: AuthorizationLedger::new(),
            slashing: SlashingQueue::new(),
            treasury: NotifierTreasury::new(),
        }
    }

    /// Fail unless `caller` is the governance identity.
    pub fn require_governance(&self, caller: &Address) -> Result<()> {
        if *caller != self.params.governance {
            return Err(StakingError::Unauthorized {
                caller: *caller,
                role: Role::Governance,
            });
        }
        Ok(())
    }

    /// T + Keep + Nu stake of a provider (zero if unknown).
    pub fn total_stake(&self, provider: &Address) -> Amount {
        self.stakes
            .get(provider)
            .map(|p| p.total_stake())
            .unwrap_or(0)
    }

    /// Largest authorization any application holds against the provider.
    pub fn max_authorization(&self, provider: &Address) -> Amount {
        self.authorizations.max_authorization(provider)
    }

    /// Part of `stake_type` that must stay staked to back the provider's
    /// authorizations once the other two denominations are accounted for.
    pub fn min_staked(&self, provider: &Address, stake_type: StakeType) -> Amount {
        match self.stakes.get(provider) {
            Some(record) => record.min_staked(stake_type, self.max_authorization(provider)),
            None => 0,
        }
    }

    /// Headroom left for `application` to be authorized against `provider`.
    ///
    /// Each application's claim is capped by the provider's whole stake, so
    /// this is the total stake minus what the application already holds.
    pub fn available_to_authorize(&self, provider: &Address, application: &Address) -> Amount {
        self.total_stake(provider)
            .saturating_sub(self.authorizations.authorized(provider, application))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Governance parameters
    // ─────────────────────────────────────────────────────────────────────────

    /// Set the minimum amount for new T stakes.
    pub fn set_minimum_stake_amount(&mut self, caller: &Address, amount: Amount) -> Result<()> {
        self.require_governance(caller)?;
        self.params.min_t_stake_amount = amount;
        Ok(())
    }

    /// Set the lock period applied to T stake after the first stake.
    pub fn set_min_stake_time(&mut self, caller: &Address, seconds: u64) -> Result<()> {
        self.require_governance(caller)?;
        self.params.min_stake_time = seconds;
        Ok(())
    }

    /// Hand governance over to another identity.
    pub fn transfer_governance(&mut self, caller: &Address, new_governance: Address) -> Result<()> {
        self.require_governance(caller)?;
        if new_governance.is_zero() {
            return Err(StakingError::ZeroAddress);
        }
        self.params.governance = new_governance;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encoding and integrity
    // ─────────────────────────────────────────────────────────────────────────

    /// Deterministic CBOR encoding of the state.
    ///
    /// All maps are ordered, so equal states encode to equal bytes.
    pub fn canonical_bytes(&self) -> std::result::Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CodecError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Decode a state produced by [`LedgerState::canonical_bytes`].
    pub fn from_canonical_bytes(bytes: &[u8]) -> std::result::Result<Self, CodecError> {
        ciborium::from_reader(bytes).map_err(|e| CodecError::Decoding(e.to_string()))
    }

    /// Blake3 hash of the canonical encoding.
    pub fn state_hash(&self) -> std::result::Result<StateHash, CodecError> {
        Ok(StateHash::hash(&self.canonical_bytes()?))
    }

    /// Providers for which `max authorization ≤ total stake` does not hold.
    ///
    /// Empty after every successful operation.
    pub fn invariant_violations(&self) -> Vec<InvariantViolation> {
        self.authorizations
            .providers()
            .filter_map(|provider| {
                let max_authorization = self.max_authorization(&provider);
                let total_stake = self.total_stake(&provider);
                (max_authorization > total_stake).then_some(InvariantViolation {
                    provider,
                    max_authorization,
                    total_stake,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stake::Roles;

    fn governance() -> Address {
        Address::derive("governance")
    }

    #[test]
    fn test_only_governance_changes_parameters() {
        let mut state = LedgerState::new(Parameters::new(governance()));
        let stranger = Address::derive("stranger");

        assert!(matches!(
            state.set_minimum_stake_amount(&stranger, 10),
            Err(StakingError::Unauthorized { role: Role::Governance, .. })
        ));

        state.set_minimum_stake_amount(&governance(), 10).unwrap();
        assert_eq!(state.params.min_t_stake_amount, 10);
    }

    #[test]
    fn test_transfer_governance() {
        let mut state = LedgerState::new(Parameters::new(governance()));
        let next = Address::derive("next-governance");

        assert_eq!(
            state.transfer_governance(&governance(), Address::ZERO),
            Err(StakingError::ZeroAddress)
        );
        state.transfer_governance(&governance(), next).unwrap();
        assert!(state.require_governance(&governance()).is_err());
        assert!(state.require_governance(&next).is_ok());
    }

    #[test]
    fn test_canonical_bytes_roundtrip_and_hash() {
        let mut state = LedgerState::new(Parameters::new(governance()));
        let provider = Address::derive("provider");
        let roles = Roles::new(
            Address::derive("owner"),
            Address::derive("beneficiary"),
            Address::derive("authorizer"),
        );
        state.stakes.register(provider, roles, 100).unwrap();
        state.stakes.deposit(&provider, StakeType::T, 1_000).unwrap();

        let bytes = state.canonical_bytes().unwrap();
        let decoded = LedgerState::from_canonical_bytes(&bytes).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.state_hash().unwrap(), state.state_hash().unwrap());

        state.stakes.deposit(&provider, StakeType::T, 1).unwrap();
        assert_ne!(decoded.state_hash().unwrap(), state.state_hash().unwrap());
    }

    #[test]
    fn test_state_hash_hex_roundtrip() {
        let hash = StateHash::hash(b"ledger");
        assert_eq!(StateHash::from_hex(&hash.to_hex()).unwrap(), hash);
    }
}

//! Governance-controlled parameters.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount};

/// Percentage of the slashed amount paid to whoever processes the queue.
pub const SLASHING_REWARD_PERCENT: Amount = 5;

/// Upper bound for a seizure reward multiplier, in percent.
pub const MAX_REWARD_MULTIPLIER: u8 = 100;

/// Parameters persisted with the ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// The only identity allowed to run administrative operations.
    pub governance: Address,

    /// Minimum amount for a new T stake.
    pub min_t_stake_amount: Amount,

    /// Max number of applications a provider may be authorized for.
    /// Zero disables the ceiling.
    pub authorization_ceiling: usize,

    /// Seconds after the first stake before T stake can be withdrawn.
    pub min_stake_time: u64,
}

impl Parameters {
    /// Create parameters with no minimum, no ceiling and no lock.
    pub fn new(governance: Address) -> Self {
        Self {
            governance,
            min_t_stake_amount: 0,
            authorization_ceiling: 0,
            min_stake_time: 0,
        }
    }

    /// Whether a provider that holds `count` authorized applications may
    /// authorize one more.
    pub fn ceiling_allows(&self, count: usize) -> bool {
        self.authorization_ceiling == 0 || count < self.authorization_ceiling
    }
}

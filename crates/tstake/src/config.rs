//! Engine configuration.

use serde::{Deserialize, Serialize};
use tstake_core::{Address, Amount, Parameters};

/// Configuration for a new staking ledger.
///
/// Seeds the persisted parameters; after construction they change only
/// through governance operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    /// Governance identity, as hex.
    #[serde(with = "address_hex")]
    pub governance: Address,
    /// Minimum amount for a new T stake.
    pub min_t_stake_amount: Amount,
    /// Max applications per provider; 0 disables the cap.
    pub authorization_ceiling: usize,
    /// Full notifier reward, paid at a 100% multiplier.
    pub notification_reward: Amount,
    /// Seconds T stake stays locked after the first stake.
    pub min_stake_time: u64,
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            governance: Address::ZERO,
            min_t_stake_amount: 0,
            authorization_ceiling: 0,
            notification_reward: 0,
            min_stake_time: 0,
        }
    }
}

impl StakingConfig {
    /// Default configuration governed by `governance`.
    pub fn new(governance: Address) -> Self {
        Self {
            governance,
            ..Self::default()
        }
    }

    pub fn with_min_t_stake_amount(mut self, amount: Amount) -> Self {
        self.min_t_stake_amount = amount;
        self
    }

    pub fn with_authorization_ceiling(mut self, ceiling: usize) -> Self {
        self.authorization_ceiling = ceiling;
        self
    }

    pub fn with_notification_reward(mut self, reward: Amount) -> Self {
        self.notification_reward = reward;
        self
    }

    pub fn with_min_stake_time(mut self, seconds: u64) -> Self {
        self.min_stake_time = seconds;
        self
    }

    /// Parse a JSON configuration. Missing fields take their defaults.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Ledger parameters seeded by this configuration.
    pub fn parameters(&self) -> Parameters {
        Parameters {
            governance: self.governance,
            min_t_stake_amount: self.min_t_stake_amount,
            authorization_ceiling: self.authorization_ceiling,
            min_stake_time: self.min_stake_time,
        }
    }
}

mod address_hex {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};
    use tstake_core::Address;

    pub fn serialize<S: Serializer>(address: &Address, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&address.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Address, D::Error> {
        let s = String::deserialize(deserializer)?;
        Address::from_hex(&s).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let governance = Address::derive("governance");
        let config = StakingConfig::new(governance)
            .with_min_t_stake_amount(10)
            .with_authorization_ceiling(3)
            .with_notification_reward(7)
            .with_min_stake_time(60);

        let params = config.parameters();
        assert_eq!(params.governance, governance);
        assert_eq!(params.min_t_stake_amount, 10);
        assert_eq!(params.authorization_ceiling, 3);
        assert_eq!(params.min_stake_time, 60);
        assert_eq!(config.notification_reward, 7);
    }

    #[test]
    fn test_from_json_with_defaults() {
        let governance = Address::derive("governance");
        let json = format!(
            r#"{{ "governance": "{}", "authorization_ceiling": 5 }}"#,
            governance
        );
        let config = StakingConfig::from_json(&json).unwrap();
        assert_eq!(config, StakingConfig::new(governance).with_authorization_ceiling(5));
    }

    #[test]
    fn test_json_roundtrip() {
        let config = StakingConfig::new(Address::derive("governance")).with_notification_reward(3);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(StakingConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_from_json_rejects_bad_address() {
        assert!(StakingConfig::from_json(r#"{ "governance": "0x1234" }"#).is_err());
    }
}

//! Ledger configuration.
//!
//! Loaded from a JSON file; every field has a default so a partial file is
//! enough.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::staking::epoch::EpochParameters;
use crate::staking::types::{Address, Epoch, Rate, Timestamp};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Gates the reward formula on the candidacy threshold from a given epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardPolicy {
    /// From this epoch on a validator below the candidacy threshold earns
    /// nothing. `None` never gates.
    pub threshold_gate_from: Option<Epoch>,
}

impl RewardPolicy {
    pub fn threshold_gated(&self, epoch: Epoch) -> bool {
        self.threshold_gate_from.map_or(false, |from| epoch >= from)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub genesis: EpochParameters,
    /// Seconds an unstaked amount stays locked.
    pub lock_duration: Timestamp,
    /// Identity allowed to schedule parameter changes.
    pub governance: Address,
    /// Identities besides the block producer that may report slashes.
    pub slash_reporters: Vec<Address>,
    pub initial_commission_rate: Rate,
    pub reward_policy: RewardPolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            genesis: EpochParameters::default(),
            lock_duration: 7 * 24 * 60 * 60,
            governance: Address::ZERO,
            slash_reporters: Vec::new(),
            initial_commission_rate: 0,
            reward_policy: RewardPolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: LedgerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.genesis
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.initial_commission_rate > self.genesis.commission_cap {
            return Err(ConfigError::Invalid(format!(
                "initial_commission_rate {} exceeds commission_cap {}",
                self.initial_commission_rate, self.genesis.commission_cap
            )));
        }
        if self.slash_reporters.iter().any(Address::is_zero) {
            return Err(ConfigError::Invalid(
                "slash reporter cannot be the zero address".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_slash_reporter(&self, who: &Address) -> bool {
        self.slash_reporters.contains(who)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{ "lock_duration": 60, "genesis": { "epoch_length": 12 } }"#)
                .unwrap();
        assert_eq!(config.lock_duration, 60);
        assert_eq!(config.genesis.epoch_length, 12);
        assert_eq!(config.genesis.jail_threshold, EpochParameters::default().jail_threshold);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_commission_rejected() {
        let config = LedgerConfig {
            initial_commission_rate: 9_000,
            ..LedgerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_reward_policy_gate() {
        let policy = RewardPolicy {
            threshold_gate_from: Some(10),
        };
        assert!(!policy.threshold_gated(9));
        assert!(policy.threshold_gated(10));
        assert!(!RewardPolicy::default().threshold_gated(1_000));
    }
}

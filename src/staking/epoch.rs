//! Epoch clock and governance parameter schedule.
//!
//! The clock maps a block number to an epoch using the parameter set in
//! force at that block. Parameter sets are kept in activation order; only
//! the newest two may still be live (the current set plus at most one
//! pending change).

use serde::{Deserialize, Serialize};

use crate::error::{PhaseError, StakingError, ValidationError};
use crate::staking::types::{Amount, BlockNumber, Epoch, Rate, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochParameters {
    pub activation_epoch: Epoch,
    pub activation_block: BlockNumber,
    /// Seconds per block.
    pub block_duration: u64,
    /// Blocks per epoch.
    pub epoch_length: u64,
    /// Annual reward rate in basis points.
    pub reward_rate: u64,
    pub candidacy_threshold: Amount,
    /// Slashes within one epoch that trigger jailing.
    pub jail_threshold: u64,
    /// Epochs a jailed validator stays out of the candidate set.
    pub jail_duration: u64,
    pub commission_cap: Rate,
}

impl Default for EpochParameters {
    fn default() -> Self {
        Self {
            activation_epoch: 0,
            activation_block: 0,
            block_duration: 1,
            epoch_length: 86_400,
            reward_rate: 500,
            candidacy_threshold: 1_000,
            jail_threshold: 50,
            jail_duration: 2,
            commission_cap: 5_000,
        }
    }
}

impl EpochParameters {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.epoch_length == 0 {
            return Err(ValidationError::InvalidParameter(
                "epoch_length must be non-zero".to_string(),
            ));
        }
        if self.block_duration == 0 {
            return Err(ValidationError::InvalidParameter(
                "block_duration must be non-zero".to_string(),
            ));
        }
        if self.commission_cap > crate::staking::types::RATE_DENOMINATOR {
            return Err(ValidationError::InvalidParameter(format!(
                "commission_cap {} exceeds {}",
                self.commission_cap,
                crate::staking::types::RATE_DENOMINATOR
            )));
        }
        Ok(())
    }

    /// Wall-clock length of one epoch in seconds.
    pub fn epoch_seconds(&self) -> Timestamp {
        self.epoch_length.saturating_mul(self.block_duration)
    }
}

/// Parameter change requested through governance. The activation block is
/// derived by the clock.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub activation_epoch: Epoch,
    pub block_duration: u64,
    pub epoch_length: u64,
    pub reward_rate: u64,
    pub candidacy_threshold: Amount,
    pub jail_threshold: u64,
    pub jail_duration: u64,
    pub commission_cap: Rate,
}

impl ParameterUpdate {
    fn into_parameters(self, activation_block: BlockNumber) -> EpochParameters {
        EpochParameters {
            activation_epoch: self.activation_epoch,
            activation_block,
            block_duration: self.block_duration,
            epoch_length: self.epoch_length,
            reward_rate: self.reward_rate,
            candidacy_threshold: self.candidacy_threshold,
            jail_threshold: self.jail_threshold,
            jail_duration: self.jail_duration,
            commission_cap: self.commission_cap,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochClock {
    schedule: Vec<EpochParameters>,
}

impl EpochClock {
    pub fn new(genesis: EpochParameters) -> Result<Self, ValidationError> {
        genesis.validate()?;
        Ok(Self {
            schedule: vec![genesis],
        })
    }

    /// Parameter set in force at `block`.
    pub fn params_at_block(&self, block: BlockNumber) -> &EpochParameters {
        self.schedule
            .iter()
            .rev()
            .find(|p| p.activation_block <= block)
            .unwrap_or(&self.schedule[0])
    }

    /// Parameter set in force during `epoch`.
    pub fn params_at_epoch(&self, epoch: Epoch) -> &EpochParameters {
        self.schedule
            .iter()
            .rev()
            .find(|p| p.activation_epoch <= epoch)
            .unwrap_or(&self.schedule[0])
    }

    pub fn epoch_at(&self, block: BlockNumber) -> Epoch {
        let params = self.params_at_block(block);
        let elapsed = block.saturating_sub(params.activation_block);
        params.activation_epoch + elapsed / params.epoch_length
    }

    fn offset_in_epoch(&self, block: BlockNumber) -> u64 {
        let params = self.params_at_block(block);
        block.saturating_sub(params.activation_block) % params.epoch_length
    }

    pub fn is_first_interval(&self, block: BlockNumber) -> bool {
        self.offset_in_epoch(block) == 0
    }

    pub fn is_last_interval(&self, block: BlockNumber) -> bool {
        let params = self.params_at_block(block);
        self.offset_in_epoch(block) == params.epoch_length - 1
    }

    /// First block of `epoch`. Epochs before the genesis set map to its
    /// activation block.
    pub fn epoch_start_block(&self, epoch: Epoch) -> BlockNumber {
        let params = self.params_at_epoch(epoch);
        let elapsed = epoch.saturating_sub(params.activation_epoch);
        params
            .activation_block
            .saturating_add(elapsed.saturating_mul(params.epoch_length))
    }

    /// Blocks left after `block` until the epoch boundary.
    pub fn blocks_until_epoch_end(&self, block: BlockNumber) -> u64 {
        let params = self.params_at_block(block);
        params.epoch_length - 1 - self.offset_in_epoch(block)
    }

    /// Accepts a new parameter set that activates at a future epoch.
    ///
    /// A pending set that has not started yet is replaced. The activation
    /// block is laid out from the newest set already in force so the
    /// epoch/block mapping stays continuous.
    pub fn schedule(
        &mut self,
        update: ParameterUpdate,
        block: BlockNumber,
    ) -> Result<&EpochParameters, StakingError> {
        if self.is_last_interval(block) {
            return Err(PhaseError::OnlyNotLastInterval(block).into());
        }
        let current = self.epoch_at(block);
        if update.activation_epoch <= current {
            return Err(ValidationError::PastActivation {
                target: update.activation_epoch,
                current,
            }
            .into());
        }

        let started = self
            .schedule
            .iter()
            .rposition(|p| p.activation_block <= block)
            .unwrap_or(0);
        let base = &self.schedule[started];
        let activation_block = (update.activation_epoch - base.activation_epoch)
            .checked_mul(base.epoch_length)
            .and_then(|offset| base.activation_block.checked_add(offset))
            .ok_or_else(|| {
                ValidationError::InvalidParameter(format!(
                    "activation epoch {} is out of block range",
                    update.activation_epoch
                ))
            })?;
        let params = update.into_parameters(activation_block);
        params.validate()?;

        self.schedule.truncate(started + 1);
        self.schedule.push(params);
        Ok(&self.schedule[self.schedule.len() - 1])
    }

    /// Pending parameter set that has not activated at `block` yet.
    pub fn pending(&self, block: BlockNumber) -> Option<&EpochParameters> {
        self.schedule
            .last()
            .filter(|p| p.activation_block > block)
    }

    pub fn schedule_len(&self) -> usize {
        self.schedule.len()
    }
}

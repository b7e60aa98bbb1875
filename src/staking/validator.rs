use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::staking::query::{Page, ValidatorInfo};
use crate::staking::time_series::TimeSeries;
use crate::staking::types::{Address, Amount, CallContext, Epoch, Rate};

/// Inclusive range of epochs in which a validator is jailed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JailWindow {
    pub from: Epoch,
    pub until: Epoch,
}

impl JailWindow {
    pub fn contains(&self, epoch: Epoch) -> bool {
        self.from <= epoch && epoch <= self.until
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAccount {
    /// Immutable registrant; also the validator's id.
    pub owner: Address,
    /// Rotatable block-signing identity.
    pub operator: Address,
    pub registered_epoch: Epoch,
    pub stake: TimeSeries<Amount>,
    pub commission_rate: TimeSeries<Rate>,
    /// Explicit per-epoch activation instructions; `false` marks inactive.
    pub active_overrides: BTreeMap<Epoch, bool>,
    pub jail_windows: Vec<JailWindow>,
    pub expected_blocks: BTreeMap<Epoch, u64>,
    pub slash_count: BTreeMap<Epoch, u64>,
    /// Delegators in first-stake order.
    pub delegators: Vec<Address>,
    pub last_claimed_commission_epoch: Epoch,
}

impl ValidatorAccount {
    pub fn new(owner: Address, operator: Address, registered_epoch: Epoch) -> Self {
        Self {
            owner,
            operator,
            registered_epoch,
            stake: TimeSeries::new(),
            commission_rate: TimeSeries::new(),
            active_overrides: BTreeMap::new(),
            jail_windows: Vec::new(),
            expected_blocks: BTreeMap::new(),
            slash_count: BTreeMap::new(),
            delegators: Vec::new(),
            last_claimed_commission_epoch: registered_epoch,
        }
    }

    /// Owner or operator may manage the validator.
    pub fn is_controller(&self, who: &Address) -> bool {
        self.owner == *who || self.operator == *who
    }

    pub fn total_stake(&self, epoch: Epoch) -> Amount {
        self.stake.find(epoch)
    }

    pub fn commission_rate_at(&self, epoch: Epoch) -> Rate {
        self.commission_rate.find(epoch)
    }

    pub fn is_inactive(&self, epoch: Epoch) -> bool {
        self.active_overrides.get(&epoch) == Some(&false)
    }

    pub fn is_jailed(&self, epoch: Epoch) -> bool {
        self.jail_windows.iter().rev().any(|w| w.contains(epoch))
    }

    /// Most recent jail window, if the validator was ever jailed.
    pub fn latest_jail(&self) -> Option<&JailWindow> {
        self.jail_windows.last()
    }

    pub fn expected_blocks_at(&self, epoch: Epoch) -> u64 {
        self.expected_blocks.get(&epoch).copied().unwrap_or(0)
    }

    pub fn slash_count_at(&self, epoch: Epoch) -> u64 {
        self.slash_count.get(&epoch).copied().unwrap_or(0)
    }
}

pub trait ValidatorOperations {
    /// Registers the caller as owner of a new validator signed by `operator`.
    fn register_validator(&mut self, ctx: &CallContext, operator: Address) -> Result<()>;

    /// Rotates the operator of the caller's validator.
    fn update_operator(&mut self, ctx: &CallContext, new_operator: Address) -> Result<()>;

    /// Marks future `epochs` active or inactive. Epochs that are not in the
    /// future are skipped; the recorded epochs are returned.
    fn set_active(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        epochs: &[Epoch],
        active: bool,
    ) -> Result<Vec<Epoch>>;

    /// Sets the commission rate of the caller's validator from the next epoch on.
    fn update_commission_rate(&mut self, ctx: &CallContext, rate: Rate) -> Result<()>;

    fn validator(&self, owner: &Address) -> Option<&ValidatorAccount>;

    /// Resolves an operator identity to the owning validator's id.
    fn validator_by_operator(&self, operator: &Address) -> Option<&ValidatorAccount>;

    fn validators(&self, epoch: Epoch, cursor: usize, limit: usize) -> Page<ValidatorInfo>;

    fn validator_count(&self) -> usize;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jail_window_bounds() {
        let mut account = ValidatorAccount::new(Address([1u8; 32]), Address([2u8; 32]), 0);
        account.jail_windows.push(JailWindow { from: 4, until: 6 });

        assert!(!account.is_jailed(3));
        assert!(account.is_jailed(4));
        assert!(account.is_jailed(6));
        assert!(!account.is_jailed(7));
    }

    #[test]
    fn test_override_only_marks_listed_epochs() {
        let mut account = ValidatorAccount::new(Address([1u8; 32]), Address([2u8; 32]), 0);
        account.active_overrides.insert(5, false);
        account.active_overrides.insert(6, true);

        assert!(account.is_inactive(5));
        assert!(!account.is_inactive(6));
        assert!(!account.is_inactive(7));
        assert!(account.is_controller(&Address([2u8; 32])));
        assert!(!account.is_controller(&Address([3u8; 32])));
    }
}

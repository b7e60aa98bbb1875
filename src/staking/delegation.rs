use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::staking::query::{Page, StakePosition};
use crate::staking::time_series::TimeSeries;
use crate::staking::types::{Address, Amount, AssetClass, CallContext, Epoch, UnstakeReceipt};
use crate::staking::withdrawal::QueuedWithdrawal;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorAccount {
    pub signer: Address,
    /// Stake history per `(validator, asset)` position.
    pub stakes: BTreeMap<(Address, AssetClass), TimeSeries<Amount>>,
    /// Validators in first-stake order.
    pub validators: Vec<Address>,
    pub last_claimed_reward_epoch: BTreeMap<Address, Epoch>,
    pub withdrawals: Vec<QueuedWithdrawal>,
}

impl DelegatorAccount {
    pub fn new(signer: Address) -> Self {
        Self {
            signer,
            stakes: BTreeMap::new(),
            validators: Vec::new(),
            last_claimed_reward_epoch: BTreeMap::new(),
            withdrawals: Vec::new(),
        }
    }

    pub fn stake_at(&self, validator: &Address, asset: AssetClass, epoch: Epoch) -> Amount {
        self.stakes
            .get(&(*validator, asset))
            .map(|series| series.find(epoch))
            .unwrap_or(0)
    }

    /// Stake toward `validator` at `epoch` summed over asset classes.
    pub fn validator_stake_at(&self, validator: &Address, epoch: Epoch) -> Amount {
        self.stakes
            .iter()
            .filter(|((v, _), _)| v == validator)
            .map(|(_, series)| series.find(epoch))
            .sum()
    }

    pub fn last_claimed(&self, validator: &Address) -> Option<Epoch> {
        self.last_claimed_reward_epoch.get(validator).copied()
    }

    pub fn withdrawal(&self, id: u64) -> Option<&QueuedWithdrawal> {
        self.withdrawals.iter().find(|w| w.id == id)
    }

    /// Positions toward `validator`, in asset order.
    pub fn positions_for<'a>(
        &'a self,
        validator: &'a Address,
    ) -> impl Iterator<Item = (&'a AssetClass, &'a TimeSeries<Amount>)> + 'a {
        self.stakes
            .iter()
            .filter(move |((v, _), _)| v == validator)
            .map(|((_, asset), series)| (asset, series))
    }
}

pub trait DelegationOperations {
    /// Stakes `amount` of `asset` toward `validator`, effective next epoch.
    fn stake(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        asset: AssetClass,
        amount: Amount,
    ) -> Result<()>;

    /// Removes up to `amount` from next epoch's stake. The part staked
    /// during the current epoch is refunded at once; the rest is queued
    /// behind the wall-clock lock. Requests above the staked amount clamp.
    fn unstake(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        asset: AssetClass,
        amount: Amount,
    ) -> Result<UnstakeReceipt>;

    /// Legacy unstake: the whole amount unlocks when the current epoch ends.
    fn unstake_at_epoch_end(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        asset: AssetClass,
        amount: Amount,
    ) -> Result<UnstakeReceipt>;

    fn delegator(&self, signer: &Address) -> Option<&DelegatorAccount>;

    fn delegators(&self, cursor: usize, limit: usize) -> Page<Address>;

    /// Positions held by delegators of `validator`.
    fn validator_delegations(
        &self,
        validator: &Address,
        cursor: usize,
        limit: usize,
    ) -> Page<StakePosition>;

    /// Positions held by `delegator` across validators.
    fn delegator_validators(
        &self,
        delegator: &Address,
        cursor: usize,
        limit: usize,
    ) -> Page<StakePosition>;
}

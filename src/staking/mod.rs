pub mod types;
pub mod time_series;
pub mod epoch;
pub mod validator;
pub mod delegation;
pub mod rewards;
pub mod lifecycle;
pub mod withdrawal;
pub mod custody;
pub mod query;
pub mod shared;

#[cfg(test)]
mod tests;

pub use custody::{AllowList, InMemoryCustody, OpenAllowList, StaticAllowList, ValueCustody};
pub use delegation::{DelegationOperations, DelegatorAccount};
pub use epoch::{EpochClock, EpochParameters, ParameterUpdate};
pub use lifecycle::{EpochManager, SlashingOperations};
pub use query::{Page, StakePosition, ValidatorInfo};
pub use rewards::{RewardEngine, RewardOutcome, RewardsDistributor};
pub use shared::SharedLedger;
pub use time_series::TimeSeries;
pub use types::{
    Address, Amount, AssetClass, CallContext, Epoch, EpochSnapshot, Rate, Timestamp,
    UnstakeReceipt, WithdrawalId,
};
pub use validator::{JailWindow, ValidatorAccount, ValidatorOperations};
pub use withdrawal::{QueuedWithdrawal, WithdrawalProcessor};

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::error::{
    AuthorizationError, PhaseError, Result, SeriesError, StateError, TimingError, ValidationError,
};

/// Everything the ledger persists. Collaborators are attached separately.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerState {
    pub clock: EpochClock,
    pub validators: BTreeMap<Address, ValidatorAccount>,
    /// Validator ids in registration order.
    pub validator_order: Vec<Address>,
    /// Operator identity to validator id.
    pub operators: BTreeMap<Address, Address>,
    pub delegators: BTreeMap<Address, DelegatorAccount>,
    /// Delegators in first-stake order.
    pub delegator_order: Vec<Address>,
    pub snapshots: BTreeMap<Epoch, EpochSnapshot>,
    pub last_transition_epoch: Option<Epoch>,
    pub next_withdrawal_id: WithdrawalId,
}

impl LedgerState {
    pub fn new(clock: EpochClock) -> Self {
        Self {
            clock,
            validators: BTreeMap::new(),
            validator_order: Vec::new(),
            operators: BTreeMap::new(),
            delegators: BTreeMap::new(),
            delegator_order: Vec::new(),
            snapshots: BTreeMap::new(),
            last_transition_epoch: None,
            next_withdrawal_id: 0,
        }
    }
}

/// The staking ledger and its public operation set.
///
/// Every operation validates its inputs and the caller before the first
/// state change and calls custody before committing, so a failed call
/// leaves the ledger untouched.
pub struct StakingLedger<C: ValueCustody> {
    state: LedgerState,
    config: LedgerConfig,
    custody: C,
    allow_list: Box<dyn AllowList>,
}

impl<C: ValueCustody> StakingLedger<C> {
    pub fn new(config: LedgerConfig, custody: C, allow_list: Box<dyn AllowList>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ValidationError::InvalidParameter(e.to_string()))?;
        let clock = EpochClock::new(config.genesis.clone())?;
        Ok(Self::from_state(LedgerState::new(clock), config, custody, allow_list))
    }

    /// Re-attaches collaborators to a persisted state.
    pub fn from_state(
        state: LedgerState,
        config: LedgerConfig,
        custody: C,
        allow_list: Box<dyn AllowList>,
    ) -> Self {
        Self {
            state,
            config,
            custody,
            allow_list,
        }
    }

    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn custody_mut(&mut self) -> &mut C {
        &mut self.custody
    }

    pub fn into_state(self) -> LedgerState {
        self.state
    }

    /// Stake of `validator` at `epoch`.
    pub fn total_stake(&self, validator: &Address, epoch: Epoch) -> Result<Amount> {
        Ok(self.validator_account(validator)?.total_stake(epoch))
    }

    /// Newest epoch the ledger has transitioned into.
    pub fn head_epoch(&self) -> Epoch {
        self.state.last_transition_epoch.map_or(0, |e| e + 1)
    }

    fn engine(&self) -> RewardEngine<'_> {
        RewardEngine::new(&self.state.clock, &self.config.reward_policy)
    }

    fn epoch_of(&self, ctx: &CallContext) -> Epoch {
        self.state.clock.epoch_at(ctx.block_number)
    }

    fn ensure_not_last_interval(&self, ctx: &CallContext) -> Result<()> {
        if self.state.clock.is_last_interval(ctx.block_number) {
            return Err(PhaseError::OnlyNotLastInterval(ctx.block_number).into());
        }
        Ok(())
    }

    fn ensure_block_producer(&self, ctx: &CallContext) -> Result<()> {
        if ctx.caller.is_zero() || ctx.caller != ctx.block_producer {
            warn!("Rejected privileged call from {}", ctx.caller);
            return Err(AuthorizationError::NotBlockProducer { caller: ctx.caller }.into());
        }
        Ok(())
    }

    fn validator_account(&self, id: &Address) -> Result<&ValidatorAccount> {
        self.state
            .validators
            .get(id)
            .ok_or_else(|| StateError::UnknownValidator(*id).into())
    }

    fn validator_account_mut(&mut self, id: &Address) -> Result<&mut ValidatorAccount> {
        self.state
            .validators
            .get_mut(id)
            .ok_or_else(|| StateError::UnknownValidator(*id).into())
    }

    fn owner_of_operator(&self, operator: &Address) -> Result<Address> {
        self.state
            .operators
            .get(operator)
            .copied()
            .ok_or_else(|| StateError::UnknownOperator(*operator).into())
    }

    /// Validator id the caller controls as owner or operator.
    fn controlled_validator(&self, caller: &Address) -> Result<Address> {
        if self.state.validators.contains_key(caller) {
            return Ok(*caller);
        }
        self.state
            .operators
            .get(caller)
            .copied()
            .ok_or_else(|| StateError::UnknownValidator(*caller).into())
    }

    /// Whether `identity` is already bound to a validator other than `owner`.
    fn identity_taken(&self, identity: &Address, owner: &Address) -> bool {
        let as_operator = self
            .state
            .operators
            .get(identity)
            .map_or(false, |o| o != owner);
        let as_owner = identity != owner && self.state.validators.contains_key(identity);
        as_operator || as_owner
    }

    fn allocate_withdrawal_id(&mut self) -> WithdrawalId {
        let id = self.state.next_withdrawal_id;
        self.state.next_withdrawal_id += 1;
        id
    }

    fn validator_info(&self, validator: &ValidatorAccount, epoch: Epoch) -> ValidatorInfo {
        let threshold = self.state.clock.params_at_epoch(epoch).candidacy_threshold;
        ValidatorInfo {
            owner: validator.owner,
            operator: validator.operator,
            epoch,
            stake: validator.total_stake(epoch),
            next_stake: validator.total_stake(epoch + 1),
            commission_rate: validator.commission_rate_at(epoch),
            is_candidate: lifecycle::is_candidate(validator, epoch, threshold),
            jailed: validator.is_jailed(epoch),
            delegator_count: validator.delegators.len(),
        }
    }

    fn positions_of(&self, delegator: &DelegatorAccount, validator: &Address, epoch: Epoch) -> Vec<StakePosition> {
        delegator
            .positions_for(validator)
            .map(|(asset, series)| StakePosition {
                delegator: delegator.signer,
                validator: *validator,
                asset: *asset,
                current: series.find(epoch),
                next: series.find(epoch + 1),
            })
            .collect()
    }

    /// Reward owed to `delegator` from `validator`, with the epochs it covers.
    fn accrued_reward(
        &self,
        delegator: &Address,
        validator: &Address,
        epoch_limit: u64,
        current: Epoch,
    ) -> Result<Option<(RangeInclusive<Epoch>, Amount)>> {
        let account = self.validator_account(validator)?;
        let Some(position) = self.state.delegators.get(delegator) else {
            return Ok(None);
        };
        let Some(last_claimed) = position.last_claimed(validator) else {
            return Ok(None);
        };
        let Some(range) = RewardEngine::claimable_range(last_claimed, epoch_limit, current) else {
            return Ok(None);
        };
        let engine = self.engine();
        let amount = range
            .clone()
            .map(|epoch| engine.delegator_reward(account, epoch, position.validator_stake_at(validator, epoch)))
            .fold(0, Amount::saturating_add);
        Ok(Some((range, amount)))
    }

    fn accrued_commission(
        &self,
        validator: &Address,
        epoch_limit: u64,
        current: Epoch,
    ) -> Result<Option<(RangeInclusive<Epoch>, Amount)>> {
        let account = self.validator_account(validator)?;
        let Some(range) =
            RewardEngine::claimable_range(account.last_claimed_commission_epoch, epoch_limit, current)
        else {
            return Ok(None);
        };
        let amount = self.engine().commission(account, range.clone());
        Ok(Some((range, amount)))
    }

    /// Shared body of both unstake paths.
    fn remove_stake(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        asset: AssetClass,
        amount: Amount,
        refund_pending: bool,
        unlock_time: Timestamp,
    ) -> Result<UnstakeReceipt> {
        self.ensure_not_last_interval(ctx)?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        self.validator_account(validator)?;
        let current = self.epoch_of(ctx);
        let next = current + 1;

        let delegator = self
            .state
            .delegators
            .get(&ctx.caller)
            .ok_or(StateError::UnknownDelegator(ctx.caller))?;
        let (staked_next, staked_now) = delegator
            .stakes
            .get(&(*validator, asset))
            .map_or((0, 0), |series| (series.find(next), series.find(current)));

        // over-unstake clamps to what is staked
        let actual = amount.min(staked_next);
        if actual == 0 {
            debug!("Unstake from {} by {} had nothing staked", validator, ctx.caller);
            return Ok(UnstakeReceipt {
                amount: 0,
                refunded: 0,
                queued: None,
            });
        }
        let refunded = if refund_pending {
            actual.min(staked_next.saturating_sub(staked_now))
        } else {
            0
        };
        let queued_amount = actual - refunded;

        if refunded > 0 {
            self.custody.push(&ctx.caller, asset, refunded)?;
        }

        if let Some(series) = self
            .state
            .delegators
            .get_mut(&ctx.caller)
            .and_then(|d| d.stakes.get_mut(&(*validator, asset)))
        {
            series.sub(next, actual)?;
        }
        self.validator_account_mut(validator)?.stake.sub(next, actual)?;

        let queued = if queued_amount > 0 {
            let id = self.allocate_withdrawal_id();
            if let Some(delegator) = self.state.delegators.get_mut(&ctx.caller) {
                delegator.withdrawals.push(QueuedWithdrawal {
                    id,
                    validator: *validator,
                    asset,
                    amount: queued_amount,
                    unlock_time,
                    claimed: false,
                });
            }
            Some(id)
        } else {
            None
        };

        info!(
            "Unstaked {} {} from {} by {}: refunded {}, queued {} until {}",
            actual, asset, validator, ctx.caller, refunded, queued_amount, unlock_time
        );
        Ok(UnstakeReceipt {
            amount: actual,
            refunded,
            queued,
        })
    }
}

impl<C: ValueCustody> ValidatorOperations for StakingLedger<C> {
    fn register_validator(&mut self, ctx: &CallContext, operator: Address) -> Result<()> {
        let owner = ctx.caller;
        owner.ensure_non_zero()?;
        operator.ensure_non_zero()?;
        if !self.allow_list.is_allowed(&owner) {
            warn!("Registration by {} rejected by allow-list", owner);
            return Err(AuthorizationError::NotAllowListed(owner).into());
        }
        if self.state.validators.contains_key(&owner) {
            return Err(StateError::AlreadyRegistered(owner).into());
        }
        if self.identity_taken(&owner, &owner) {
            return Err(ValidationError::DuplicateIdentity(owner).into());
        }
        if self.identity_taken(&operator, &owner) {
            return Err(ValidationError::DuplicateIdentity(operator).into());
        }

        let epoch = self.epoch_of(ctx);
        let mut account = ValidatorAccount::new(owner, operator, epoch);
        account
            .commission_rate
            .set(epoch, self.config.initial_commission_rate)?;

        self.state.validators.insert(owner, account);
        self.state.validator_order.push(owner);
        self.state.operators.insert(operator, owner);
        info!("Registered validator {} with operator {} at epoch {}", owner, operator, epoch);
        Ok(())
    }

    fn update_operator(&mut self, ctx: &CallContext, new_operator: Address) -> Result<()> {
        new_operator.ensure_non_zero()?;
        let owner = ctx.caller;
        let old_operator = match self.state.validators.get(&owner) {
            Some(account) => account.operator,
            None => {
                return Err(match self.state.operators.get(&owner) {
                    Some(validator) => AuthorizationError::NotOwner {
                        caller: owner,
                        validator: *validator,
                    }
                    .into(),
                    None => StateError::UnknownValidator(owner).into(),
                })
            }
        };
        if old_operator == new_operator {
            return Ok(());
        }
        if self.identity_taken(&new_operator, &owner) {
            return Err(ValidationError::DuplicateIdentity(new_operator).into());
        }

        self.state.operators.remove(&old_operator);
        self.state.operators.insert(new_operator, owner);
        self.validator_account_mut(&owner)?.operator = new_operator;
        info!("Validator {} rotated operator {} -> {}", owner, old_operator, new_operator);
        Ok(())
    }

    fn set_active(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        epochs: &[Epoch],
        active: bool,
    ) -> Result<Vec<Epoch>> {
        let account = self.validator_account(validator)?;
        if !account.is_controller(&ctx.caller) {
            return Err(AuthorizationError::NotValidatorController {
                caller: ctx.caller,
                validator: *validator,
            }
            .into());
        }
        let current = self.epoch_of(ctx);
        let (applied, skipped): (Vec<Epoch>, Vec<Epoch>) =
            epochs.iter().copied().partition(|e| *e > current);
        if !skipped.is_empty() {
            debug!("Ignoring non-future activation targets {:?} for {}", skipped, validator);
        }

        let account = self.validator_account_mut(validator)?;
        for epoch in &applied {
            account.active_overrides.insert(*epoch, active);
        }
        info!(
            "Validator {} marked {} for epochs {:?}",
            validator,
            if active { "active" } else { "inactive" },
            applied
        );
        Ok(applied)
    }

    fn update_commission_rate(&mut self, ctx: &CallContext, rate: Rate) -> Result<()> {
        let validator = self.controlled_validator(&ctx.caller)?;
        let next = self.epoch_of(ctx) + 1;
        let cap = self.state.clock.params_at_epoch(next).commission_cap;
        if rate > cap {
            return Err(ValidationError::CommissionAboveCap { rate, cap }.into());
        }
        self.validator_account_mut(&validator)?
            .commission_rate
            .set(next, rate)?;
        info!("Validator {} commission set to {} from epoch {}", validator, rate, next);
        Ok(())
    }

    fn validator(&self, owner: &Address) -> Option<&ValidatorAccount> {
        self.state.validators.get(owner)
    }

    fn validator_by_operator(&self, operator: &Address) -> Option<&ValidatorAccount> {
        self.state
            .operators
            .get(operator)
            .and_then(|owner| self.state.validators.get(owner))
    }

    fn validators(&self, epoch: Epoch, cursor: usize, limit: usize) -> Page<ValidatorInfo> {
        query::paginate(self.state.validator_order.iter(), cursor, limit).filter_map(|id| {
            self.state
                .validators
                .get(id)
                .map(|account| self.validator_info(account, epoch))
        })
    }

    fn validator_count(&self) -> usize {
        self.state.validator_order.len()
    }
}

impl<C: ValueCustody> DelegationOperations for StakingLedger<C> {
    fn stake(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        asset: AssetClass,
        amount: Amount,
    ) -> Result<()> {
        self.ensure_not_last_interval(ctx)?;
        if amount == 0 {
            return Err(ValidationError::ZeroAmount.into());
        }
        ctx.caller.ensure_non_zero()?;
        let current = self.epoch_of(ctx);
        let next = current + 1;

        let account = self.validator_account(validator)?;
        let position = self
            .state
            .delegators
            .get(&ctx.caller)
            .map_or(0, |d| d.stake_at(validator, asset, next));
        if account.total_stake(next).checked_add(amount).is_none() || position.checked_add(amount).is_none() {
            return Err(SeriesError::Overflow(next).into());
        }

        self.custody.pull(&ctx.caller, asset, amount)?;

        let caller = ctx.caller;
        if !self.state.delegators.contains_key(&caller) {
            self.state.delegators.insert(caller, DelegatorAccount::new(caller));
            self.state.delegator_order.push(caller);
        }
        let mut first_stake = false;
        if let Some(delegator) = self.state.delegators.get_mut(&caller) {
            if !delegator.validators.contains(validator) {
                delegator.validators.push(*validator);
                first_stake = true;
            }
            delegator.last_claimed_reward_epoch.entry(*validator).or_insert(current);
            delegator
                .stakes
                .entry((*validator, asset))
                .or_default()
                .add(next, amount)?;
        }
        let account = self.validator_account_mut(validator)?;
        if first_stake {
            account.delegators.push(caller);
        }
        account.stake.add(next, amount)?;

        info!(
            "Staked {} {} to {} by {} effective epoch {}",
            amount, asset, validator, caller, next
        );
        Ok(())
    }

    fn unstake(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        asset: AssetClass,
        amount: Amount,
    ) -> Result<UnstakeReceipt> {
        let unlock_time = ctx.timestamp.saturating_add(self.config.lock_duration);
        self.remove_stake(ctx, validator, asset, amount, true, unlock_time)
    }

    fn unstake_at_epoch_end(
        &mut self,
        ctx: &CallContext,
        validator: &Address,
        asset: AssetClass,
        amount: Amount,
    ) -> Result<UnstakeReceipt> {
        let clock = &self.state.clock;
        let params = clock.params_at_block(ctx.block_number);
        let remaining = clock.blocks_until_epoch_end(ctx.block_number) + 1;
        let unlock_time = ctx
            .timestamp
            .saturating_add(remaining.saturating_mul(params.block_duration));
        self.remove_stake(ctx, validator, asset, amount, false, unlock_time)
    }

    fn delegator(&self, signer: &Address) -> Option<&DelegatorAccount> {
        self.state.delegators.get(signer)
    }

    fn delegators(&self, cursor: usize, limit: usize) -> Page<Address> {
        query::paginate(self.state.delegator_order.iter().copied(), cursor, limit)
    }

    fn validator_delegations(
        &self,
        validator: &Address,
        cursor: usize,
        limit: usize,
    ) -> Page<StakePosition> {
        let Some(account) = self.state.validators.get(validator) else {
            return Page::empty(0);
        };
        let epoch = self.head_epoch();
        let positions: Vec<StakePosition> = account
            .delegators
            .iter()
            .filter_map(|d| self.state.delegators.get(d))
            .flat_map(|d| self.positions_of(d, validator, epoch))
            .collect();
        query::paginate(positions.into_iter(), cursor, limit)
    }

    fn delegator_validators(
        &self,
        delegator: &Address,
        cursor: usize,
        limit: usize,
    ) -> Page<StakePosition> {
        let Some(account) = self.state.delegators.get(delegator) else {
            return Page::empty(0);
        };
        let epoch = self.head_epoch();
        let positions: Vec<StakePosition> = account
            .validators
            .iter()
            .flat_map(|v| self.positions_of(account, v, epoch))
            .collect();
        query::paginate(positions.into_iter(), cursor, limit)
    }
}

impl<C: ValueCustody> RewardsDistributor for StakingLedger<C> {
    fn claim_reward(&mut self, ctx: &CallContext, validator: &Address, epoch_limit: u64) -> Result<Amount> {
        self.ensure_not_last_interval(ctx)?;
        let current = self.epoch_of(ctx);
        let Some((range, amount)) = self.accrued_reward(&ctx.caller, validator, epoch_limit, current)? else {
            debug!("Nothing to claim for {} from {}", ctx.caller, validator);
            return Ok(0);
        };

        if amount > 0 {
            self.custody.push(&ctx.caller, AssetClass::Native, amount)?;
        }
        if let Some(delegator) = self.state.delegators.get_mut(&ctx.caller) {
            delegator
                .last_claimed_reward_epoch
                .insert(*validator, *range.end());
        }
        info!(
            "Delegator {} claimed {} from {} for epochs {}..={}",
            ctx.caller,
            amount,
            validator,
            range.start(),
            range.end()
        );
        Ok(amount)
    }

    fn claim_commission(&mut self, ctx: &CallContext, validator: &Address, epoch_limit: u64) -> Result<Amount> {
        self.ensure_not_last_interval(ctx)?;
        let account = self.validator_account(validator)?;
        if !account.is_controller(&ctx.caller) {
            return Err(AuthorizationError::NotValidatorController {
                caller: ctx.caller,
                validator: *validator,
            }
            .into());
        }
        let owner = account.owner;
        let current = self.epoch_of(ctx);
        let Some((range, amount)) = self.accrued_commission(validator, epoch_limit, current)? else {
            debug!("No commission to claim for {}", validator);
            return Ok(0);
        };

        if amount > 0 {
            self.custody.push(&owner, AssetClass::Native, amount)?;
        }
        self.validator_account_mut(validator)?.last_claimed_commission_epoch = *range.end();
        info!(
            "Validator {} claimed commission {} for epochs {}..={}",
            validator,
            amount,
            range.start(),
            range.end()
        );
        Ok(amount)
    }

    fn reward(&self, validator: &Address, epoch: Epoch) -> Result<RewardOutcome> {
        let account = self.validator_account(validator)?;
        Ok(self.engine().reward(account, epoch))
    }

    fn pending_reward(&self, delegator: &Address, validator: &Address, epoch_limit: u64, block: u64) -> Result<Amount> {
        let current = self.state.clock.epoch_at(block);
        Ok(self
            .accrued_reward(delegator, validator, epoch_limit, current)?
            .map_or(0, |(_, amount)| amount))
    }

    fn pending_commission(&self, validator: &Address, epoch_limit: u64, block: u64) -> Result<Amount> {
        let current = self.state.clock.epoch_at(block);
        Ok(self
            .accrued_commission(validator, epoch_limit, current)?
            .map_or(0, |(_, amount)| amount))
    }
}

impl<C: ValueCustody> WithdrawalProcessor for StakingLedger<C> {
    fn claim_queued_withdrawal(&mut self, ctx: &CallContext, id: WithdrawalId) -> Result<Amount> {
        self.ensure_not_last_interval(ctx)?;
        let withdrawal = self
            .state
            .delegators
            .get(&ctx.caller)
            .and_then(|d| d.withdrawal(id))
            .ok_or(StateError::UnknownWithdrawal(id))?;
        if withdrawal.claimed {
            return Err(TimingError::AlreadyClaimed(id).into());
        }
        if !withdrawal.is_unlocked(ctx.timestamp) {
            return Err(TimingError::StillLocked {
                id,
                unlock_time: withdrawal.unlock_time,
                now: ctx.timestamp,
            }
            .into());
        }
        let (asset, amount) = (withdrawal.asset, withdrawal.amount);

        self.custody.push(&ctx.caller, asset, amount)?;
        if let Some(entry) = self
            .state
            .delegators
            .get_mut(&ctx.caller)
            .and_then(|d| d.withdrawals.iter_mut().find(|w| w.id == id))
        {
            entry.claimed = true;
        }
        info!("Withdrawal {} of {} {} paid to {}", id, amount, asset, ctx.caller);
        Ok(amount)
    }

    fn queued_withdrawals(&self, delegator: &Address, cursor: usize, limit: usize) -> Page<QueuedWithdrawal> {
        match self.state.delegators.get(delegator) {
            Some(account) => query::paginate(account.withdrawals.iter().cloned(), cursor, limit),
            None => Page::empty(0),
        }
    }

    fn total_queued(&self, delegator: &Address) -> Amount {
        self.state.delegators.get(delegator).map_or(0, |account| {
            account
                .withdrawals
                .iter()
                .filter(|w| !w.claimed)
                .map(|w| w.amount)
                .sum()
        })
    }
}

impl<C: ValueCustody> SlashingOperations for StakingLedger<C> {
    fn record_slash(&mut self, ctx: &CallContext, operator: &Address) -> Result<Option<JailWindow>> {
        let authorized = (!ctx.caller.is_zero() && ctx.caller == ctx.block_producer)
            || self.config.is_slash_reporter(&ctx.caller);
        if !authorized {
            warn!("Slash report from {} rejected", ctx.caller);
            return Err(AuthorizationError::NotSlashReporter { caller: ctx.caller }.into());
        }
        let owner = self.owner_of_operator(operator)?;
        let epoch = self.epoch_of(ctx);
        let params = self.state.clock.params_at_epoch(epoch).clone();
        let account = self.validator_account_mut(&owner)?;
        let window = lifecycle::apply_slash(account, epoch, &params);
        debug!(
            "Slash recorded for {} at epoch {} (count {})",
            operator,
            epoch,
            account.slash_count_at(epoch)
        );
        Ok(window)
    }

    fn punish_misbehavior(&mut self, ctx: &CallContext, operator: &Address) -> Result<Option<JailWindow>> {
        if !self.config.is_slash_reporter(&ctx.caller) {
            warn!("Misbehavior report from {} rejected", ctx.caller);
            return Err(AuthorizationError::NotSlashReporter { caller: ctx.caller }.into());
        }
        let owner = self.owner_of_operator(operator)?;
        let epoch = self.epoch_of(ctx);
        let duration = self.state.clock.params_at_epoch(epoch).jail_duration;
        let account = self.validator_account_mut(&owner)?;
        Ok(lifecycle::jail(account, epoch, duration))
    }
}

impl<C: ValueCustody> EpochManager for StakingLedger<C> {
    fn current_epoch(&self, block: u64) -> Epoch {
        self.state.clock.epoch_at(block)
    }

    fn record_expected_blocks(&mut self, ctx: &CallContext, operators: &[Address], counts: &[u64]) -> Result<()> {
        self.ensure_block_producer(ctx)?;
        if !self.state.clock.is_first_interval(ctx.block_number) {
            return Err(PhaseError::OnlyFirstInterval(ctx.block_number).into());
        }
        if operators.len() != counts.len() {
            return Err(ValidationError::LengthMismatch {
                operators: operators.len(),
                counts: counts.len(),
            }
            .into());
        }
        let owners = operators
            .iter()
            .map(|op| self.owner_of_operator(op))
            .collect::<Result<Vec<Address>>>()?;

        let epoch = self.epoch_of(ctx);
        for (owner, count) in owners.iter().zip(counts) {
            self.validator_account_mut(owner)?
                .expected_blocks
                .insert(epoch, *count);
        }
        debug!("Recorded expected blocks for {} operators at epoch {}", owners.len(), epoch);
        Ok(())
    }

    fn transition_epoch(&mut self, ctx: &CallContext) -> Result<EpochSnapshot> {
        self.ensure_block_producer(ctx)?;
        if !self.state.clock.is_last_interval(ctx.block_number) {
            return Err(PhaseError::OnlyLastInterval(ctx.block_number).into());
        }
        let current = self.epoch_of(ctx);
        if self.state.last_transition_epoch == Some(current) {
            warn!("Duplicate transition for epoch {}", current);
            return Err(StateError::TransitionAlreadyApplied(current).into());
        }

        let next = current + 1;
        let ordered: Vec<&ValidatorAccount> = self
            .state
            .validator_order
            .iter()
            .filter_map(|id| self.state.validators.get(id))
            .collect();
        let snapshot = EpochSnapshot {
            epoch: next,
            current: lifecycle::select_candidates(ordered.iter().copied(), &self.state.clock, next),
            next: lifecycle::select_candidates(ordered.iter().copied(), &self.state.clock, next + 1),
        };

        self.state.snapshots.insert(next, snapshot.clone());
        self.state.last_transition_epoch = Some(current);
        info!(
            "Epoch {} -> {}: {} candidates, {} for the following epoch",
            current,
            next,
            snapshot.current.len(),
            snapshot.next.len()
        );
        Ok(snapshot)
    }

    fn snapshot(&self, epoch: Epoch) -> Option<&EpochSnapshot> {
        self.state.snapshots.get(&epoch)
    }

    fn is_candidate(&self, validator: &Address, epoch: Epoch) -> Result<bool> {
        let account = self.validator_account(validator)?;
        let threshold = self.state.clock.params_at_epoch(epoch).candidacy_threshold;
        Ok(lifecycle::is_candidate(account, epoch, threshold))
    }

    fn schedule_parameters(&mut self, ctx: &CallContext, update: ParameterUpdate) -> Result<EpochParameters> {
        if self.config.governance.is_zero() || ctx.caller != self.config.governance {
            return Err(AuthorizationError::NotGovernance { caller: ctx.caller }.into());
        }
        let params = self.state.clock.schedule(update, ctx.block_number)?.clone();
        info!(
            "Parameters scheduled for epoch {} at block {}",
            params.activation_epoch, params.activation_block
        );
        Ok(params)
    }

    fn parameters_at(&self, epoch: Epoch) -> &EpochParameters {
        self.state.clock.params_at_epoch(epoch)
    }
}


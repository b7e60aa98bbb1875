//! Reward and commission computation.
//!
//! All amounts are computed in fixed point with
//! [`REWARD_PRECISION_DIGITS`] fractional digits on arbitrary-precision
//! integers and truncated once at the end, so the split between delegators
//! and the validator is reproducible bit for bit. Commission always rounds
//! down.

use std::ops::RangeInclusive;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::config::RewardPolicy;
use crate::error::Result;
use crate::staking::epoch::EpochClock;
use crate::staking::types::{Address, Amount, CallContext, Epoch, RATE_DENOMINATOR};
use crate::staking::validator::ValidatorAccount;

pub const REWARD_PRECISION_DIGITS: u32 = 25;
pub const SECONDS_PER_YEAR: u64 = 365 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardOutcome {
    pub amount: Amount,
    pub total_stake: Amount,
}

fn precision() -> BigUint {
    BigUint::from(10u32).pow(REWARD_PRECISION_DIGITS)
}

fn to_amount(value: &BigUint) -> Amount {
    u128::try_from(value).unwrap_or(Amount::MAX)
}

/// Read-only reward calculator over a validator's epoch-indexed facts.
pub struct RewardEngine<'a> {
    clock: &'a EpochClock,
    policy: &'a RewardPolicy,
}

impl<'a> RewardEngine<'a> {
    pub fn new(clock: &'a EpochClock, policy: &'a RewardPolicy) -> Self {
        Self { clock, policy }
    }

    /// Gross reward in fixed point, or `None` when the validator earns nothing.
    ///
    /// `stake * rate * epoch_seconds / (RATE_DENOMINATOR * SECONDS_PER_YEAR)`
    /// scaled by the operating ratio, divided once.
    fn reward_fixed(&self, validator: &ValidatorAccount, epoch: Epoch) -> (Option<BigUint>, Amount) {
        let total_stake = validator.total_stake(epoch);
        if total_stake == 0 || validator.is_inactive(epoch) || validator.is_jailed(epoch) {
            return (None, total_stake);
        }
        let params = self.clock.params_at_epoch(epoch);
        if self.policy.threshold_gated(epoch) && total_stake < params.candidacy_threshold {
            return (None, total_stake);
        }
        let expected = validator.expected_blocks_at(epoch);
        let slashed = validator.slash_count_at(epoch);
        if expected == 0 || slashed >= expected {
            return (None, total_stake);
        }
        let numerator = BigUint::from(total_stake)
            * BigUint::from(params.reward_rate)
            * precision()
            * BigUint::from(params.epoch_length)
            * BigUint::from(params.block_duration)
            * BigUint::from(expected - slashed);
        let denominator = BigUint::from(RATE_DENOMINATOR)
            * BigUint::from(SECONDS_PER_YEAR)
            * BigUint::from(expected);
        (Some(numerator / denominator), total_stake)
    }

    /// Fixed-point share left to delegators after commission.
    fn after_commission_fixed(&self, validator: &ValidatorAccount, epoch: Epoch) -> (Option<BigUint>, Amount) {
        let (gross, total_stake) = self.reward_fixed(validator, epoch);
        let after = gross.map(|gross| {
            let rate = validator.commission_rate_at(epoch).min(RATE_DENOMINATOR);
            let commission = &gross * BigUint::from(rate) / BigUint::from(RATE_DENOMINATOR);
            gross - commission
        });
        (after, total_stake)
    }

    pub fn reward(&self, validator: &ValidatorAccount, epoch: Epoch) -> RewardOutcome {
        let (gross, total_stake) = self.reward_fixed(validator, epoch);
        let amount = gross.map_or(0, |g| to_amount(&(g / precision())));
        RewardOutcome { amount, total_stake }
    }

    pub fn reward_after_commission(&self, validator: &ValidatorAccount, epoch: Epoch) -> Amount {
        let (after, _) = self.after_commission_fixed(validator, epoch);
        after.map_or(0, |a| to_amount(&(a / precision())))
    }

    /// Share of the post-commission reward owed to `stake` units at `epoch`.
    pub fn delegator_reward(&self, validator: &ValidatorAccount, epoch: Epoch, stake: Amount) -> Amount {
        if stake == 0 {
            return 0;
        }
        match self.after_commission_fixed(validator, epoch) {
            (Some(after), total_stake) if total_stake > 0 => {
                let share = after * BigUint::from(stake) / (BigUint::from(total_stake) * precision());
                to_amount(&share)
            }
            _ => 0,
        }
    }

    /// Commission accrued over `epochs`.
    pub fn commission(&self, validator: &ValidatorAccount, epochs: RangeInclusive<Epoch>) -> Amount {
        epochs
            .map(|epoch| {
                self.reward(validator, epoch)
                    .amount
                    .saturating_sub(self.reward_after_commission(validator, epoch))
            })
            .fold(0, Amount::saturating_add)
    }

    /// Epochs claimable after `last_claimed`, bounded by `limit` and
    /// excluding the current epoch, which has not fully accrued.
    pub fn claimable_range(last_claimed: Epoch, limit: u64, current: Epoch) -> Option<RangeInclusive<Epoch>> {
        if limit == 0 || current == 0 {
            return None;
        }
        let first = last_claimed + 1;
        let last = (current - 1).min(last_claimed.saturating_add(limit));
        (first <= last).then(|| first..=last)
    }
}

pub trait RewardsDistributor {
    /// Pays the caller's delegation reward from `validator` for up to
    /// `epoch_limit` unclaimed epochs. Returns the paid amount; `0` when
    /// there is nothing to claim.
    fn claim_reward(&mut self, ctx: &CallContext, validator: &Address, epoch_limit: u64) -> Result<Amount>;

    /// Pays accrued commission of `validator` to its owner. The caller must
    /// be the owner or operator.
    fn claim_commission(&mut self, ctx: &CallContext, validator: &Address, epoch_limit: u64) -> Result<Amount>;

    fn reward(&self, validator: &Address, epoch: Epoch) -> Result<RewardOutcome>;

    /// Reward `claim_reward` would pay at `block`.
    fn pending_reward(&self, delegator: &Address, validator: &Address, epoch_limit: u64, block: u64) -> Result<Amount>;

    /// Commission `claim_commission` would pay at `block`.
    fn pending_commission(&self, validator: &Address, epoch_limit: u64, block: u64) -> Result<Amount>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking::epoch::EpochParameters;
    use crate::staking::validator::JailWindow;

    fn params() -> EpochParameters {
        // 10% a year, one-day epochs of one-second blocks
        EpochParameters {
            epoch_length: 86_400,
            block_duration: 1,
            reward_rate: 1_000,
            candidacy_threshold: 1_000,
            ..EpochParameters::default()
        }
    }

    fn validator_with_stake(stake: Amount) -> ValidatorAccount {
        let mut validator = ValidatorAccount::new(Address([1u8; 32]), Address([2u8; 32]), 0);
        validator.stake.add(1, stake).unwrap();
        validator.expected_blocks.insert(1, 100);
        validator
    }

    #[test]
    fn test_reward_annualized() {
        let clock = EpochClock::new(params()).unwrap();
        let policy = RewardPolicy::default();
        let engine = RewardEngine::new(&clock, &policy);
        let validator = validator_with_stake(365_000_000);

        // 365e6 * 10% / 365 days
        let outcome = engine.reward(&validator, 1);
        assert_eq!(outcome.amount, 100_000);
        assert_eq!(outcome.total_stake, 365_000_000);
    }

    #[test]
    fn test_operating_ratio_scales_reward() {
        let clock = EpochClock::new(params()).unwrap();
        let policy = RewardPolicy::default();
        let engine = RewardEngine::new(&clock, &policy);
        let mut validator = validator_with_stake(365_000_000);
        validator.slash_count.insert(1, 25);

        assert_eq!(engine.reward(&validator, 1).amount, 75_000);

        validator.slash_count.insert(1, 100);
        assert_eq!(engine.reward(&validator, 1).amount, 0);

        validator.expected_blocks.insert(1, 0);
        assert_eq!(engine.reward(&validator, 1).amount, 0);
    }

    #[test]
    fn test_no_reward_when_jailed_inactive_or_below_threshold() {
        let clock = EpochClock::new(params()).unwrap();
        let gated = RewardPolicy {
            threshold_gate_from: Some(0),
        };
        let mut validator = validator_with_stake(500);

        let ungated_policy = RewardPolicy::default();
        let ungated = RewardEngine::new(&clock, &ungated_policy);
        assert_eq!(ungated.reward(&validator, 1).total_stake, 500);

        let engine = RewardEngine::new(&clock, &gated);
        assert_eq!(engine.reward(&validator, 1).amount, 0);

        validator.stake.add(1, 365_000_000).unwrap();
        assert!(engine.reward(&validator, 1).amount > 0);

        validator.jail_windows.push(JailWindow { from: 1, until: 1 });
        assert_eq!(engine.reward(&validator, 1).amount, 0);

        validator.jail_windows.clear();
        validator.active_overrides.insert(1, false);
        assert_eq!(engine.reward(&validator, 1).amount, 0);
    }

    #[test]
    fn test_commission_rounds_down() {
        let clock = EpochClock::new(params()).unwrap();
        let policy = RewardPolicy::default();
        let engine = RewardEngine::new(&clock, &policy);
        let mut validator = validator_with_stake(365_000_000);
        validator.commission_rate.set(0, 1_234).unwrap();

        // 100_000 * 12.34% = 12_340
        assert_eq!(engine.reward_after_commission(&validator, 1), 87_660);
        assert_eq!(engine.commission(&validator, 1..=1), 12_340);

        // commission of an odd reward never rounds up
        let mut odd = validator_with_stake(3_650_003);
        odd.commission_rate.set(0, 3_333).unwrap();
        let gross = engine.reward(&odd, 1).amount;
        let after = engine.reward_after_commission(&odd, 1);
        assert_eq!(gross, 1_000);
        assert_eq!(after, 666);
        assert!(gross - after <= gross * 3_333 / 10_000 + 1);
    }

    #[test]
    fn test_delegator_shares_never_exceed_gross() {
        let clock = EpochClock::new(params()).unwrap();
        let policy = RewardPolicy::default();
        let engine = RewardEngine::new(&clock, &policy);
        let stakes: [Amount; 3] = [1_000_003, 2_000_007, 363_999_991];
        let total: Amount = stakes.iter().sum();
        let mut validator = validator_with_stake(total);
        validator.commission_rate.set(0, 777).unwrap();

        let gross = engine.reward(&validator, 1).amount;
        let commission = engine.commission(&validator, 1..=1);
        let delegated: Amount = stakes
            .iter()
            .map(|s| engine.delegator_reward(&validator, 1, *s))
            .sum();
        assert!(delegated + commission <= gross);
        assert!(gross - (delegated + commission) <= stakes.len() as Amount);
    }

    #[test]
    fn test_claimable_range_excludes_current() {
        assert_eq!(RewardEngine::claimable_range(0, 10, 5), Some(1..=4));
        assert_eq!(RewardEngine::claimable_range(0, 2, 5), Some(1..=2));
        assert_eq!(RewardEngine::claimable_range(4, 10, 5), None);
        assert_eq!(RewardEngine::claimable_range(0, 0, 5), None);
        assert_eq!(RewardEngine::claimable_range(0, 10, 0), None);
    }
}

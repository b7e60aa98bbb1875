//! Validator candidacy, jailing and epoch transition.
//!
//! Candidacy is derived from epoch-indexed facts only (overrides, jail
//! windows, stake history and the threshold in force), so it can be
//! replayed for any epoch.

use log::warn;

use crate::error::Result;
use crate::staking::epoch::{EpochClock, EpochParameters, ParameterUpdate};
use crate::staking::types::{Address, Amount, CallContext, Epoch, EpochSnapshot};
use crate::staking::validator::{JailWindow, ValidatorAccount};

pub fn is_candidate(validator: &ValidatorAccount, epoch: Epoch, threshold: Amount) -> bool {
    !validator.is_inactive(epoch) && !validator.is_jailed(epoch) && validator.total_stake(epoch) >= threshold
}

/// Operators of every candidate at `epoch`, in iteration order.
pub fn select_candidates<'a, I>(validators: I, clock: &EpochClock, epoch: Epoch) -> Vec<Address>
where
    I: IntoIterator<Item = &'a ValidatorAccount>,
{
    let threshold = clock.params_at_epoch(epoch).candidacy_threshold;
    validators
        .into_iter()
        .filter(|v| is_candidate(v, epoch, threshold))
        .map(|v| v.operator)
        .collect()
}

/// Opens a jail window `[epoch + 1, epoch + duration]` unless one already
/// starts at or after `epoch`.
pub fn jail(validator: &mut ValidatorAccount, epoch: Epoch, duration: u64) -> Option<JailWindow> {
    if duration == 0 {
        return None;
    }
    if validator.latest_jail().map_or(false, |w| w.from >= epoch) {
        return None;
    }
    let window = JailWindow {
        from: epoch.saturating_add(1),
        until: epoch.saturating_add(duration),
    };
    validator.jail_windows.push(window);
    warn!(
        "Validator {} jailed for epochs {}..={}",
        validator.owner, window.from, window.until
    );
    Some(window)
}

/// Counts one missed-block slash at `epoch` and jails the validator once
/// the count reaches the threshold. A zero threshold disables jailing.
pub fn apply_slash(
    validator: &mut ValidatorAccount,
    epoch: Epoch,
    params: &EpochParameters,
) -> Option<JailWindow> {
    let count = validator.slash_count.entry(epoch).or_insert(0);
    *count += 1;
    let count = *count;
    if params.jail_threshold == 0 || count < params.jail_threshold {
        return None;
    }
    jail(validator, epoch, params.jail_duration)
}

pub trait SlashingOperations {
    /// Records one missed block for `operator` in the current epoch.
    /// Returns the jail window opened by this slash, if any.
    fn record_slash(&mut self, ctx: &CallContext, operator: &Address) -> Result<Option<JailWindow>>;

    /// Jails `operator` after externally verified misbehavior evidence.
    fn punish_misbehavior(&mut self, ctx: &CallContext, operator: &Address) -> Result<Option<JailWindow>>;
}

pub trait EpochManager {
    fn current_epoch(&self, block: u64) -> Epoch;

    /// Records the number of blocks each operator is expected to produce in
    /// the current epoch. First interval only.
    fn record_expected_blocks(&mut self, ctx: &CallContext, operators: &[Address], counts: &[u64]) -> Result<()>;

    /// Publishes the candidate sets for the next epoch. Last interval only,
    /// once per epoch.
    fn transition_epoch(&mut self, ctx: &CallContext) -> Result<EpochSnapshot>;

    fn snapshot(&self, epoch: Epoch) -> Option<&EpochSnapshot>;

    fn is_candidate(&self, validator: &Address, epoch: Epoch) -> Result<bool>;

    /// Schedules a governance parameter change.
    fn schedule_parameters(&mut self, ctx: &CallContext, update: ParameterUpdate) -> Result<EpochParameters>;

    fn parameters_at(&self, epoch: Epoch) -> &EpochParameters;
}

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::staking::query::Page;
use crate::staking::types::{Address, Amount, AssetClass, CallContext, Timestamp, WithdrawalId};

/// Unstaked value waiting for its wall-clock lock to expire
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedWithdrawal {
    pub id: WithdrawalId,
    pub validator: Address,
    pub asset: AssetClass,
    pub amount: Amount,
    pub unlock_time: Timestamp,
    pub claimed: bool,
}

impl QueuedWithdrawal {
    pub fn is_unlocked(&self, now: Timestamp) -> bool {
        now >= self.unlock_time
    }
}

pub trait WithdrawalProcessor {
    /// Pays out a queued withdrawal owned by the caller once unlocked.
    /// Fails with a timing error while locked or when already claimed.
    fn claim_queued_withdrawal(&mut self, ctx: &CallContext, id: WithdrawalId) -> Result<Amount>;

    /// Pages through a delegator's queued withdrawals, claimed ones included.
    fn queued_withdrawals(
        &self,
        delegator: &Address,
        cursor: usize,
        limit: usize,
    ) -> Page<QueuedWithdrawal>;

    /// Sum of unclaimed queued withdrawals of a delegator.
    fn total_queued(&self, delegator: &Address) -> Amount;
}

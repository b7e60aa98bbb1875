//! Cursor-paginated views over the ledger.
//!
//! Every list view returns a [`Page`]. A `next_cursor` equal to the length
//! of the underlying list means the list is exhausted.

use serde::{Deserialize, Serialize};

use crate::staking::types::{Address, Amount, AssetClass, Epoch, Rate};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: usize,
}

impl<T> Page<T> {
    pub fn empty(len: usize) -> Self {
        Self {
            items: Vec::new(),
            next_cursor: len,
        }
    }

    /// Whether `next_cursor` reached the end of a list of `len` entries.
    pub fn is_exhausted(&self, len: usize) -> bool {
        self.next_cursor >= len
    }

    /// Converts items while keeping the cursor of the underlying list.
    pub fn filter_map<U>(self, f: impl FnMut(T) -> Option<U>) -> Page<U> {
        Page {
            items: self.items.into_iter().filter_map(f).collect(),
            next_cursor: self.next_cursor,
        }
    }
}

/// Pages over any sized iterator of owned items.
pub fn paginate<T, I>(items: I, cursor: usize, limit: usize) -> Page<T>
where
    I: ExactSizeIterator<Item = T>,
{
    let len = items.len();
    if cursor >= len {
        return Page::empty(len);
    }
    let page: Vec<T> = items.skip(cursor).take(limit).collect();
    let next_cursor = cursor + page.len();
    Page {
        items: page,
        next_cursor,
    }
}

/// Summary of a validator as seen at a given epoch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub owner: Address,
    pub operator: Address,
    pub epoch: Epoch,
    pub stake: Amount,
    pub next_stake: Amount,
    pub commission_rate: Rate,
    pub is_candidate: bool,
    pub jailed: bool,
    pub delegator_count: usize,
}

/// One `(delegator, validator, asset)` position
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakePosition {
    pub delegator: Address,
    pub validator: Address,
    pub asset: AssetClass,
    /// Stake effective in the current epoch.
    pub current: Amount,
    /// Stake committed for the next epoch.
    pub next: Amount,
}

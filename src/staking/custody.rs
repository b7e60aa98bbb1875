//! Boundaries to the collaborators the ledger does not own: value custody
//! and the registration allow-list.

use std::collections::{HashMap, HashSet};

use crate::error::CustodyError;
use crate::staking::types::{Address, Amount, AssetClass};

/// Moves value in and out of the ledger's escrow.
pub trait ValueCustody: Send + Sync {
    /// Pulls `amount` of `asset` from `from` into escrow.
    fn pull(&mut self, from: &Address, asset: AssetClass, amount: Amount) -> Result<(), CustodyError>;

    /// Pays `amount` of `asset` out of escrow to `to`.
    fn push(&mut self, to: &Address, asset: AssetClass, amount: Amount) -> Result<(), CustodyError>;
}

/// Decides who may register a validator.
pub trait AllowList: Send + Sync {
    fn is_allowed(&self, owner: &Address) -> bool;
}

/// Allows every registrant.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAllowList;

impl AllowList for OpenAllowList {
    fn is_allowed(&self, _owner: &Address) -> bool {
        true
    }
}

#[derive(Debug, Default, Clone)]
pub struct StaticAllowList {
    allowed: HashSet<Address>,
}

impl StaticAllowList {
    pub fn new(allowed: impl IntoIterator<Item = Address>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
        }
    }

    pub fn allow(&mut self, owner: Address) {
        self.allowed.insert(owner);
    }
}

impl AllowList for StaticAllowList {
    fn is_allowed(&self, owner: &Address) -> bool {
        self.allowed.contains(owner)
    }
}

/// Balance-tracking custody used by the CLI simulation and tests.
///
/// Native rewards are minted from an unbounded reward pool; staked value
/// is held in escrow per asset class.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCustody {
    balances: HashMap<(Address, AssetClass), Amount>,
    escrow: HashMap<AssetClass, Amount>,
    minted: Amount,
}

impl InMemoryCustody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&mut self, account: Address, asset: AssetClass, amount: Amount) {
        *self.balances.entry((account, asset)).or_insert(0) += amount;
    }

    pub fn balance(&self, account: &Address, asset: AssetClass) -> Amount {
        self.balances.get(&(*account, asset)).copied().unwrap_or(0)
    }

    pub fn escrowed(&self, asset: AssetClass) -> Amount {
        self.escrow.get(&asset).copied().unwrap_or(0)
    }

    /// Total native value paid out beyond what was escrowed.
    pub fn minted(&self) -> Amount {
        self.minted
    }
}

impl ValueCustody for InMemoryCustody {
    fn pull(&mut self, from: &Address, asset: AssetClass, amount: Amount) -> Result<(), CustodyError> {
        let available = self.balance(from, asset);
        if available < amount {
            return Err(CustodyError::InsufficientBalance {
                account: *from,
                required: amount,
                available,
            });
        }
        self.balances.insert((*from, asset), available - amount);
        *self.escrow.entry(asset).or_insert(0) += amount;
        Ok(())
    }

    fn push(&mut self, to: &Address, asset: AssetClass, amount: Amount) -> Result<(), CustodyError> {
        let escrowed = self.escrowed(asset);
        if escrowed >= amount {
            self.escrow.insert(asset, escrowed - amount);
        } else if asset == AssetClass::Native {
            // native shortfall is reward issuance
            self.escrow.insert(asset, 0);
            self.minted += amount - escrowed;
        } else {
            return Err(CustodyError::InsufficientEscrow {
                required: amount,
                available: escrowed,
            });
        }
        self.credit(*to, asset, amount);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pull_requires_balance() {
        let mut custody = InMemoryCustody::new();
        let alice = Address([1u8; 32]);
        custody.credit(alice, AssetClass::Native, 100);

        assert!(custody.pull(&alice, AssetClass::Native, 150).is_err());
        custody.pull(&alice, AssetClass::Native, 60).unwrap();
        assert_eq!(custody.balance(&alice, AssetClass::Native), 40);
        assert_eq!(custody.escrowed(AssetClass::Native), 60);
    }

    #[test]
    fn test_token_push_limited_to_escrow() {
        let mut custody = InMemoryCustody::new();
        let token = AssetClass::Token(Address([9u8; 32]));
        let bob = Address([2u8; 32]);
        assert!(custody.push(&bob, token, 1).is_err());

        custody.push(&bob, AssetClass::Native, 25).unwrap();
        assert_eq!(custody.minted(), 25);
        assert_eq!(custody.balance(&bob, AssetClass::Native), 25);
    }
}

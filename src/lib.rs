/*!
Stakeledger - An Epoch-Indexed Staking Ledger

This crate keeps the accounting of a delegated proof-of-stake validator set:
who stakes how much toward which validator in which epoch, which validators
are eligible for block production, how rewards and commission accrue and
when unstaked value may be withdrawn.

# Main Components

- `staking`: The ledger itself. Epoch clock, per-epoch time series, validator
  and delegator accounts, reward engine, lifecycle and withdrawals
- `config`: JSON ledger configuration
- `storage`: Binary snapshots of the ledger state
- `cli`: Command-line simulation and inspection tools

# Example Usage

```rust
use stakeledger::config::LedgerConfig;
use stakeledger::staking::{
    Address, AssetClass, CallContext, DelegationOperations, InMemoryCustody, OpenAllowList,
    StakingLedger, ValidatorOperations,
};

let owner = Address([1u8; 32]);
let delegator = Address([2u8; 32]);
let mut custody = InMemoryCustody::new();
custody.credit(delegator, AssetClass::Native, 500);

let mut ledger = StakingLedger::new(LedgerConfig::default(), custody, Box::new(OpenAllowList))?;
ledger.register_validator(&CallContext::new(owner, 1, 0, owner), Address([3u8; 32]))?;
ledger.stake(&CallContext::new(delegator, 2, 0, owner), &owner, AssetClass::Native, 500)?;
assert_eq!(ledger.total_stake(&owner, 1)?, 500);
# Ok::<(), stakeledger::error::StakingError>(())
```
*/

/// Staking ledger: accounts, epochs, rewards and lifecycle.
pub mod staking;

/// Error types shared by all ledger operations.
pub mod error;

/// Ledger configuration loaded from JSON.
pub mod config;

/// Persistence of the ledger state.
pub mod storage;

/// Command-line interface for simulating and inspecting a ledger.
pub mod cli;

// Re-export commonly used types
pub use config::LedgerConfig;
pub use error::{Result, StakingError};
pub use staking::{EpochClock, LedgerState, SharedLedger, StakingLedger, TimeSeries};
pub use storage::LedgerStorage;

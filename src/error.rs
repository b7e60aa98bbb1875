//! Error types for the staking ledger.
//!
//! Every public ledger operation returns [`Result`]. Errors are grouped by
//! category so callers can tell a malformed request apart from a call made
//! in the wrong epoch phase or a withdrawal claimed too early. An operation
//! that returns an error has not changed any ledger state.

use thiserror::Error;

use crate::staking::types::{Address, Amount, BlockNumber, Epoch, Timestamp, WithdrawalId};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("authorization error: {0}")]
    Authorization(#[from] AuthorizationError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("phase error: {0}")]
    Phase(#[from] PhaseError),
    #[error("timing error: {0}")]
    Timing(#[from] TimingError),
    #[error("time series error: {0}")]
    Series(#[from] SeriesError),
    #[error("custody error: {0}")]
    Custody(#[from] CustodyError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be non-zero")]
    ZeroAmount,
    #[error("zero address is not a valid identity")]
    ZeroIdentity,
    #[error("identity {0} is already in use")]
    DuplicateIdentity(Address),
    #[error("malformed key material: {0}")]
    MalformedKey(String),
    #[error("commission rate {rate} exceeds cap {cap}")]
    CommissionAboveCap { rate: u64, cap: u64 },
    #[error("length mismatch: {operators} operators, {counts} counts")]
    LengthMismatch { operators: usize, counts: usize },
    #[error("activation epoch {target} is not after current epoch {current}")]
    PastActivation { target: Epoch, current: Epoch },
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationError {
    #[error("{caller} is neither owner nor operator of validator {validator}")]
    NotValidatorController { caller: Address, validator: Address },
    #[error("{caller} is not the owner of validator {validator}")]
    NotOwner { caller: Address, validator: Address },
    #[error("{caller} is not the block producer")]
    NotBlockProducer { caller: Address },
    #[error("{caller} may not report misbehavior")]
    NotSlashReporter { caller: Address },
    #[error("{caller} is not the governance identity")]
    NotGovernance { caller: Address },
    #[error("{0} is not on the registration allow-list")]
    NotAllowListed(Address),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("unknown validator {0}")]
    UnknownValidator(Address),
    #[error("unknown operator {0}")]
    UnknownOperator(Address),
    #[error("unknown delegator {0}")]
    UnknownDelegator(Address),
    #[error("validator {0} is already registered")]
    AlreadyRegistered(Address),
    #[error("unknown queued withdrawal {0}")]
    UnknownWithdrawal(WithdrawalId),
    #[error("epoch transition already applied for epoch {0}")]
    TransitionAlreadyApplied(Epoch),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PhaseError {
    #[error("operation is not allowed in the last interval of epoch (block {0})")]
    OnlyNotLastInterval(BlockNumber),
    #[error("operation is only allowed in the first interval of epoch (block {0})")]
    OnlyFirstInterval(BlockNumber),
    #[error("operation is only allowed in the last interval of epoch (block {0})")]
    OnlyLastInterval(BlockNumber),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimingError {
    #[error("withdrawal {id} is locked until {unlock_time} (now {now})")]
    StillLocked {
        id: WithdrawalId,
        unlock_time: Timestamp,
        now: Timestamp,
    },
    #[error("withdrawal {0} was already claimed")]
    AlreadyClaimed(WithdrawalId),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeriesError {
    #[error("epoch {epoch} is older than the oldest writable epoch {oldest}")]
    PastEpoch { epoch: Epoch, oldest: Epoch },
    #[error("value overflow at epoch {0}")]
    Overflow(Epoch),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("insufficient balance for {account}: required {required}, available {available}")]
    InsufficientBalance {
        account: Address,
        required: Amount,
        available: Amount,
    },
    #[error("insufficient escrow: required {required}, available {available}")]
    InsufficientEscrow { required: Amount, available: Amount },
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, StakingError>;

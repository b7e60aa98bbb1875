use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::ValidationError;

pub type Epoch = u64;
pub type BlockNumber = u64;
/// Seconds since the unix epoch.
pub type Timestamp = u64;
pub type Amount = u128;
/// Commission rate in basis points of [`RATE_DENOMINATOR`].
pub type Rate = u64;
pub type WithdrawalId = u64;

pub const RATE_DENOMINATOR: Rate = 10_000;

/// Upper bound on accepted public key material.
pub const MAX_KEY_LEN: usize = 4_096;

/// 32-byte identity of a validator owner, operator or delegator
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub [u8; 32]);

impl Address {
    pub const ZERO: Address = Address([0u8; 32]);

    /// Derives an address as the SHA-256 digest of the public key bytes.
    pub fn from_public_key(public_key: &[u8]) -> Result<Self, ValidationError> {
        if public_key.is_empty() {
            return Err(ValidationError::MalformedKey("empty public key".to_string()));
        }
        if public_key.len() > MAX_KEY_LEN {
            return Err(ValidationError::MalformedKey(format!(
                "public key of {} bytes exceeds {} bytes",
                public_key.len(),
                MAX_KEY_LEN
            )));
        }
        let mut hasher = Sha256::new();
        hasher.update(public_key);
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&hasher.finalize());
        Ok(Self(raw))
    }

    /// Parses a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, ValidationError> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| ValidationError::MalformedKey(e.to_string()))?;
        let raw: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ValidationError::MalformedKey("address must be 32 bytes".to_string()))?;
        Ok(Self(raw))
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Fails with `ZeroIdentity` for the all-zero address.
    pub fn ensure_non_zero(&self) -> Result<(), ValidationError> {
        if self.is_zero() {
            Err(ValidationError::ZeroIdentity)
        } else {
            Ok(())
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0[..8]))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

/// Kind of value staked. All classes count one-for-one towards a
/// validator's total stake; rewards are always paid in `Native`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Native,
    Token(Address),
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetClass::Native => write!(f, "native"),
            AssetClass::Token(addr) => write!(f, "token:{}", addr),
        }
    }
}

/// Environment of a single ledger call: who is calling and where the chain is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CallContext {
    pub caller: Address,
    pub block_number: BlockNumber,
    pub timestamp: Timestamp,
    /// Identity producing the current block.
    pub block_producer: Address,
}

impl CallContext {
    pub fn new(
        caller: Address,
        block_number: BlockNumber,
        timestamp: Timestamp,
        block_producer: Address,
    ) -> Self {
        Self {
            caller,
            block_number,
            timestamp,
            block_producer,
        }
    }

    /// Same chain position, different caller.
    pub fn with_caller(&self, caller: Address) -> Self {
        Self { caller, ..*self }
    }
}

/// Candidate sets published by an epoch transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSnapshot {
    /// Epoch the transition moved into.
    pub epoch: Epoch,
    /// Operators eligible for `epoch`.
    pub current: Vec<Address>,
    /// Operators eligible for `epoch + 1` as known at transition time.
    pub next: Vec<Address>,
}

/// Result of an unstake request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnstakeReceipt {
    /// Amount actually removed after clamping to the staked balance.
    pub amount: Amount,
    /// Part of `amount` paid back immediately because it had not taken effect.
    pub refunded: Amount,
    /// Queued remainder, if any.
    pub queued: Option<WithdrawalId>,
}

//! Binary snapshots of the ledger state.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use thiserror::Error;

use crate::staking::LedgerState;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub struct LedgerStorage {
    path: PathBuf,
}

impl LedgerStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, state: &LedgerState) -> Result<(), StorageError> {
        let serialized = bincode::serialize(state)?;
        fs::write(&self.path, &serialized)?;
        debug!("Saved ledger state ({} bytes) to {}", serialized.len(), self.path.display());
        Ok(())
    }

    pub fn load(&self) -> Result<LedgerState, StorageError> {
        let raw = fs::read(&self.path)?;
        let state: LedgerState = bincode::deserialize(&raw)?;
        debug!("Loaded ledger state from {}", self.path.display());
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::staking::epoch::{EpochClock, EpochParameters};
    use crate::staking::types::{Address, EpochSnapshot};
    use crate::staking::validator::ValidatorAccount;

    #[test]
    fn test_state_survives_save_and_load() {
        let mut state = LedgerState::new(EpochClock::new(EpochParameters::default()).unwrap());
        let owner = Address([3u8; 32]);
        let mut validator = ValidatorAccount::new(owner, Address([4u8; 32]), 0);
        validator.stake.add(1, 42).unwrap();
        state.validators.insert(owner, validator);
        state.validator_order.push(owner);
        state.snapshots.insert(
            1,
            EpochSnapshot {
                epoch: 1,
                current: vec![Address([4u8; 32])],
                next: Vec::new(),
            },
        );
        state.last_transition_epoch = Some(0);

        let path = std::env::temp_dir().join(format!("stakeledger-{}.bin", std::process::id()));
        let storage = LedgerStorage::new(&path);
        storage.save(&state).unwrap();
        let loaded = storage.load().unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, state);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let storage = LedgerStorage::new(std::env::temp_dir().join("stakeledger-does-not-exist.bin"));
        assert!(matches!(storage.load(), Err(StorageError::Io(_))));
    }
}

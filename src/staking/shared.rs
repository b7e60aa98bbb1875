//! Handle for using one ledger from several tasks.
//!
//! Writers are serialized by the lock, so every operation observes the
//! complete effects of the operations before it. Readers never see a
//! half-applied operation.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::staking::custody::ValueCustody;
use crate::staking::StakingLedger;

pub struct SharedLedger<C: ValueCustody> {
    inner: Arc<RwLock<StakingLedger<C>>>,
}

impl<C: ValueCustody> Clone for SharedLedger<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ValueCustody> SharedLedger<C> {
    pub fn new(ledger: StakingLedger<C>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ledger)),
        }
    }

    /// Runs a query under the shared lock.
    pub async fn read<R>(&self, f: impl FnOnce(&StakingLedger<C>) -> R) -> R {
        let guard = self.inner.read().await;
        f(&guard)
    }

    /// Runs an operation under the exclusive lock.
    pub async fn write<R>(&self, f: impl FnOnce(&mut StakingLedger<C>) -> R) -> R {
        let mut guard = self.inner.write().await;
        f(&mut guard)
    }

    /// Returns the ledger if this is the last handle.
    pub fn try_unwrap(self) -> Result<StakingLedger<C>, Self> {
        Arc::try_unwrap(self.inner)
            .map(RwLock::into_inner)
            .map_err(|inner| Self { inner })
    }
}

//! Keychain facade
//!
//! Upsert / read / delete over the primitive operations. Every call checks
//! existence first and branches from there, holding the identifier's lock
//! for the whole sequence.

use crate::error::{KeychainError, Operation, Result};
use crate::lock::KeyLocks;
use crate::ops::ItemOps;
use crate::store::SecureStore;

/// Service namespace used when none is configured
pub const DEFAULT_SERVICE: &str = "NGFKeychain";

/// Secret storage scoped to one service namespace
pub struct Keychain<S> {
    store: S,
    service: String,
    locks: KeyLocks,
}

impl<S: SecureStore> Keychain<S> {
    pub fn new(store: S, service: impl Into<String>) -> Self {
        Self {
            store,
            service: service.into(),
            locks: KeyLocks::new(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The primitive operations, without existence checks or locking
    pub fn ops(&self) -> ItemOps<'_, S> {
        ItemOps::new(&self.store, &self.service)
    }

    /// Store `value` under `item`, replacing any previous value
    pub fn set(&self, value: &[u8], item: &str) -> Result<()> {
        self.locks.with_lock(item, || {
            let ops = self.ops();
            if let Some(result) = ops.upsert(value, item) {
                return result;
            }

            if ops.exists(item)? {
                ops.update(value, item)
            } else {
                ops.add(value, item)
            }
        })
    }

    /// Read the value stored under `item`
    ///
    /// An absent item is an error, the same kind as a failed read.
    pub fn get(&self, item: &str) -> Result<Vec<u8>> {
        self.locks.with_lock(item, || {
            let ops = self.ops();
            if !ops.exists(item)? {
                return Err(KeychainError::OperationFailed(Operation::Retrieve));
            }

            ops.retrieve(item)?
                .ok_or(KeychainError::OperationFailed(Operation::Retrieve))
        })
    }

    /// Remove `item`; an absent item is an error
    pub fn delete(&self, item: &str) -> Result<()> {
        self.locks.with_lock(item, || {
            let ops = self.ops();
            if !ops.exists(item)? {
                return Err(KeychainError::OperationFailed(Operation::Delete));
            }

            ops.delete(item)
        })
    }

    /// Whether `item` is stored
    pub fn contains(&self, item: &str) -> Result<bool> {
        self.ops().exists(item)
    }
}

//! Primitive item operations
//!
//! One store call per operation, scoped to a service namespace. Each
//! translates the tagged store status into the keychain's error kinds.
//! Preconditions (an item must be absent for `add`, present for `update`)
//! are left to the caller.

use crate::error::{KeychainError, Operation, Result};
use crate::store::{Accessibility, ItemQuery, QueryMode, SecureStore, StoreFault, StoreStatus};
use tracing::{debug, warn};

/// Accessibility requested for every new item
pub const DEFAULT_ACCESSIBILITY: Accessibility = Accessibility::AfterFirstUnlock;

/// Primitive operations bound to one store and service
pub struct ItemOps<'a, S: ?Sized> {
    store: &'a S,
    service: &'a str,
}

impl<'a, S: SecureStore + ?Sized> ItemOps<'a, S> {
    pub fn new(store: &'a S, service: &'a str) -> Self {
        Self { store, service }
    }

    fn query<'i>(&self, item: &'i str) -> ItemQuery<'i>
    where
        'a: 'i,
    {
        ItemQuery::new(self.service, item)
    }

    fn fault(&self, op: &str, item: &str, fault: &StoreFault) {
        warn!(
            store = self.store.name(),
            service = self.service,
            item,
            %fault,
            "{} failed",
            op
        );
    }

    /// Check for an item without reading its value
    pub fn exists(&self, item: &str) -> Result<bool> {
        debug!(store = self.store.name(), service = self.service, item, "exists");
        match self.store.query(self.query(item), QueryMode::ExistenceOnly) {
            StoreStatus::Success(_) => Ok(true),
            StoreStatus::NotFound => Ok(false),
            StoreStatus::Failed(fault) => {
                self.fault("exists", item, &fault);
                Err(KeychainError::StoreUnavailable)
            }
        }
    }

    /// Insert a new item, readable after first unlock
    pub fn add(&self, value: &[u8], item: &str) -> Result<()> {
        debug!(store = self.store.name(), service = self.service, item, "add");
        let status = self
            .store
            .add(self.query(item), value, DEFAULT_ACCESSIBILITY);
        self.expect_success(Operation::Add, item, status)
    }

    /// Replace the value of an existing item
    pub fn update(&self, value: &[u8], item: &str) -> Result<()> {
        debug!(store = self.store.name(), service = self.service, item, "update");
        let status = self.store.update(self.query(item), value);
        self.expect_success(Operation::Update, item, status)
    }

    /// Read an item's value; `None` if it does not exist
    pub fn retrieve(&self, item: &str) -> Result<Option<Vec<u8>>> {
        debug!(store = self.store.name(), service = self.service, item, "retrieve");
        match self.store.query(self.query(item), QueryMode::WithData) {
            StoreStatus::Success(value) => Ok(value),
            StoreStatus::NotFound => Ok(None),
            StoreStatus::Failed(fault) => {
                self.fault("retrieve", item, &fault);
                Err(KeychainError::OperationFailed(Operation::Retrieve))
            }
        }
    }

    /// Remove an item
    pub fn delete(&self, item: &str) -> Result<()> {
        debug!(store = self.store.name(), service = self.service, item, "delete");
        let status = self.store.delete(self.query(item));
        self.expect_success(Operation::Delete, item, status)
    }

    /// Atomic insert-or-replace, if the store offers one
    pub fn upsert(&self, value: &[u8], item: &str) -> Option<Result<()>> {
        let status = self
            .store
            .upsert(self.query(item), value, DEFAULT_ACCESSIBILITY)?;
        debug!(store = self.store.name(), service = self.service, item, "upsert");
        Some(self.expect_success(Operation::Update, item, status))
    }

    fn expect_success(&self, op: Operation, item: &str, status: StoreStatus<()>) -> Result<()> {
        match status {
            StoreStatus::Success(()) => Ok(()),
            StoreStatus::NotFound => {
                debug!(service = self.service, item, "{} found no item", op);
                Err(KeychainError::OperationFailed(op))
            }
            StoreStatus::Failed(fault) => {
                self.fault(op.as_str(), item, &fault);
                Err(KeychainError::OperationFailed(op))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{Call, MemoryStore};

    const SERVICE: &str = "test-service";

    fn platform_fault() -> StoreFault {
        StoreFault::Platform("boom".to_string())
    }

    #[test]
    fn test_exists() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);

        assert!(!ops.exists("token").unwrap());
        ops.add(b"v", "token").unwrap();
        assert!(ops.exists("token").unwrap());

        // Existence checks never ask for the value
        assert_eq!(store.calls()[0], Call::Query(QueryMode::ExistenceOnly));
    }

    #[test]
    fn test_exists_failure_is_store_unavailable() {
        let store = MemoryStore::new();
        store.fail_on(Call::Query(QueryMode::ExistenceOnly), platform_fault());
        let ops = ItemOps::new(&store, SERVICE);

        assert_eq!(ops.exists("token"), Err(KeychainError::StoreUnavailable));
    }

    #[test]
    fn test_add_uses_after_first_unlock() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);

        ops.add(b"v", "token").unwrap();
        assert_eq!(
            store.accessibility(SERVICE, "token"),
            Some(Accessibility::AfterFirstUnlock)
        );
    }

    #[test]
    fn test_add_existing_fails() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);

        ops.add(b"v", "token").unwrap();
        assert_eq!(
            ops.add(b"w", "token"),
            Err(KeychainError::OperationFailed(Operation::Add))
        );
    }

    #[test]
    fn test_update_missing_fails() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);

        assert_eq!(
            ops.update(b"v", "token"),
            Err(KeychainError::OperationFailed(Operation::Update))
        );
    }

    #[test]
    fn test_retrieve() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);

        assert_eq!(ops.retrieve("token"), Ok(None));
        ops.add(&[0x01, 0x02], "token").unwrap();
        assert_eq!(ops.retrieve("token"), Ok(Some(vec![0x01, 0x02])));

        store.fail_on(Call::Query(QueryMode::WithData), platform_fault());
        assert_eq!(
            ops.retrieve("token"),
            Err(KeychainError::OperationFailed(Operation::Retrieve))
        );
    }

    #[test]
    fn test_delete() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);

        assert_eq!(
            ops.delete("token"),
            Err(KeychainError::OperationFailed(Operation::Delete))
        );

        ops.add(b"v", "token").unwrap();
        ops.delete("token").unwrap();
        assert!(!ops.exists("token").unwrap());
    }

    #[test]
    fn test_each_operation_is_one_call() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);

        ops.add(b"v", "token").unwrap();
        ops.update(b"w", "token").unwrap();
        ops.retrieve("token").unwrap();
        ops.delete("token").unwrap();

        assert_eq!(
            store.calls(),
            vec![
                Call::Add,
                Call::Update,
                Call::Query(QueryMode::WithData),
                Call::Delete
            ]
        );
    }

    #[test]
    fn test_memory_store_has_no_upsert() {
        let store = MemoryStore::new();
        let ops = ItemOps::new(&store, SERVICE);
        assert!(ops.upsert(b"v", "token").is_none());
        assert!(store.is_empty());
    }
}

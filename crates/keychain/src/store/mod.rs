//! Secure store seam
//!
//! `SecureStore` models the external secret-storage service as five calls
//! (add, update, query with data, existence-only query, delete), each keyed
//! by a service namespace and an account. Every call answers with a tagged
//! `StoreStatus` instead of a raw status code.

pub mod file;
pub mod memory;
pub mod os;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use os::KeyringStore;

use std::sync::Arc;
use thiserror::Error;

/// Record address for a single store call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemQuery<'a> {
    pub service: &'a str,
    pub account: &'a str,
}

impl<'a> ItemQuery<'a> {
    pub fn new(service: &'a str, account: &'a str) -> Self {
        Self { service, account }
    }
}

/// Whether a query should hand back the stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryMode {
    /// Only report found / not found; no secret material is read
    ExistenceOnly,
    /// Return the stored value
    WithData,
}

/// When a stored value may be read relative to device lock state
///
/// Every item is created with the one class the facade requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Accessibility {
    /// Readable once the device has been unlocked after boot, including
    /// later while locked and from background contexts
    #[default]
    AfterFirstUnlock,
}

impl Accessibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Accessibility::AfterFirstUnlock => "after-first-unlock",
        }
    }
}

/// Anything a store reports other than success or not-found
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    #[error("item already exists")]
    DuplicateItem,

    #[error("invalid item: {0}")]
    InvalidItem(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("platform error: {0}")]
    Platform(String),
}

impl From<std::io::Error> for StoreFault {
    fn from(err: std::io::Error) -> Self {
        StoreFault::Io(err.to_string())
    }
}

/// Outcome of one store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus<T> {
    Success(T),
    NotFound,
    Failed(StoreFault),
}

impl<T> StoreStatus<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> StoreStatus<U> {
        match self {
            StoreStatus::Success(value) => StoreStatus::Success(f(value)),
            StoreStatus::NotFound => StoreStatus::NotFound,
            StoreStatus::Failed(fault) => StoreStatus::Failed(fault),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StoreStatus::Success(_))
    }
}

impl<T> From<Result<T, StoreFault>> for StoreStatus<T> {
    fn from(result: Result<T, StoreFault>) -> Self {
        match result {
            Ok(value) => StoreStatus::Success(value),
            Err(fault) => StoreStatus::Failed(fault),
        }
    }
}

/// The external secure-storage service
pub trait SecureStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Insert a new record. Fails if one already exists for `item`.
    fn add(&self, item: ItemQuery<'_>, value: &[u8], access: Accessibility) -> StoreStatus<()>;

    /// Replace the value of an existing record
    fn update(&self, item: ItemQuery<'_>, value: &[u8]) -> StoreStatus<()>;

    /// Look up a record. `Success(None)` for `ExistenceOnly`, `Success(Some(_))`
    /// for `WithData`.
    fn query(&self, item: ItemQuery<'_>, mode: QueryMode) -> StoreStatus<Option<Vec<u8>>>;

    /// Remove a record
    fn delete(&self, item: ItemQuery<'_>) -> StoreStatus<()>;

    /// Atomic insert-or-replace, if the store has one
    fn upsert(
        &self,
        _item: ItemQuery<'_>,
        _value: &[u8],
        _access: Accessibility,
    ) -> Option<StoreStatus<()>> {
        None
    }
}

impl<S: SecureStore + ?Sized> SecureStore for Arc<S> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn add(&self, item: ItemQuery<'_>, value: &[u8], access: Accessibility) -> StoreStatus<()> {
        (**self).add(item, value, access)
    }

    fn update(&self, item: ItemQuery<'_>, value: &[u8]) -> StoreStatus<()> {
        (**self).update(item, value)
    }

    fn query(&self, item: ItemQuery<'_>, mode: QueryMode) -> StoreStatus<Option<Vec<u8>>> {
        (**self).query(item, mode)
    }

    fn delete(&self, item: ItemQuery<'_>) -> StoreStatus<()> {
        (**self).delete(item)
    }

    fn upsert(
        &self,
        item: ItemQuery<'_>,
        value: &[u8],
        access: Accessibility,
    ) -> Option<StoreStatus<()>> {
        (**self).upsert(item, value, access)
    }
}

/// One of the shipped backends, chosen at runtime from configuration
pub enum Backend {
    File(FileStore),
    Keyring(KeyringStore),
    Memory(MemoryStore),
}

impl Backend {
    fn inner(&self) -> &dyn SecureStore {
        match self {
            Backend::File(store) => store,
            Backend::Keyring(store) => store,
            Backend::Memory(store) => store,
        }
    }

    /// Accounts stored under `service`, or `None` if the backend cannot enumerate
    pub fn accounts(&self, service: &str) -> anyhow::Result<Option<Vec<String>>> {
        match self {
            Backend::File(store) => store.accounts(service).map(Some),
            Backend::Memory(store) => Ok(Some(store.accounts(service))),
            Backend::Keyring(_) => Ok(None),
        }
    }
}

impl SecureStore for Backend {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn add(&self, item: ItemQuery<'_>, value: &[u8], access: Accessibility) -> StoreStatus<()> {
        self.inner().add(item, value, access)
    }

    fn update(&self, item: ItemQuery<'_>, value: &[u8]) -> StoreStatus<()> {
        self.inner().update(item, value)
    }

    fn query(&self, item: ItemQuery<'_>, mode: QueryMode) -> StoreStatus<Option<Vec<u8>>> {
        self.inner().query(item, mode)
    }

    fn delete(&self, item: ItemQuery<'_>) -> StoreStatus<()> {
        self.inner().delete(item)
    }

    fn upsert(
        &self,
        item: ItemQuery<'_>,
        value: &[u8],
        access: Accessibility,
    ) -> Option<StoreStatus<()>> {
        self.inner().upsert(item, value, access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_map() {
        let status: StoreStatus<u8> = StoreStatus::Success(2);
        assert_eq!(status.map(|v| v * 2), StoreStatus::Success(4));

        let status: StoreStatus<u8> = StoreStatus::NotFound;
        assert_eq!(status.map(|v| v * 2), StoreStatus::NotFound);
    }

    #[test]
    fn test_status_from_result() {
        let ok: StoreStatus<()> = Ok(()).into();
        assert!(ok.is_success());

        let failed: StoreStatus<()> = Err(StoreFault::DuplicateItem).into();
        assert_eq!(failed, StoreStatus::Failed(StoreFault::DuplicateItem));
    }

    #[test]
    fn test_default_accessibility() {
        assert_eq!(Accessibility::default(), Accessibility::AfterFirstUnlock);
        assert_eq!(Accessibility::default().as_str(), "after-first-unlock");
    }

    #[test]
    fn test_backend_delegates() {
        let backend = Backend::Memory(MemoryStore::new());
        let item = ItemQuery::new("svc", "token");

        assert_eq!(backend.name(), "memory");
        assert!(backend.add(item, b"v", Accessibility::default()).is_success());
        assert_eq!(
            backend.query(item, QueryMode::WithData),
            StoreStatus::Success(Some(b"v".to_vec()))
        );
        assert_eq!(
            backend.accounts("svc").unwrap(),
            Some(vec!["token".to_string()])
        );

        let keyring = Backend::Keyring(KeyringStore::new());
        assert_eq!(keyring.accounts("svc").unwrap(), None);
    }
}

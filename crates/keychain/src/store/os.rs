//! Operating system credential store
//!
//! Backed by the `keyring` crate: macOS Keychain, Windows Credential
//! Manager, or the Secret Service on Linux. The credential API is string
//! typed, so values are stored base64 encoded.
//!
//! The API only offers set-with-overwrite. `add` and `update` look the
//! entry up first so that add never replaces and update never creates;
//! `upsert` is the plain set.

use super::{Accessibility, ItemQuery, QueryMode, SecureStore, StoreFault, StoreStatus};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use keyring::{Entry, Error as KeyringError};
use tracing::trace;

/// Platform keychain store
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }
}

fn map_keyring_error(err: KeyringError) -> StoreFault {
    match err {
        KeyringError::Invalid(attr, reason) => {
            StoreFault::InvalidItem(format!("{}: {}", attr, reason))
        }
        KeyringError::TooLong(attr, limit) => {
            StoreFault::InvalidItem(format!("{} longer than {} characters", attr, limit))
        }
        other => StoreFault::Platform(other.to_string()),
    }
}

/// Collapse a credential call into the tagged status, `NoEntry` being not-found
fn status_from<T>(result: keyring::Result<T>) -> StoreStatus<T> {
    match result {
        Ok(value) => StoreStatus::Success(value),
        Err(KeyringError::NoEntry) => StoreStatus::NotFound,
        Err(err) => StoreStatus::Failed(map_keyring_error(err)),
    }
}

fn encode(value: &[u8]) -> String {
    STANDARD.encode(value)
}

fn decode(stored: &str) -> Result<Vec<u8>, StoreFault> {
    STANDARD
        .decode(stored)
        .map_err(|e| StoreFault::Crypto(format!("stored value is not base64: {}", e)))
}

fn entry(item: ItemQuery<'_>) -> Result<Entry, StoreFault> {
    Entry::new(item.service, item.account).map_err(map_keyring_error)
}

/// Gate an add on the result of looking the entry up: only a missing entry
/// may be written
fn vacant(lookup: keyring::Result<String>) -> StoreStatus<()> {
    match status_from(lookup) {
        StoreStatus::Success(_) => StoreStatus::Failed(StoreFault::DuplicateItem),
        StoreStatus::NotFound => StoreStatus::Success(()),
        StoreStatus::Failed(fault) => StoreStatus::Failed(fault),
    }
}

/// Gate an update on the lookup: only an existing entry may be written
fn occupied(lookup: keyring::Result<String>) -> StoreStatus<()> {
    status_from(lookup).map(|_| ())
}

impl KeyringStore {
    fn set(&self, item: ItemQuery<'_>, value: &[u8]) -> StoreStatus<()> {
        match entry(item) {
            Ok(entry) => status_from(entry.set_password(&encode(value))),
            Err(fault) => StoreStatus::Failed(fault),
        }
    }

    /// Set the entry only when `gate` passes on its current lookup
    fn set_if(
        &self,
        item: ItemQuery<'_>,
        value: &[u8],
        gate: fn(keyring::Result<String>) -> StoreStatus<()>,
    ) -> StoreStatus<()> {
        let entry = match entry(item) {
            Ok(entry) => entry,
            Err(fault) => return StoreStatus::Failed(fault),
        };

        match gate(entry.get_password()) {
            StoreStatus::Success(()) => status_from(entry.set_password(&encode(value))),
            other => other,
        }
    }
}

impl SecureStore for KeyringStore {
    fn name(&self) -> &'static str {
        "keyring"
    }

    fn add(&self, item: ItemQuery<'_>, value: &[u8], access: Accessibility) -> StoreStatus<()> {
        trace!(access = access.as_str(), "accessibility left to platform defaults");
        self.set_if(item, value, vacant)
    }

    fn update(&self, item: ItemQuery<'_>, value: &[u8]) -> StoreStatus<()> {
        self.set_if(item, value, occupied)
    }

    fn query(&self, item: ItemQuery<'_>, mode: QueryMode) -> StoreStatus<Option<Vec<u8>>> {
        let entry = match entry(item) {
            Ok(entry) => entry,
            Err(fault) => return StoreStatus::Failed(fault),
        };

        match status_from(entry.get_password()) {
            StoreStatus::Success(stored) => match mode {
                QueryMode::ExistenceOnly => StoreStatus::Success(None),
                QueryMode::WithData => decode(&stored).map(Some).into(),
            },
            StoreStatus::NotFound => StoreStatus::NotFound,
            StoreStatus::Failed(fault) => StoreStatus::Failed(fault),
        }
    }

    fn delete(&self, item: ItemQuery<'_>) -> StoreStatus<()> {
        match entry(item) {
            Ok(entry) => status_from(entry.delete_password()),
            Err(fault) => StoreStatus::Failed(fault),
        }
    }

    fn upsert(
        &self,
        item: ItemQuery<'_>,
        value: &[u8],
        _access: Accessibility,
    ) -> Option<StoreStatus<()>> {
        Some(self.set(item, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_entry_is_not_found() {
        let status: StoreStatus<String> = status_from(Err(KeyringError::NoEntry));
        assert_eq!(status, StoreStatus::NotFound);
    }

    #[test]
    fn test_other_errors_fail() {
        let status: StoreStatus<()> = status_from(Err(KeyringError::Invalid(
            "service".to_string(),
            "empty".to_string(),
        )));
        assert_eq!(
            status,
            StoreStatus::Failed(StoreFault::InvalidItem("service: empty".to_string()))
        );

        let status: StoreStatus<()> = status_from(Err(KeyringError::NoStorageAccess(
            Box::new(std::io::Error::new(std::io::ErrorKind::Other, "locked")),
        )));
        assert!(matches!(status, StoreStatus::Failed(StoreFault::Platform(_))));
    }

    #[test]
    fn test_add_refuses_existing_entry() {
        assert_eq!(
            vacant(Ok(encode(b"already here"))),
            StoreStatus::Failed(StoreFault::DuplicateItem)
        );
        assert_eq!(vacant(Err(KeyringError::NoEntry)), StoreStatus::Success(()));

        let locked = KeyringError::NoStorageAccess(Box::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "locked",
        )));
        assert!(matches!(
            vacant(Err(locked)),
            StoreStatus::Failed(StoreFault::Platform(_))
        ));
    }

    #[test]
    fn test_update_refuses_missing_entry() {
        assert_eq!(occupied(Ok(encode(b"old"))), StoreStatus::Success(()));
        assert_eq!(occupied(Err(KeyringError::NoEntry)), StoreStatus::NotFound);
    }

    #[test]
    fn test_binary_values_survive_encoding() {
        let value = [0x00, 0xff, 0x10, 0x80];
        assert_eq!(decode(&encode(&value)).unwrap(), value);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("not base64!"), Err(StoreFault::Crypto(_))));
    }
}

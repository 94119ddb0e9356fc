//! Error kinds surfaced to keychain callers

use std::fmt;
use thiserror::Error;

/// The store call an `OperationFailed` error came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Update,
    Retrieve,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Update => "update",
            Operation::Retrieve => "retrieve",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Keychain errors
///
/// Both kinds are opaque on purpose: the underlying store fault is logged
/// where it happens and never handed to the caller.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeychainError {
    /// The existence check itself returned an unexpected status
    #[error("secure store could not be queried")]
    StoreUnavailable,

    /// A store call failed, or the item does not exist
    #[error("secure store {0} failed")]
    OperationFailed(Operation),
}

pub type Result<T, E = KeychainError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            KeychainError::StoreUnavailable.to_string(),
            "secure store could not be queried"
        );
        assert_eq!(
            KeychainError::OperationFailed(Operation::Retrieve).to_string(),
            "secure store retrieve failed"
        );
    }
}

//! keychain - secret storage under one service namespace
//!
//! Set, get and delete binary values by identifier. The store underneath
//! (OS credential store, encrypted files, or memory) only knows add,
//! update, query and delete; the facade layers upsert and "absent is an
//! error" semantics on top.
//!
//! ```no_run
//! use keychain::{Keychain, KeyringStore};
//!
//! let keychain = Keychain::new(KeyringStore::new(), "com.example.app");
//! keychain.set(b"sk-123", "api-token")?;
//! let token = keychain.get("api-token")?;
//! # Ok::<(), keychain::KeychainError>(())
//! ```

pub mod config;
pub mod error;
pub mod keychain;
pub mod lock;
pub mod ops;
pub mod store;

pub use config::{BackendKind, KeychainConfig};
pub use error::{KeychainError, Operation, Result};
pub use keychain::{Keychain, DEFAULT_SERVICE};
pub use ops::ItemOps;
pub use store::{
    Accessibility, Backend, FileStore, ItemQuery, KeyringStore, MemoryStore, QueryMode,
    SecureStore, StoreFault, StoreStatus,
};

//! File-backed store
//!
//! Each record is a separate age-encrypted file:
//!
//! ```text
//! <root>/keys/identity.key              X25519 identity (0600)
//! <root>/vault/<service>/<account>.age  one record per file (0600)
//! ```
//!
//! Accounts may be path-like (e.g. `api/openai`); nested directories are
//! created on write and pruned again on delete. A path part may not be
//! empty, `.`, `..`, or end in `.age`, so every account maps to exactly one
//! file and no account's directory can sit where another's record lives.
//!
//! Files are written in full to a temp file in the target directory and
//! only then linked into place, so a reader never sees a partial record
//! or identity key.

use super::{Accessibility, ItemQuery, QueryMode, SecureStore, StoreFault, StoreStatus};
use age::secrecy::ExposeSecret;
use anyhow::{Context, Result};
use std::fs::{self, Permissions};
use std::io::{ErrorKind, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

const RECORD_SUFFIX: &str = ".age";

/// Encrypted on-disk secure store
pub struct FileStore {
    /// Root directory for the store
    root: PathBuf,
    /// Directory for encrypted records
    vault_dir: PathBuf,
    /// Directory for identity keys
    keys_dir: PathBuf,
    /// Path to the identity key file
    identity_path: PathBuf,
}

impl FileStore {
    pub fn new(root: &Path) -> Self {
        let vault_dir = root.join("vault");
        let keys_dir = root.join("keys");
        let identity_path = keys_dir.join("identity.key");

        Self {
            root: root.to_path_buf(),
            vault_dir,
            keys_dir,
            identity_path,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_initialized(&self) -> bool {
        self.identity_path.exists()
    }

    /// Create directories and the identity key if missing; returns the public key
    pub fn init(&self) -> Result<String> {
        let identity = self
            .ensure_identity()
            .map_err(|fault| anyhow::anyhow!(fault))
            .with_context(|| format!("Failed to initialize store at {:?}", self.root))?;
        Ok(identity.to_public().to_string())
    }

    fn ensure_identity(&self) -> Result<age::x25519::Identity, StoreFault> {
        if self.is_initialized() {
            return self.load_identity();
        }

        for dir in [&self.root, &self.vault_dir, &self.keys_dir] {
            fs::create_dir_all(dir)?;
            fs::set_permissions(dir, Permissions::from_mode(0o700))?;
        }

        debug!(root = ?self.root, "generating store identity");
        let identity = age::x25519::Identity::generate();
        let identity_str = identity.to_string();

        // A concurrent initializer may win the link; use its key then
        let staged = stage(&self.identity_path, identity_str.expose_secret().as_bytes())?;
        match staged.persist_noclobber(&self.identity_path) {
            Ok(_) => Ok(identity),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => self.load_identity(),
            Err(e) => Err(e.error.into()),
        }
    }

    fn load_identity(&self) -> Result<age::x25519::Identity, StoreFault> {
        let content = fs::read_to_string(&self.identity_path)?;

        content
            .trim()
            .parse::<age::x25519::Identity>()
            .map_err(|e| StoreFault::Crypto(format!("Failed to parse identity: {}", e)))
    }

    /// Path of the record file, rejecting names that could leave the vault
    fn record_path(&self, item: ItemQuery<'_>) -> Result<PathBuf, StoreFault> {
        validate_name(item.service, false)?;
        validate_name(item.account, true)?;

        Ok(self
            .vault_dir
            .join(item.service)
            .join(format!("{}{}", item.account, RECORD_SUFFIX)))
    }

    fn encrypt(&self, identity: &age::x25519::Identity, value: &[u8]) -> Result<Vec<u8>, StoreFault> {
        let recipient = identity.to_public();
        let encryptor = age::Encryptor::with_recipients(vec![Box::new(recipient)])
            .ok_or_else(|| StoreFault::Crypto("no recipients".to_string()))?;

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| StoreFault::Crypto(e.to_string()))?;
        writer
            .write_all(value)
            .map_err(|e| StoreFault::Crypto(e.to_string()))?;
        writer
            .finish()
            .map_err(|e| StoreFault::Crypto(e.to_string()))?;

        Ok(encrypted)
    }

    fn decrypt(&self, encrypted: &[u8]) -> Result<Vec<u8>, StoreFault> {
        let identity = self.load_identity()?;

        let decryptor = match age::Decryptor::new(encrypted)
            .map_err(|e| StoreFault::Crypto(e.to_string()))?
        {
            age::Decryptor::Recipients(d) => d,
            _ => {
                return Err(StoreFault::Crypto(
                    "Unexpected passphrase encryption".to_string(),
                ))
            }
        };

        let mut decrypted = vec![];
        let mut reader = decryptor
            .decrypt(std::iter::once(&identity as &dyn age::Identity))
            .map_err(|e| StoreFault::Crypto(e.to_string()))?;
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| StoreFault::Crypto(e.to_string()))?;

        Ok(decrypted)
    }

    fn create_parent(path: &Path) -> Result<(), StoreFault> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Write a record that must not exist yet
    fn write_new(&self, path: &Path, value: &[u8]) -> Result<(), StoreFault> {
        let identity = self.ensure_identity()?;
        let encrypted = self.encrypt(&identity, value)?;
        Self::create_parent(path)?;

        match stage(path, &encrypted)?.persist_noclobber(path) {
            Ok(_) => Ok(()),
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Err(StoreFault::DuplicateItem),
            Err(e) => Err(e.error.into()),
        }
    }

    /// Replace a record via a temp file and rename
    fn write_replace(&self, path: &Path, value: &[u8]) -> Result<(), StoreFault> {
        let identity = self.ensure_identity()?;
        let encrypted = self.encrypt(&identity, value)?;
        Self::create_parent(path)?;

        stage(path, &encrypted)?
            .persist(path)
            .map_err(|e| StoreFault::from(e.error))?;
        Ok(())
    }

    /// Remove empty directories between `path` and the vault root
    fn prune_empty_parents(&self, path: &Path) -> Result<(), StoreFault> {
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir == self.vault_dir {
                break;
            }
            if dir.read_dir()?.next().is_none() {
                fs::remove_dir(dir)?;
                parent = dir.parent();
            } else {
                break;
            }
        }
        Ok(())
    }

    /// Sorted accounts stored under `service`
    pub fn accounts(&self, service: &str) -> Result<Vec<String>> {
        validate_name(service, false).map_err(|fault| anyhow::anyhow!(fault))?;

        let service_dir = self.vault_dir.join(service);
        let mut accounts = vec![];
        list_recursive(&service_dir, "", &mut accounts)
            .with_context(|| format!("Failed to list {:?}", service_dir))?;
        accounts.sort();
        Ok(accounts)
    }
}

/// Write `bytes` to a 0600 temp file beside `path`, synced to disk
///
/// The temp file is removed when dropped, so a failed write or a lost
/// publish race leaves nothing behind.
fn stage(path: &Path, bytes: &[u8]) -> Result<NamedTempFile, StoreFault> {
    let dir = path
        .parent()
        .ok_or_else(|| StoreFault::InvalidItem(format!("no parent directory: {:?}", path)))?;

    let mut staged = NamedTempFile::new_in(dir)?;
    staged
        .as_file()
        .set_permissions(Permissions::from_mode(0o600))?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    Ok(staged)
}

/// Whether a record file is present; any error other than not-found is a fault
fn record_state(path: &Path) -> StoreStatus<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_file() => StoreStatus::Success(()),
        Ok(_) => StoreStatus::Failed(StoreFault::InvalidItem(format!(
            "not a regular file: {:?}",
            path
        ))),
        Err(e) if e.kind() == ErrorKind::NotFound => StoreStatus::NotFound,
        Err(e) => StoreStatus::Failed(e.into()),
    }
}

fn list_recursive(dir: &Path, current_prefix: &str, accounts: &mut Vec<String>) -> std::io::Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        let qualified = |name: &str| {
            if current_prefix.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", current_prefix, name)
            }
        };

        if path.is_dir() {
            list_recursive(&path, &qualified(&name), accounts)?;
        } else if let Some(account) = name.strip_suffix(RECORD_SUFFIX) {
            accounts.push(qualified(account));
        }
    }

    Ok(())
}

/// Reject names that are empty, escape the vault, alias another name, or use
/// unexpected characters
fn validate_name(name: &str, allow_nesting: bool) -> Result<(), StoreFault> {
    if name.is_empty() {
        return Err(StoreFault::InvalidItem("name cannot be empty".to_string()));
    }

    for part in name.split('/') {
        if part.is_empty() || part == "." || part == ".." {
            return Err(StoreFault::InvalidItem(format!("invalid name format: {}", name)));
        }
        if part.ends_with(RECORD_SUFFIX) {
            return Err(StoreFault::InvalidItem(format!(
                "name parts cannot end in {}: {}",
                RECORD_SUFFIX, name
            )));
        }
    }

    for c in name.chars() {
        let nesting = allow_nesting && c == '/';
        if !c.is_ascii_alphanumeric() && !nesting && !matches!(c, '_' | '-' | '.' | '@') {
            return Err(StoreFault::InvalidItem(format!(
                "invalid character '{}' in {}",
                c, name
            )));
        }
    }

    Ok(())
}

impl SecureStore for FileStore {
    fn name(&self) -> &'static str {
        "file"
    }

    fn add(&self, item: ItemQuery<'_>, value: &[u8], access: Accessibility) -> StoreStatus<()> {
        trace!(access = access.as_str(), "file store does not enforce accessibility");
        self.record_path(item)
            .and_then(|path| self.write_new(&path, value))
            .into()
    }

    fn update(&self, item: ItemQuery<'_>, value: &[u8]) -> StoreStatus<()> {
        let path = match self.record_path(item) {
            Ok(path) => path,
            Err(fault) => return StoreStatus::Failed(fault),
        };
        match record_state(&path) {
            StoreStatus::Success(()) => self.write_replace(&path, value).into(),
            other => other,
        }
    }

    fn query(&self, item: ItemQuery<'_>, mode: QueryMode) -> StoreStatus<Option<Vec<u8>>> {
        let path = match self.record_path(item) {
            Ok(path) => path,
            Err(fault) => return StoreStatus::Failed(fault),
        };

        match mode {
            QueryMode::ExistenceOnly => record_state(&path).map(|()| None),
            QueryMode::WithData => match fs::read(&path) {
                Ok(encrypted) => self.decrypt(&encrypted).map(Some).into(),
                Err(e) if e.kind() == ErrorKind::NotFound => StoreStatus::NotFound,
                Err(e) => StoreStatus::Failed(e.into()),
            },
        }
    }

    fn delete(&self, item: ItemQuery<'_>) -> StoreStatus<()> {
        let path = match self.record_path(item) {
            Ok(path) => path,
            Err(fault) => return StoreStatus::Failed(fault),
        };

        match fs::remove_file(&path) {
            Ok(()) => self.prune_empty_parents(&path).into(),
            Err(e) if e.kind() == ErrorKind::NotFound => StoreStatus::NotFound,
            Err(e) => StoreStatus::Failed(e.into()),
        }
    }

    fn upsert(
        &self,
        item: ItemQuery<'_>,
        value: &[u8],
        _access: Accessibility,
    ) -> Option<StoreStatus<()>> {
        let status = self
            .record_path(item)
            .and_then(|path| self.write_replace(&path, value))
            .into();
        Some(status)
    }
}

//! Keychain configuration
//!
//! Configuration file: ~/.config/keywrap/keychain.yaml
//!
//! ```yaml
//! service: NGFKeychain
//! backend: keyring      # keyring | file (memory is for embedding and tests)
//! vault_dir: /path/to/store   # file backend only
//! ```

use crate::keychain::DEFAULT_SERVICE;
use crate::store::{Backend, FileStore, KeyringStore, MemoryStore};
use anyhow::{Context, Result};
use keywrap_core::Paths;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const TOOL: &str = "keychain";

/// Which secure store to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Operating system credential store
    #[default]
    Keyring,
    /// age-encrypted files under the data directory
    File,
    /// Process-local, gone on exit; the CLI refuses it
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Keyring => "keyring",
            BackendKind::File => "file",
            BackendKind::Memory => "memory",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyring" => Ok(BackendKind::Keyring),
            "file" => Ok(BackendKind::File),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!(
                "unknown backend '{}' (expected keyring, file or memory)",
                other
            )),
        }
    }
}

/// Keychain settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeychainConfig {
    /// Service namespace for every item
    #[serde(default = "default_service")]
    pub service: String,

    #[serde(default)]
    pub backend: BackendKind,

    /// Root of the file backend; defaults to the keychain data directory
    #[serde(default)]
    pub vault_dir: Option<PathBuf>,
}

fn default_service() -> String {
    DEFAULT_SERVICE.to_string()
}

impl Default for KeychainConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
            backend: BackendKind::default(),
            vault_dir: None,
        }
    }
}

impl KeychainConfig {
    /// Default config file location
    pub fn default_path(paths: &Paths) -> PathBuf {
        paths.config_file(TOOL)
    }

    /// Load configuration from default location
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path(&Paths::new()))
    }

    /// Load configuration from a specific path; a missing file means defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read keychain config from {:?}", path))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse keychain config from {:?}", path))?;

        if config.service.is_empty() {
            anyhow::bail!("Keychain config {:?} has an empty service", path);
        }
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write keychain config to {:?}", path))?;
        Ok(())
    }

    /// Root directory of the file backend
    pub fn vault_root(&self, paths: &Paths) -> PathBuf {
        self.vault_dir
            .clone()
            .unwrap_or_else(|| paths.state(TOOL))
    }

    /// Build the configured store
    pub fn open_backend(&self, paths: &Paths) -> Backend {
        match self.backend {
            BackendKind::Keyring => Backend::Keyring(KeyringStore::new()),
            BackendKind::File => Backend::File(FileStore::new(&self.vault_root(paths))),
            BackendKind::Memory => Backend::Memory(MemoryStore::new()),
        }
    }
}

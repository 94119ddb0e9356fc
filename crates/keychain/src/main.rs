//! keychain - store small secrets under one service namespace
//!
//! Commands:
//! - init: Write the config file and, for the file backend, the vault key
//! - set <ID> [VALUE]: Store a value (prompts if no value, `-` reads stdin)
//! - get <ID>: Print a stored value
//! - delete <ID>: Delete a value
//! - exists <ID>: Exit 0 if stored, 1 if not
//! - list: List stored identifiers (file backend)

use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use clap::{Parser, Subcommand};
use keychain::{Backend, BackendKind, FileStore, Keychain, KeychainConfig, SecureStore};
use keywrap_core::Paths;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keychain")]
#[command(about = "Store small secrets in the OS keychain or an encrypted file vault")]
#[command(version)]
#[command(after_help = r#"BACKENDS:
    keyring   OS credential store (macOS Keychain, Windows Credential
              Manager, Secret Service)
    file      age-encrypted files in ~/.local/share/keywrap/keychain/

    The memory backend exists for embedding and tests only. It keeps
    nothing between runs, so the CLI refuses it.

CONFIG:
    ~/.config/keywrap/keychain.yaml sets service, backend and vault_dir.
    Flags override the file. Set RUST_LOG=keychain=debug to trace store calls;
    values are never logged."#)]
struct Cli {
    /// Service namespace (default: from config, else NGFKeychain)
    #[arg(long, global = true)]
    service: Option<String>,

    /// Storage backend: keyring or file
    #[arg(long, global = true)]
    backend: Option<BackendKind>,

    /// Config file to load instead of the default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the config file and set up the selected backend
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Store a value, replacing any existing one
    Set {
        /// Item identifier
        id: String,
        /// Value to store; `-` reads raw bytes from stdin, omit for a hidden prompt
        value: Option<String>,
    },

    /// Print a stored value
    Get {
        /// Don't print trailing newline (useful for piping)
        #[arg(short = 'n')]
        no_newline: bool,
        /// Print the value base64 encoded
        #[arg(long)]
        base64: bool,
        /// Item identifier
        id: String,
    },

    /// Delete a stored value
    Delete {
        /// Item identifier
        id: String,
    },

    /// Exit 0 if the item is stored, 1 if not
    Exists {
        /// Item identifier
        id: String,
    },

    /// List stored identifiers
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so values piped from stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let paths = Paths::new();
    let config = resolve_config(&cli)?;
    tracing::debug!(service = %config.service, backend = %config.backend, "opening keychain");

    let open = || Keychain::new(config.open_backend(&paths), config.service.clone());

    match cli.command {
        Commands::Init { force } => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| KeychainConfig::default_path(&paths));
            cmd_init(&config, &paths, &config_path, force)
        }
        Commands::Set { id, value } => cmd_set(&open(), &id, value),
        Commands::Get {
            no_newline,
            base64,
            id,
        } => cmd_get(&open(), &id, no_newline, base64),
        Commands::Delete { id } => cmd_delete(&open(), &id),
        Commands::Exists { id } => cmd_exists(&open(), &id),
        Commands::List { json } => cmd_list(&open(), json),
    }
}

/// Config file values, overridden by flags
fn resolve_config(cli: &Cli) -> Result<KeychainConfig> {
    // init may be the command that creates the file
    let creating = matches!(cli.command, Commands::Init { .. });

    let mut config = match &cli.config {
        Some(path) => {
            if !path.exists() && !creating {
                bail!("Config file not found: {}", path.display());
            }
            KeychainConfig::load_from(path)?
        }
        None => KeychainConfig::load()?,
    };

    if let Some(service) = &cli.service {
        if service.is_empty() {
            bail!("--service must not be empty");
        }
        config.service = service.clone();
    }
    if let Some(backend) = cli.backend {
        config.backend = backend;
    }

    if config.backend == BackendKind::Memory {
        bail!("The memory backend does not persist between runs; use --backend keyring or file");
    }

    Ok(config)
}

/// Write the config file and prepare the backend
fn cmd_init(config: &KeychainConfig, paths: &Paths, config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        println!(
            "Config already exists: {} (use --force to overwrite)",
            config_path.display()
        );
    } else {
        config.save_to(config_path)?;
        println!("success: Wrote {}", config_path.display());
    }

    if config.backend == BackendKind::File {
        let store = FileStore::new(&config.vault_root(paths));
        let pubkey = store.init()?;
        println!("File vault: {}", store.root().display());
        println!("Public key: {}", pubkey);
    }

    Ok(())
}

/// Store a value
fn cmd_set(keychain: &Keychain<Backend>, id: &str, value: Option<String>) -> Result<()> {
    let bytes = match value.as_deref() {
        Some("-") => {
            let mut buf = vec![];
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read value from stdin")?;
            buf
        }
        Some(v) => v.as_bytes().to_vec(),
        None => {
            // Prompt for hidden input
            let password = rpassword::prompt_password("Enter secret value: ")
                .context("Failed to read secret value")?;
            password.into_bytes()
        }
    };

    keychain
        .set(&bytes, id)
        .with_context(|| format!("Failed to store {}", id))?;

    println!("success: Stored {} in {}", id, keychain.service());

    Ok(())
}

/// Print a stored value
fn cmd_get(keychain: &Keychain<Backend>, id: &str, no_newline: bool, base64: bool) -> Result<()> {
    let value = keychain
        .get(id)
        .with_context(|| format!("Failed to read {}", id))?;

    let mut stdout = io::stdout().lock();
    if base64 {
        stdout.write_all(STANDARD.encode(&value).as_bytes())?;
    } else {
        stdout.write_all(&value)?;
    }
    if !no_newline {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;

    Ok(())
}

/// Delete a value
fn cmd_delete(keychain: &Keychain<Backend>, id: &str) -> Result<()> {
    keychain
        .delete(id)
        .with_context(|| format!("Failed to delete {}", id))?;
    println!("success: Deleted {}", id);
    Ok(())
}

/// Report existence through the exit status
fn cmd_exists(keychain: &Keychain<Backend>, id: &str) -> Result<()> {
    if keychain.contains(id)? {
        println!("{}", id);
        Ok(())
    } else {
        std::process::exit(1);
    }
}

/// List stored identifiers
fn cmd_list(keychain: &Keychain<Backend>, json: bool) -> Result<()> {
    let Some(ids) = keychain.store().accounts(keychain.service())? else {
        bail!(
            "The {} backend cannot enumerate items; use --backend file",
            keychain.store().name()
        );
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ids)?);
        return Ok(());
    }

    if ids.is_empty() {
        println!("No items stored in {}. Add one with: keychain set <id>", keychain.service());
        return Ok(());
    }

    println!("Items in {}", keychain.service());
    println!();

    for id in &ids {
        println!("  {}", id);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        let cli = Cli::try_parse_from(["keychain", "set", "token", "value"]).unwrap();
        if let Commands::Set { id, value } = cli.command {
            assert_eq!(id, "token");
            assert_eq!(value, Some("value".to_string()));
        } else {
            panic!("Expected Set command");
        }

        let cli = Cli::try_parse_from(["keychain", "get", "-n", "token"]).unwrap();
        if let Commands::Get {
            id,
            no_newline,
            base64,
        } = cli.command
        {
            assert_eq!(id, "token");
            assert!(no_newline);
            assert!(!base64);
        } else {
            panic!("Expected Get command");
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::try_parse_from([
            "keychain", "delete", "token", "--service", "com.example", "--backend", "file",
        ])
        .unwrap();
        assert_eq!(cli.service.as_deref(), Some("com.example"));
        assert_eq!(cli.backend, Some(BackendKind::File));
        assert!(matches!(cli.command, Commands::Delete { .. }));

        assert!(Cli::try_parse_from(["keychain", "--backend", "cloud", "list"]).is_err());
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("keychain.yaml");
        std::fs::write(&path, "service: from-file\nbackend: file\n").unwrap();

        let cli = Cli::try_parse_from([
            "keychain",
            "--config",
            path.to_str().unwrap(),
            "--backend",
            "keyring",
            "list",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        assert_eq!(config.service, "from-file");
        assert_eq!(config.backend, BackendKind::Keyring);
    }

    #[test]
    fn test_memory_backend_is_refused() {
        let cli = Cli::try_parse_from(["keychain", "--backend", "memory", "set", "token", "v"])
            .unwrap();
        let err = resolve_config(&cli).unwrap_err();
        assert!(err.to_string().contains("does not persist"));

        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("keychain.yaml");
        std::fs::write(&path, "backend: memory\n").unwrap();
        let cli = Cli::try_parse_from(["keychain", "--config", path.to_str().unwrap(), "list"])
            .unwrap();
        assert!(resolve_config(&cli).is_err());
    }

    #[test]
    fn test_init_writes_config_and_vault_key() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = Paths::with_root(dir.path());
        let config_path = dir.path().join("config/keychain.yaml");

        let cli = Cli::try_parse_from([
            "keychain",
            "--config",
            config_path.to_str().unwrap(),
            "--backend",
            "file",
            "--service",
            "com.example",
            "init",
        ])
        .unwrap();
        let config = resolve_config(&cli).unwrap();
        cmd_init(&config, &paths, &config_path, false).unwrap();

        let saved = KeychainConfig::load_from(&config_path).unwrap();
        assert_eq!(saved.service, "com.example");
        assert_eq!(saved.backend, BackendKind::File);
        assert!(FileStore::new(&paths.state("keychain")).is_initialized());

        // An existing file is left alone unless forced
        std::fs::write(&config_path, "service: edited\nbackend: file\n").unwrap();
        cmd_init(&config, &paths, &config_path, false).unwrap();
        assert_eq!(KeychainConfig::load_from(&config_path).unwrap().service, "edited");

        cmd_init(&config, &paths, &config_path, true).unwrap();
        assert_eq!(
            KeychainConfig::load_from(&config_path).unwrap().service,
            "com.example"
        );
    }

    #[test]
    fn test_missing_config_flag_is_error() {
        let cli = Cli::try_parse_from(["keychain", "--config", "/nonexistent/keychain.yaml", "list"])
            .unwrap();
        assert!(resolve_config(&cli).is_err());
    }
}

//! Standard paths used by keywrap tools

use std::path::{Path, PathBuf};

/// Standard keywrap paths
#[derive(Debug, Clone)]
pub struct Paths {
    /// Data directory (~/.local/share/keywrap)
    pub data: PathBuf,
    /// Config directory (~/.config/keywrap)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("keywrap");

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("keywrap");

        Self { data, config }
    }

    /// Paths rooted under a single directory (tests, portable installs)
    pub fn with_root(root: &Path) -> Self {
        Self {
            data: root.join("data"),
            config: root.join("config"),
        }
    }

    /// Get state directory for a tool
    pub fn state(&self, tool: &str) -> PathBuf {
        self.data.join(tool)
    }

    /// Get the YAML config file for a tool
    pub fn config_file(&self, tool: &str) -> PathBuf {
        self.config.join(format!("{}.yaml", tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_paths_end_in_keywrap() {
        let paths = Paths::new();
        assert!(paths.data.ends_with("keywrap"));
        assert!(paths.config.ends_with("keywrap"));
    }

    #[test]
    fn test_tool_paths() {
        let paths = Paths::with_root(Path::new("/tmp/kw"));
        assert_eq!(paths.state("keychain"), PathBuf::from("/tmp/kw/data/keychain"));
        assert_eq!(
            paths.config_file("keychain"),
            PathBuf::from("/tmp/kw/config/keychain.yaml")
        );
    }
}

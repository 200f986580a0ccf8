// src/config.rs

//! Runtime configuration
//!
//! Loaded from a TOML file; every key is optional.
//!
//! ```toml
//! repos_dir = "/etc/yum.repos.d"
//! cache_dir = "/var/cache/zif"
//! installed_db = "/var/lib/zif/installed.db"
//! releasever = "11"
//! basearch = "i386"
//! metadata_expire = 10800
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Seconds repository metadata stays valid unless a repository overrides it
pub const DEFAULT_METADATA_EXPIRE: u64 = 3 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory scanned for repository files
    pub repos_dir: PathBuf,
    /// Root of the per-repository metadata caches
    pub cache_dir: PathBuf,
    /// SQLite database of installed packages
    pub installed_db: PathBuf,
    /// Value for `$releasever`
    pub releasever: Option<String>,
    /// Value for `$basearch`
    pub basearch: String,
    /// Metadata lifetime in seconds
    pub metadata_expire: u64,
    /// Suffix identifying repository files
    pub repo_suffix: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repos_dir: PathBuf::from("/etc/yum.repos.d"),
            cache_dir: PathBuf::from("/var/cache/zif"),
            installed_db: PathBuf::from("/var/lib/zif/installed.db"),
            releasever: None,
            basearch: std::env::consts::ARCH.to_string(),
            metadata_expire: DEFAULT_METADATA_EXPIRE,
            repo_suffix: ".repo".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, failing if it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load configuration from `path`, or use defaults if it does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Parse TOML configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.repo_suffix.is_empty() {
            return Err(Error::Config("repo_suffix must not be empty".to_string()));
        }
        if self.basearch.is_empty() {
            return Err(Error::Config("basearch must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn metadata_expire(&self) -> Duration {
        Duration::from_secs(self.metadata_expire)
    }

    /// Replace `$releasever` and `$basearch` in `text`
    pub fn expand_substitutions(&self, text: &str) -> Result<String> {
        let mut out = text.replace("$basearch", &self.basearch);
        if out.contains("$releasever") {
            let releasever = self.releasever.as_deref().ok_or_else(|| {
                Error::Config(format!("'{}' uses $releasever but releasever is not set", text))
            })?;
            out = out.replace("$releasever", releasever);
        }
        Ok(out)
    }
}

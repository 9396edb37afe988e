//! Store configuration, read from `.todograph/config.yaml`.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file name within the store directory.
pub const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_MAX_DEPENDENCY_DEPTH: usize = 100;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 3600;
const DEFAULT_PAGE_SIZE: usize = 20;

/// What happens to dependents when an item is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Unlink the item from every dependent, then delete it.
    #[default]
    Cascade,
    /// Refuse while any dependent exists.
    Strict,
}

/// Tunables consumed by the store and the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Bound on the dependency-chain walk performed when adding an edge.
    pub max_dependency_depth: usize,

    /// How often the daemon runs the expiration sweep.
    pub sweep_interval_secs: u64,

    /// Policy applied by `Store::delete_item`.
    pub delete_policy: DeletePolicy,

    /// Page size used by item queries that do not set a limit.
    pub default_page_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_dependency_depth: DEFAULT_MAX_DEPENDENCY_DEPTH,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
            delete_policy: DeletePolicy::default(),
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Config {
    /// Path of the config file for a store rooted at `store_dir`.
    pub fn path(store_dir: &Path) -> PathBuf {
        store_dir.join(CONFIG_FILE)
    }

    /// Load the config, falling back to defaults when the file is absent.
    pub fn load(store_dir: &Path) -> Result<Self> {
        let path = Self::path(store_dir);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config file, replacing any existing one.
    pub fn save(&self, store_dir: &Path) -> Result<()> {
        self.validate()?;
        let path = Self::path(store_dir);
        let yaml = serde_yaml::to_string(self).context("Failed to serialize config")?;
        fs::write(&path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_dependency_depth == 0 {
            eyre::bail!("max_dependency_depth must be at least 1");
        }
        if self.sweep_interval_secs == 0 {
            eyre::bail!("sweep_interval_secs must be at least 1");
        }
        if self.default_page_size == 0 {
            eyre::bail!("default_page_size must be at least 1");
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

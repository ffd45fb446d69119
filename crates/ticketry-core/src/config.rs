use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::query::DEFAULT_LIST_LIMIT;

/// File name looked up under the user config directory.
pub const CONFIG_FILE: &str = "ticketry/config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketryConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub const fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default = "default_list_limit")]
    pub list_limit: u32,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            list_limit: default_list_limit(),
        }
    }
}

/// Load config from `path`. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or if
/// `list_limit` is zero.
pub fn load_config(path: &Path) -> Result<TicketryConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(TicketryConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let config = toml::from_str::<TicketryConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    if config.query.list_limit == 0 {
        anyhow::bail!(
            "Invalid {}: query.list_limit must be at least 1",
            path.display()
        );
    }
    Ok(config)
}

/// `<config_dir>/ticketry/config.toml`, if the platform has a config dir.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(CONFIG_FILE))
}

fn default_store_path() -> PathBuf {
    PathBuf::from("ticketry.db")
}

const fn default_busy_timeout_ms() -> u64 {
    5_000
}

const fn default_list_limit() -> u32 {
    DEFAULT_LIST_LIMIT
}

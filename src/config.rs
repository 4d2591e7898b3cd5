// src/config.rs

//! Engine configuration loaded from TOML
//!
//! ```toml
//! [copy]
//! allow_delayed_copies = true
//! strict_binaries = true
//! primary_requires_ancestry = false
//! close_bugs = true
//! bug_closing_pockets = ["release", "updates", "security"]
//! batch_size = 500
//!
//! [notify]
//! from_address = "Archive Admin <archive@example.com>"
//! announce_list = "changes@lists.example.com"
//! ```

use crate::db::models::Pocket;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/depot/engine.toml";

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub copy: CopyConfig,

    #[serde(default)]
    pub notify: NotifyConfig,
}

/// Copy checker and executor policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyConfig {
    /// Stage private-to-public copies instead of publishing them directly
    #[serde(default = "default_true")]
    pub allow_delayed_copies: bool,

    /// Refuse binary copies when the source has no copyable binaries
    #[serde(default = "default_true")]
    pub strict_binaries: bool,

    /// Fail copies into a primary archive for packages it has never
    /// published, unless overrides are supplied
    #[serde(default)]
    pub primary_requires_ancestry: bool,

    #[serde(default = "default_true")]
    pub close_bugs: bool,

    /// Pockets of a primary archive where landing a copy closes bugs
    #[serde(default = "default_bug_closing_pockets")]
    pub bug_closing_pockets: Vec<Pocket>,

    /// Rows per bulk binary-publication insert statement
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_bug_closing_pockets() -> Vec<Pocket> {
    vec![Pocket::Release, Pocket::Updates, Pocket::Security]
}

fn default_batch_size() -> usize {
    500
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            allow_delayed_copies: true,
            strict_binaries: true,
            primary_requires_ancestry: false,
            close_bugs: true,
            bug_closing_pockets: default_bug_closing_pockets(),
            batch_size: default_batch_size(),
        }
    }
}

/// Notification addressing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Sender used when no person address applies
    #[serde(default)]
    pub from_address: Option<String>,

    /// Announcement list for primary-archive copies
    #[serde(default)]
    pub announce_list: Option<String>,
}

impl EngineConfig {
    /// Check values serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.copy.batch_size == 0 {
            return Err(Error::ConfigError(
                "copy.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a configuration from a TOML string
pub fn parse_config_string(content: &str) -> Result<EngineConfig> {
    let config: EngineConfig =
        toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from `path`; a missing file yields the defaults
pub fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() {
        debug!("No config at {}, using defaults", path.display());
        return Ok(EngineConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    parse_config_string(&content)
}

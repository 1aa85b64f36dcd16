//! Configuration management for ex33 CLI

use anyhow::{Context, Result};
use ex33::{ArrayPolicy, BackupLocation};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONVERTER: &str = "~/.cargo/bin/uesave";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAPPING: &str = "ex33_mapping_full.yaml";
pub const DEFAULT_GAP_LOG: &str = "missing_subcategories.log";
pub const DEFAULT_SUBCATEGORY: &str = "Default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Converter executable (uesave)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter: Option<String>,
    /// Seconds before a conversion is killed; 0 waits forever
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converter_timeout_secs: Option<u64>,
    /// Fixed backup directory; unset means `Save_Backup` next to each file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gap_log: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_policy: Option<ArrayPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_subcategory: Option<String>,
}

impl Config {
    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Could not determine config directory")?
            .join("ex33");

        Ok(config_dir.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Config::default());
        }

        let contents = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

        toml::from_str(&contents).context("Failed to parse config file")
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory at {}", parent.display())
            })?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(config_path, contents)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

        Ok(())
    }

    pub fn converter(&self) -> PathBuf {
        expand_tilde(self.converter.as_deref().unwrap_or(DEFAULT_CONVERTER))
    }

    /// `None` when the timeout is disabled
    pub fn converter_timeout(&self) -> Option<Duration> {
        match self.converter_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn backup_location(&self) -> BackupLocation {
        match &self.backup_dir {
            Some(dir) => BackupLocation::Dir(expand_tilde(dir)),
            None => BackupLocation::Beside,
        }
    }

    pub fn mapping_path(&self) -> PathBuf {
        expand_tilde(self.mapping.as_deref().unwrap_or(DEFAULT_MAPPING))
    }

    pub fn gap_log_path(&self) -> PathBuf {
        expand_tilde(self.gap_log.as_deref().unwrap_or(DEFAULT_GAP_LOG))
    }

    pub fn array_policy(&self) -> ArrayPolicy {
        self.array_policy.unwrap_or_default()
    }

    pub fn default_subcategory(&self) -> &str {
        self.default_subcategory
            .as_deref()
            .unwrap_or(DEFAULT_SUBCATEGORY)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => rest,
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

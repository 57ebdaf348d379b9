//! howler-ctl configuration management

use anyhow::{Context, Result, anyhow};
use common::LOG_LEVELS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HowlerConfig {
    #[serde(default)]
    pub logging: LoggingSettings,
    #[serde(default)]
    pub transfer: TransferSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error
    #[serde(default = "LoggingSettings::default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

impl LoggingSettings {
    fn default_level() -> String {
        "info".to_string()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Interrupt transfer timeout in milliseconds (0 = wait forever)
    #[serde(default)]
    pub timeout_ms: u64,
}

impl TransferSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Fallback config consulted after the per-user file
const SYSTEM_CONFIG_PATH: &str = "/etc/howler/howler.toml";

impl HowlerConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path the user config and then `/etc/howler/howler.toml` are
    /// tried; it is an error if neither exists.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::load_file(&expand_path(&p)),
            None => Self::load_first(&Self::candidate_paths())?
                .ok_or_else(|| anyhow!("No configuration file found")),
        }
    }

    /// Load configuration or return defaults if not found
    ///
    /// Runs before logging is set up, so problems go to stderr directly.
    pub fn load_or_default() -> Self {
        Self::first_or_default(&Self::candidate_paths())
    }

    fn candidate_paths() -> Vec<PathBuf> {
        vec![Self::default_path(), PathBuf::from(SYSTEM_CONFIG_PATH)]
    }

    /// Parse the first candidate that exists; `None` if none do
    fn load_first(candidates: &[PathBuf]) -> Result<Option<Self>> {
        match candidates.iter().find(|p| p.exists()) {
            Some(path) => Self::load_file(path).map(Some),
            None => Ok(None),
        }
    }

    /// Defaults stay silent only when no candidate file exists at all
    fn first_or_default(candidates: &[PathBuf]) -> Self {
        match Self::load_first(candidates) {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => {
                eprintln!("Failed to load config: {:#}, using defaults", e);
                Self::default()
            }
        }
    }

    fn load_file(config_path: &Path) -> Result<Self> {
        let content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: HowlerConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;

        config.validate()?;

        tracing::debug!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Save configuration to the specified path
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("howler").join("howler.toml")
        } else {
            PathBuf::from(".config/howler/howler.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> common::Result<()> {
        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(common::Error::Config(format!(
                "Invalid log level '{}', must be one of: {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }
}

/// Expand `~` and environment variables in a user-supplied path
fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => path.to_path_buf(),
    }
}

//! Monitor configuration management

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    #[serde(default)]
    pub monitor: MonitorSettings,
    #[serde(default)]
    pub eject: EjectSettings,
    /// Event and failure log retention
    #[serde(default)]
    pub retention: RetentionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Seconds between status reports
    #[serde(default = "MonitorSettings::default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "MonitorSettings::default_log_level")]
    pub log_level: String,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: Self::default_poll_interval(),
            log_level: Self::default_log_level(),
        }
    }
}

impl MonitorSettings {
    fn default_poll_interval() -> u64 {
        3
    }

    fn default_log_level() -> String {
        "info".to_string()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EjectSettings {
    /// Delay before the second media-eject attempt, in milliseconds
    #[serde(default = "EjectSettings::default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for EjectSettings {
    fn default() -> Self {
        Self {
            retry_delay_ms: Self::default_retry_delay(),
        }
    }
}

impl EjectSettings {
    fn default_retry_delay() -> u64 {
        500
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Retention limits of the in-memory logs (0 = unbounded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionSettings {
    #[serde(default = "RetentionSettings::default_max_events")]
    pub max_events: usize,
    #[serde(default = "RetentionSettings::default_max_failures")]
    pub max_failures: usize,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            max_events: Self::default_max_events(),
            max_failures: Self::default_max_failures(),
        }
    }
}

impl RetentionSettings {
    fn default_max_events() -> usize {
        1000
    }

    fn default_max_failures() -> usize {
        200
    }

    /// Keep every entry for the life of the process
    pub fn unbounded() -> Self {
        Self {
            max_events: 0,
            max_failures: 0,
        }
    }
}

impl MonitorConfig {
    /// Load configuration from the specified path
    ///
    /// Without a path the default location is used, and a missing file
    /// there is an error.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(shellexpand::tilde(&p.to_string_lossy()).as_ref()),
            None => {
                let default = Self::default_path();
                if !default.exists() {
                    return Err(anyhow!("No configuration file found, using defaults"));
                }
                default
            }
        };

        let config = Self::load_from(&config_path)?;
        tracing::info!("Loaded configuration from: {}", config_path.display());
        Ok(config)
    }

    /// Read, parse and validate one configuration file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: MonitorConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default() -> Self {
        match Self::load(None) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            }
        }
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

        tracing::info!("Saved configuration to: {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("usb-monitor").join("monitor.toml")
        } else {
            PathBuf::from(".config/usb-monitor/monitor.toml")
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        Self::validate_log_level(&self.monitor.log_level)?;

        if self.monitor.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be greater than 0"));
        }

        Ok(())
    }

    /// Check a log level name
    pub fn validate_log_level(level: &str) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&level) {
            return Err(anyhow!(
                "Invalid log level '{}', must be one of: {}",
                level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

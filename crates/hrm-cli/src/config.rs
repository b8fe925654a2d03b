//! Configuration file management.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::{DeviceArgs, OutputFormat};

/// Default connection timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Configuration file structure
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Default device identifier
    #[serde(default)]
    pub device: Option<String>,

    /// Log advertisement and service details of the bound device
    #[serde(default)]
    pub verbose: bool,

    /// Connection timeout in seconds
    #[serde(default)]
    pub timeout: Option<u64>,

    /// Default output format
    #[serde(default)]
    pub format: Option<OutputFormat>,
}

impl Config {
    /// Get the config file path
    pub fn path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hrm")
            .join("config.toml")
    }

    /// Load config from file, or return default if not found
    pub fn load() -> Self {
        match Self::load_from(&Self::path()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load config from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        Ok(())
    }
}

/// Device settings after merging command-line flags over the config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub device: String,
    pub timeout: Duration,
    pub format: OutputFormat,
}

/// Merge `args` over `config`. Flags win; a device is required from one of them.
pub fn resolve(args: &DeviceArgs, config: &Config) -> Result<Resolved> {
    let device = args
        .device
        .clone()
        .or_else(|| config.device.clone())
        .context("No device specified. Use --device, HRM_DEVICE, or `hrm config --set-device`")?;
    let timeout = args
        .timeout
        .or(config.timeout)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    Ok(Resolved {
        device,
        timeout: Duration::from_secs(timeout),
        format: args.format.or(config.format).unwrap_or_default(),
    })
}

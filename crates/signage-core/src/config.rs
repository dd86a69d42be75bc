//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/signage/config.toml)
//! 3. Environment variables (SIGNAGE_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;

use crate::images::{ImageNaming, DEFAULT_MAX_IMAGE_BYTES};

/// Upload ceilings the kiosk is meant to run with; others load with a warning
pub const RECOMMENDED_IMAGE_BYTES: RangeInclusive<u64> = 3 * 1024 * 1024..=5 * 1024 * 1024;

/// Environment variable prefix
const ENV_PREFIX: &str = "SIGNAGE";

/// Items shown on one page of the list view
pub const DEFAULT_LIST_PAGE_SIZE: usize = 5;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for persisted state (one JSON file per key) and images
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Size ceiling for attached images, in bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: u64,

    /// How stored image files are named
    #[serde(default)]
    pub image_naming: ImageNaming,

    /// Items per list page in the list view
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,

    /// Log file for the kiosk (defaults to {data_dir}/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            image_naming: ImageNaming::default(),
            list_page_size: DEFAULT_LIST_PAGE_SIZE,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (SIGNAGE_DATA_DIR, SIGNAGE_MAX_IMAGE_BYTES, SIGNAGE_LOG_FILE)
    /// 2. Config file (~/.config/signage/config.toml or SIGNAGE_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.warn_unusual_values();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        config.warn_unusual_values();
        Ok(config)
    }

    /// Configuration rooted at a specific data directory, no file or env lookups
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Whether the upload ceiling is within the recommended 3-5 MiB
    pub fn image_ceiling_recommended(&self) -> bool {
        RECOMMENDED_IMAGE_BYTES.contains(&self.max_image_bytes)
    }

    fn warn_unusual_values(&self) {
        if !self.image_ceiling_recommended() {
            tracing::warn!(
                max_image_bytes = self.max_image_bytes,
                "image size ceiling is outside the recommended 3-5 MiB"
            );
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // SIGNAGE_DATA_DIR
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // SIGNAGE_MAX_IMAGE_BYTES (ignored unless a positive integer)
        if let Ok(val) = std::env::var(format!("{}_MAX_IMAGE_BYTES", ENV_PREFIX)) {
            match val.trim().parse::<u64>() {
                Ok(bytes) if bytes > 0 => self.max_image_bytes = bytes,
                _ => tracing::warn!("Ignoring invalid {}_MAX_IMAGE_BYTES={:?}", ENV_PREFIX, val),
            }
        }

        // SIGNAGE_LOG_FILE
        if let Ok(val) = std::env::var(format!("{}_LOG_FILE", ENV_PREFIX)) {
            self.log_file = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with SIGNAGE_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("signage")
            .join("config.toml")
    }

    /// Path of the file backing a persisted key
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.data_dir.join(format!("{}.json", key))
    }

    /// Root directory for stored images
    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }

    /// Effective kiosk log file
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("signage")
}

fn default_max_image_bytes() -> u64 {
    DEFAULT_MAX_IMAGE_BYTES
}

fn default_list_page_size() -> usize {
    DEFAULT_LIST_PAGE_SIZE
}

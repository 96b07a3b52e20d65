//! INI configuration file.
//!
//! ```ini
//! [cache]
//! directory = ~/.cache/imagecache
//! memory_cost_limit = 64M
//! display_scale = 2.0
//! disk_enabled = true
//! stats_interval_secs = 0
//!
//! [pressure]
//! low_memory_threshold = 256M
//! poll_interval_secs = 5
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::{Ini, Properties};
use thiserror::Error;

use super::size::parse_size;
use crate::cache::{default_cache_dir, ImageCacheConfig, DEFAULT_MEMORY_COST_LIMIT};
use crate::pressure::{PressureConfig, DEFAULT_LOW_MEMORY_THRESHOLD, DEFAULT_POLL_INTERVAL_SECS};

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[cache]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub directory: PathBuf,
    pub memory_cost_limit: u64,
    pub display_scale: f64,
    pub disk_enabled: bool,
    pub stats_interval_secs: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            directory: default_cache_dir(),
            memory_cost_limit: DEFAULT_MEMORY_COST_LIMIT,
            display_scale: 1.0,
            disk_enabled: true,
            stats_interval_secs: 0,
        }
    }
}

/// `[pressure]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PressureSettings {
    pub low_memory_threshold: u64,
    pub poll_interval_secs: u64,
}

impl Default for PressureSettings {
    fn default() -> Self {
        Self {
            low_memory_threshold: DEFAULT_LOW_MEMORY_THRESHOLD,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub pressure: PressureSettings,
}

impl ConfigFile {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        parse_ini(&ini)
    }

    /// Cache configuration described by this file.
    pub fn cache_config(&self) -> ImageCacheConfig {
        let config = ImageCacheConfig::new()
            .with_memory_cost_limit(self.cache.memory_cost_limit)
            .with_display_scale(self.cache.display_scale)
            .with_stats_interval(self.cache.stats_interval_secs);

        if self.cache.disk_enabled {
            config.with_cache_dir(self.cache.directory.clone())
        } else {
            config.memory_only()
        }
    }

    /// Memory watermark monitor configuration described by this file.
    pub fn pressure_config(&self) -> PressureConfig {
        PressureConfig {
            low_memory_threshold: self.pressure.low_memory_threshold,
            poll_interval: Duration::from_secs(self.pressure.poll_interval_secs),
        }
    }
}

/// Overlay the values found in `ini` on the defaults.
fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.cache.directory = expand_tilde(v);
            }
        }
        if let Some(v) = size_value(section, "cache", "memory_cost_limit")? {
            config.cache.memory_cost_limit = v;
        }
        if let Some(v) = section.get("display_scale") {
            let scale: f64 = parse_value(v, "cache", "display_scale", "expected a number")?;
            if !scale.is_finite() || scale <= 0.0 {
                return Err(invalid(
                    "cache",
                    "display_scale",
                    v,
                    "must be a positive number",
                ));
            }
            config.cache.display_scale = scale;
        }
        if let Some(v) = section.get("disk_enabled") {
            config.cache.disk_enabled = parse_bool(v);
        }
        if let Some(v) = section.get("stats_interval_secs") {
            config.cache.stats_interval_secs =
                parse_value(v, "cache", "stats_interval_secs", "expected whole seconds")?;
        }
    }

    if let Some(section) = ini.section(Some("pressure")) {
        if let Some(v) = size_value(section, "pressure", "low_memory_threshold")? {
            config.pressure.low_memory_threshold = v;
        }
        if let Some(v) = section.get("poll_interval_secs") {
            config.pressure.poll_interval_secs =
                parse_value(v, "pressure", "poll_interval_secs", "expected whole seconds")?;
        }
    }

    Ok(config)
}

fn size_value(
    section: &Properties,
    section_name: &str,
    key: &str,
) -> Result<Option<u64>, ConfigFileError> {
    section
        .get(key)
        .map(|v| {
            parse_size(v).map_err(|_| {
                invalid(
                    section_name,
                    key,
                    v,
                    "expected format like '64M', '512K', or '1G'",
                )
            })
        })
        .transpose()
}

fn parse_value<T: FromStr>(
    value: &str,
    section: &str,
    key: &str,
    reason: &str,
) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, reason))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Directory holding the config file (platform config dir plus `imagecache`).
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imagecache")
}

/// Default config file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

//! Core types for the image cache.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Opaque key identifying a cached image.
///
/// Keys are compared by exact string equality. They carry no ordering
/// semantics and any string, including the empty string, is a valid key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Create a new cache key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Callback invoked exactly once when a store or clear has finished.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

/// Cache-related errors.
///
/// These never cross the public `store`/`image`/`clear_*` surface of the
/// facade. They are used internally, for logging and statistics, and for
/// construction failures.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during disk operations
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Image could not be serialized for persistence
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// Stored bytes could not be turned back into an image
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// No async runtime available for background disk work
    #[error("No tokio runtime available: {0}")]
    Runtime(String),

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Memory store configuration.
#[derive(Debug, Clone)]
pub struct MemoryStoreConfig {
    /// Aggregate cost budget in pixel area (0 = unbounded)
    pub cost_limit: u64,
}

impl Default for MemoryStoreConfig {
    fn default() -> Self {
        Self {
            cost_limit: DEFAULT_MEMORY_COST_LIMIT,
        }
    }
}

/// Default memory budget: 64 Mi pixels, roughly 256 MB of RGBA.
pub const DEFAULT_MEMORY_COST_LIMIT: u64 = 64 * 1024 * 1024;

/// Disk store configuration.
#[derive(Debug, Clone)]
pub struct DiskStoreConfig {
    /// Cache directory root
    pub cache_dir: PathBuf,
}

impl Default for DiskStoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
        }
    }
}

/// Default on-disk location: the platform cache dir plus `imagecache`.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("imagecache")
}

/// Complete image cache configuration.
#[derive(Debug, Clone)]
pub struct ImageCacheConfig {
    /// Memory tier configuration
    pub memory: MemoryStoreConfig,
    /// Disk tier configuration (`None` runs memory-only)
    pub disk: Option<DiskStoreConfig>,
    /// Pixel density used when decoding images read back from disk
    pub display_scale: f64,
    /// Interval for periodic statistics logging (0 disables it)
    pub stats_interval_secs: u64,
}

impl Default for ImageCacheConfig {
    fn default() -> Self {
        Self {
            memory: MemoryStoreConfig::default(),
            disk: Some(DiskStoreConfig::default()),
            display_scale: 1.0,
            stats_interval_secs: 0,
        }
    }
}

impl ImageCacheConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the memory cost budget.
    pub fn with_memory_cost_limit(mut self, limit: u64) -> Self {
        self.memory.cost_limit = limit;
        self
    }

    /// Set the cache directory, enabling the disk tier.
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.disk = Some(DiskStoreConfig { cache_dir: dir });
        self
    }

    /// Run without a disk tier.
    pub fn memory_only(mut self) -> Self {
        self.disk = None;
        self
    }

    /// Set the display scale used to decode disk hits.
    pub fn with_display_scale(mut self, scale: f64) -> Self {
        self.display_scale = scale;
        self
    }

    /// Set the statistics logging interval.
    pub fn with_stats_interval(mut self, secs: u64) -> Self {
        self.stats_interval_secs = secs;
        self
    }

    /// Statistics logging interval, if enabled.
    pub fn stats_interval(&self) -> Option<Duration> {
        (self.stats_interval_secs > 0).then(|| Duration::from_secs(self.stats_interval_secs))
    }

    /// Check the configuration for values the cache cannot work with.
    pub fn validate(&self) -> Result<(), CacheError> {
        if !self.display_scale.is_finite() || self.display_scale <= 0.0 {
            return Err(CacheError::InvalidConfig(format!(
                "display_scale must be a positive number, got {}",
                self.display_scale
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_equality() {
        let key1 = CacheKey::new("route-shield/us-101");
        let key2 = CacheKey::from("route-shield/us-101");
        let key3 = CacheKey::from(String::from("route-shield/us-102"));

        assert_eq!(key1, key2);
        assert_ne!(key1, key3);
    }

    #[test]
    fn test_cache_key_display() {
        let key = CacheKey::new("lane-arrow:left");
        assert_eq!(key.to_string(), "lane-arrow:left");
        assert_eq!(key.as_str(), "lane-arrow:left");
    }

    #[test]
    fn test_empty_key_is_valid() {
        let key = CacheKey::new("");
        assert_eq!(key.as_str(), "");
    }

    #[test]
    fn test_default_config() {
        let config = ImageCacheConfig::default();
        assert_eq!(config.memory.cost_limit, DEFAULT_MEMORY_COST_LIMIT);
        assert_eq!(config.display_scale, 1.0);
        assert!(config.stats_interval().is_none());
        let disk = config.disk.expect("disk tier enabled by default");
        assert!(disk.cache_dir.ends_with("imagecache"));
    }

    #[test]
    fn test_config_builder() {
        let config = ImageCacheConfig::new()
            .with_memory_cost_limit(1_000_000)
            .with_cache_dir(PathBuf::from("/tmp/images"))
            .with_display_scale(2.0)
            .with_stats_interval(30);

        assert_eq!(config.memory.cost_limit, 1_000_000);
        assert_eq!(
            config.disk.as_ref().map(|d| d.cache_dir.clone()),
            Some(PathBuf::from("/tmp/images"))
        );
        assert_eq!(config.display_scale, 2.0);
        assert_eq!(config.stats_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_memory_only() {
        let config = ImageCacheConfig::new().memory_only();
        assert!(config.disk.is_none());
    }

    #[test]
    fn test_validate_rejects_bad_scale() {
        assert!(ImageCacheConfig::new().validate().is_ok());
        assert!(ImageCacheConfig::new()
            .with_display_scale(0.0)
            .validate()
            .is_err());
        assert!(ImageCacheConfig::new()
            .with_display_scale(f64::NAN)
            .validate()
            .is_err());
    }
}

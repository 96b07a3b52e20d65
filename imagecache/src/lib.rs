//! imagecache - two-tier cache for decoded images
//!
//! Keeps rendered images in a cost-bounded memory store and, on request,
//! persists them to disk so they survive restarts. Memory is dropped
//! wholesale when the host reports memory pressure; disk hits are decoded and
//! promoted back into memory on the next read.
//!
//! ```no_run
//! use imagecache::cache::{CacheKey, CachedImage, ImageCache, ImageCacheConfig};
//! use imagecache::pressure::PressureSignal;
//! use image::RgbaImage;
//!
//! # async fn demo() -> Result<(), imagecache::cache::CacheError> {
//! let pressure = PressureSignal::new();
//! let cache = ImageCache::start(ImageCacheConfig::default(), Some(&pressure))?;
//!
//! let key = CacheKey::new("shield/us-101");
//! let image = CachedImage::new(RgbaImage::new(64, 64), 2.0);
//! cache.store_async(image, key.clone(), true).await;
//!
//! pressure.notify();
//! assert!(cache.image_async(key).await.is_some());
//! # Ok(())
//! # }
//! ```
//!
//! A long-running host loads its settings from the config file and lets the
//! watermark monitor raise pressure when system memory runs low:
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use imagecache::cache::ImageCache;
//! use imagecache::config::ConfigFile;
//! use imagecache::logging::{default_log_dir, default_log_file, init_logging};
//! use imagecache::pressure::{MemoryWatermarkMonitor, PressureSignal, ProcMeminfo};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigFile::load()?;
//! let _logging = init_logging(&default_log_dir(), default_log_file())?;
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let _guard = runtime.enter();
//!
//! let pressure = PressureSignal::new();
//! let monitor = MemoryWatermarkMonitor::start(
//!     config.pressure_config(),
//!     Arc::new(ProcMeminfo),
//!     pressure.clone(),
//!     runtime.handle(),
//! );
//! let mut cache = ImageCache::start(config.cache_config(), Some(&pressure))?;
//!
//! // ... serve images ...
//!
//! runtime.block_on(async {
//!     monitor.shutdown().await;
//!     cache.shutdown().await;
//! });
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod logging;
pub mod pressure;

/// Version of the imagecache library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

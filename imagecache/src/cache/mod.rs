//! Two-tier image cache.
//!
//! Decoded images live in a cost-bounded memory store; encoded copies can be
//! persisted to a disk store that survives restarts. [`ImageCache`] ties the
//! two together and promotes disk hits back into memory.

mod bridge;
mod disk;
mod image;
mod memory;
mod stats;
mod system;
mod r#trait;
mod types;

pub use bridge::PressureBridge;
pub use disk::{disk_usage, key_to_filename, DiskStore, DiskUsage};
pub use self::image::CachedImage;
pub use memory::MemoryStore;
pub use r#trait::{BlobStore, NoOpBlobStore};
pub use stats::{CacheStatistics, CacheStats};
pub use system::ImageCache;
pub use types::{
    default_cache_dir, CacheError, CacheKey, Completion, DiskStoreConfig, ImageCacheConfig,
    MemoryStoreConfig, DEFAULT_MEMORY_COST_LIMIT,
};

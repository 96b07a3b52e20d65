//! Two-tier image cache facade.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::bridge::PressureBridge;
use crate::cache::disk::DiskStore;
use crate::cache::image::CachedImage;
use crate::cache::memory::MemoryStore;
use crate::cache::r#trait::{BlobStore, NoOpBlobStore};
use crate::cache::types::{CacheError, CacheKey, Completion, ImageCacheConfig};
use crate::cache::{CacheStatistics, CacheStats};
use crate::pressure::PressureSource;

/// State shared between the facade and its background work.
struct Tiers {
    /// Tier 1: decoded images
    memory: Arc<MemoryStore>,
    /// Tier 2: encoded bytes
    disk: Arc<dyn BlobStore>,
    /// Scale given to images decoded from disk
    display_scale: f64,
    /// Promotion and codec counters
    stats: Mutex<CacheStats>,
}

impl Tiers {
    /// Memory first, then disk with promotion.
    fn lookup(&self, key: &CacheKey) -> Option<CachedImage> {
        if let Some(image) = self.memory.get(key) {
            return Some(image);
        }

        let bytes = self.disk.read(key)?;
        match CachedImage::decode(&bytes, self.display_scale) {
            Ok(image) => {
                self.memory.put(key.clone(), image.clone());
                self.stats.lock().record_promotion();
                debug!(key = %key, "Promoted disk hit to memory");
                Some(image)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring undecodable disk entry");
                self.stats.lock().record_decode_failure();
                None
            }
        }
    }

    fn combined_stats(&self) -> CacheStats {
        let mut combined = self.memory.stats();
        combined.absorb(&self.disk.stats());
        combined.absorb(&self.stats.lock());
        combined
    }
}

/// Background task for periodic cache statistics logging.
struct CacheStatsLogger {
    shutdown: CancellationToken,
}

impl CacheStatsLogger {
    fn start(tiers: Arc<Tiers>, interval: Duration, runtime: &Handle) -> Self {
        let shutdown = CancellationToken::new();
        runtime.spawn(Self::run(tiers, interval, shutdown.clone()));
        Self { shutdown }
    }

    async fn run(tiers: Arc<Tiers>, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    debug!("Cache stats logger shutting down");
                    break;
                }

                _ = ticker.tick() => Self::log_stats(&tiers.combined_stats()),
            }
        }
    }

    fn log_stats(stats: &CacheStats) {
        info!(
            entries = stats.memory_entry_count,
            cost = stats.memory_cost,
            hits = stats.memory_hits,
            hit_rate_pct = stats.memory_hit_rate() * 100.0,
            evictions = stats.memory_evictions,
            pressure_clears = stats.memory_pressure_clears,
            "[CACHE] Memory"
        );
        info!(
            hits = stats.disk_hits,
            hit_rate_pct = stats.disk_hit_rate() * 100.0,
            writes = stats.disk_writes,
            coalesced = stats.disk_writes_coalesced,
            write_failures = stats.disk_write_failures,
            read_failures = stats.disk_read_failures,
            "[CACHE] Disk"
        );

        let hits = stats.memory_hits + stats.disk_hits;
        if hits + stats.disk_misses > 0 {
            info!(
                hit_rate_pct = stats.overall_hit_rate() * 100.0,
                promotions = stats.promotions,
                "[CACHE] Overall"
            );
        }
    }
}

impl Drop for CacheStatsLogger {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Two-tier image cache coordinating memory and disk stores.
///
/// Lookup strategy:
/// 1. Check the memory store
/// 2. On a miss, read the disk store, decode, and promote into memory
/// 3. On a miss in both, the caller renders the image and stores it
///
/// Writes always land in memory synchronously. Disk writes are optional per
/// call and run in the background; the completion callback says when.
///
/// Failures never surface here: an image that cannot be encoded is simply
/// not persisted, and a disk entry that cannot be read or decoded is a miss.
///
/// # Example
///
/// ```
/// use imagecache::cache::{CacheKey, CachedImage, ImageCache, MemoryStore, NoOpBlobStore};
/// use image::RgbaImage;
/// use std::sync::Arc;
///
/// let cache = ImageCache::with_stores(
///     Arc::new(MemoryStore::new(0)),
///     Arc::new(NoOpBlobStore),
///     1.0,
///     None,
/// );
///
/// let key = CacheKey::new("shield/us-101");
/// match cache.image(&key) {
///     Some(image) => println!("cached {}x{}", image.pixel_width(), image.pixel_height()),
///     None => {
///         let rendered = CachedImage::new(RgbaImage::new(64, 64), 1.0);
///         cache.store(rendered, key, false, None);
///     }
/// }
/// ```
pub struct ImageCache {
    tiers: Arc<Tiers>,
    /// Concrete disk store when started from config, for flush and shutdown
    disk_store: Option<Arc<DiskStore>>,
    /// Memory pressure registration, released on drop
    _bridge: Option<PressureBridge>,
    /// Background stats logger (None if the interval is 0)
    stats_logger: Option<CacheStatsLogger>,
}

impl ImageCache {
    /// Build both tiers from configuration.
    ///
    /// Must be called within a tokio runtime when the disk tier or stats
    /// logging is enabled.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid, no runtime is available, or
    /// the cache directory cannot be created.
    pub fn start(
        config: ImageCacheConfig,
        pressure: Option<&dyn PressureSource>,
    ) -> Result<Self, CacheError> {
        config.validate()?;

        let runtime = || Handle::try_current().map_err(|e| CacheError::Runtime(e.to_string()));

        let memory = Arc::new(MemoryStore::new(config.memory.cost_limit));
        let disk_store = match config.disk.clone() {
            Some(disk_config) => Some(DiskStore::start(disk_config, &runtime()?)?),
            None => None,
        };
        let disk: Arc<dyn BlobStore> = match &disk_store {
            Some(store) => Arc::clone(store) as Arc<dyn BlobStore>,
            None => Arc::new(NoOpBlobStore),
        };

        let mut cache = Self::with_stores(memory, disk, config.display_scale, pressure);
        cache.disk_store = disk_store;

        if let Some(interval) = config.stats_interval() {
            cache.stats_logger = Some(CacheStatsLogger::start(
                Arc::clone(&cache.tiers),
                interval,
                &runtime()?,
            ));
        }

        info!(
            memory_cost_limit = config.memory.cost_limit,
            disk = ?config.disk.as_ref().map(|d| d.cache_dir.display().to_string()),
            display_scale = config.display_scale,
            "Image cache started"
        );

        Ok(cache)
    }

    /// Assemble a cache from existing stores.
    ///
    /// `display_scale` is the density given to images decoded from disk.
    /// When `pressure` is given, each of its notifications clears `memory`.
    pub fn with_stores(
        memory: Arc<MemoryStore>,
        disk: Arc<dyn BlobStore>,
        display_scale: f64,
        pressure: Option<&dyn PressureSource>,
    ) -> Self {
        let bridge = pressure.map(|source| PressureBridge::attach(source, Arc::downgrade(&memory)));

        Self {
            tiers: Arc::new(Tiers {
                memory,
                disk,
                display_scale,
                stats: Mutex::new(CacheStats::new()),
            }),
            disk_store: None,
            _bridge: bridge,
            stats_logger: None,
        }
    }

    /// Cache an image under `key`.
    ///
    /// The memory store is updated before this returns. With `to_disk`, the
    /// image is encoded and persisted in the background and `completion`
    /// fires once the write has finished or failed. Without `to_disk`, or if
    /// encoding fails, `completion` fires immediately on this thread.
    pub fn store(
        &self,
        image: CachedImage,
        key: CacheKey,
        to_disk: bool,
        completion: Option<Completion>,
    ) {
        self.tiers.memory.put(key.clone(), image.clone());

        if !to_disk {
            fire(completion);
            return;
        }

        match image.encode_png() {
            Ok(bytes) => self.tiers.disk.store(&key, bytes, completion),
            Err(e) => {
                warn!(key = %key, error = %e, "Skipping disk write");
                self.tiers.stats.lock().record_encode_failure();
                fire(completion);
            }
        }
    }

    /// [`store`](Self::store), resolving when the completion would fire.
    pub async fn store_async(&self, image: CachedImage, key: CacheKey, to_disk: bool) {
        let (done, waiter) = oneshot::channel();
        self.store(
            image,
            key,
            to_disk,
            Some(Box::new(move || {
                let _ = done.send(());
            })),
        );
        let _ = waiter.await;
    }

    /// Look up an image, promoting disk hits into memory.
    ///
    /// A memory miss reads the disk store inline, so this may block the
    /// calling thread. Use [`image_async`](Self::image_async) from async code.
    pub fn image(&self, key: &CacheKey) -> Option<CachedImage> {
        self.tiers.lookup(key)
    }

    /// Look up an optional key. `None` returns `None` without touching
    /// either store.
    pub fn image_for(&self, key: Option<&CacheKey>) -> Option<CachedImage> {
        self.image(key?)
    }

    /// [`image`](Self::image) on the blocking thread pool.
    pub async fn image_async(&self, key: CacheKey) -> Option<CachedImage> {
        let tiers = Arc::clone(&self.tiers);
        match tokio::task::spawn_blocking(move || tiers.lookup(&key)).await {
            Ok(image) => image,
            Err(e) => {
                warn!(error = %e, "Image lookup task failed");
                None
            }
        }
    }

    /// Drop every image held in memory. The disk store is untouched.
    pub fn clear_memory(&self) {
        let dropped = self.tiers.memory.clear();
        info!(dropped, "Cleared image memory cache");
    }

    /// Delete everything persisted on disk. The memory store is untouched.
    ///
    /// `completion` fires once the directory has been removed.
    pub fn clear_disk(&self, completion: Option<Completion>) {
        self.tiers.disk.clear(completion);
    }

    /// The memory tier.
    pub fn memory(&self) -> &Arc<MemoryStore> {
        &self.tiers.memory
    }

    /// The disk tier, when started from configuration with disk enabled.
    pub fn disk_store(&self) -> Option<&Arc<DiskStore>> {
        self.disk_store.as_ref()
    }

    /// Display scale used when decoding disk hits.
    pub fn display_scale(&self) -> f64 {
        self.tiers.display_scale
    }

    /// Combined statistics for both tiers.
    pub fn stats(&self) -> CacheStatistics {
        CacheStatistics::from_stats(&self.tiers.combined_stats())
    }

    /// Human-readable statistics report.
    pub fn format_stats(&self) -> String {
        self.stats().format()
    }

    /// Wait until queued disk work has run.
    pub async fn flush(&self) {
        if let Some(disk) = &self.disk_store {
            disk.flush().await;
        }
    }

    /// Stop background tasks after queued disk work has run.
    pub async fn shutdown(&mut self) {
        self.stats_logger = None;
        if let Some(disk) = &self.disk_store {
            disk.shutdown().await;
        }
        info!("Image cache shut down");
    }
}

fn fire(completion: Option<Completion>) {
    if let Some(done) = completion {
        done();
    }
}

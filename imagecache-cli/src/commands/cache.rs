//! Disk cache CLI commands.

use std::path::{Path, PathBuf};

use clap::Subcommand;
use image::{DynamicImage, ImageFormat};
use imagecache::cache::{
    disk_usage, key_to_filename, BlobStore, CacheKey, CachedImage, DiskStore, DiskStoreConfig,
    ImageCache,
};
use imagecache::config::{format_size, ConfigFile};
use tokio::runtime::Handle;
use tracing::info;

use crate::error::CliError;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Decode an image file and store it in the disk cache
    Put {
        /// Image file to store (PNG or JPEG)
        file: PathBuf,
        /// Cache key to store it under
        #[arg(long)]
        key: String,
        /// Density scale of the image (defaults to the configured display scale)
        #[arg(long, value_parser = parse_scale)]
        scale: Option<f64>,
    },
    /// Load an image from the disk cache and write it out
    Get {
        /// Cache key to look up
        key: String,
        /// Output file; the format follows the extension
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Clear the disk cache, removing all cached images
    Clear,
    /// Show disk cache statistics
    Stats,
    /// Print the file that holds a key's entry
    Path {
        /// Cache key
        key: String,
    },
}

impl CacheAction {
    /// Command name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            CacheAction::Put { .. } => "put",
            CacheAction::Get { .. } => "get",
            CacheAction::Clear => "clear",
            CacheAction::Stats => "stats",
            CacheAction::Path { .. } => "path",
        }
    }
}

/// Run a cache subcommand.
pub async fn run(action: CacheAction, config: &ConfigFile) -> Result<(), CliError> {
    let dir = cache_dir(config)?;

    match action {
        CacheAction::Put { file, key, scale } => {
            let scale = scale.unwrap_or(config.cache.display_scale);
            put(config, &file, CacheKey::new(key), scale).await
        }
        CacheAction::Get { key, output } => get(config, CacheKey::new(key), &output).await,
        CacheAction::Clear => clear(dir).await,
        CacheAction::Stats => {
            let usage = disk_usage(dir)?;
            println!("Disk cache: {}", dir.display());
            println!("  Files: {}", usage.files);
            println!("  Size:  {}", format_size(usage.bytes));
            Ok(())
        }
        CacheAction::Path { key } => {
            println!("{}", entry_path(dir, &CacheKey::new(key)).display());
            Ok(())
        }
    }
}

/// Parse a `--scale` value, which must be a positive finite number.
fn parse_scale(value: &str) -> Result<f64, String> {
    let scale: f64 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if scale.is_finite() && scale > 0.0 {
        Ok(scale)
    } else {
        Err(format!("scale must be positive, got {}", value))
    }
}

/// Configured cache directory, failing when the disk tier is turned off.
fn cache_dir(config: &ConfigFile) -> Result<&Path, CliError> {
    if config.cache.disk_enabled {
        Ok(&config.cache.directory)
    } else {
        Err(CliError::DiskDisabled)
    }
}

fn entry_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir.join(key_to_filename(key))
}

async fn put(config: &ConfigFile, file: &Path, key: CacheKey, scale: f64) -> Result<(), CliError> {
    let bitmap = image::open(file)
        .map_err(|error| CliError::ImageRead {
            path: file.to_path_buf(),
            error,
        })?
        .to_rgba8();
    let image = CachedImage::new(bitmap, scale);

    let mut cache = ImageCache::start(config.cache_config(), None)?;
    cache.store_async(image.clone(), key.clone(), true).await;
    cache.shutdown().await;

    let stats = cache.stats().stats;
    if stats.encode_failures > 0 || stats.disk_write_failures > 0 {
        return Err(CliError::StoreFailed(key.to_string()));
    }

    info!(key = %key, file = %file.display(), "Stored image");
    println!(
        "Stored {}x{} @{}x as '{}'",
        image.pixel_width(),
        image.pixel_height(),
        image.scale(),
        key
    );
    if let Some(disk) = cache.disk_store() {
        println!("  {}", disk.path_for(&key).display());
    }
    Ok(())
}

async fn get(config: &ConfigFile, key: CacheKey, output: &Path) -> Result<(), CliError> {
    let mut cache = ImageCache::start(config.cache_config(), None)?;
    let found = cache.image_async(key.clone()).await;
    cache.shutdown().await;

    let image = found.ok_or_else(|| CliError::NotFound(key.to_string()))?;
    // JPEG has no alpha channel
    let saved = match ImageFormat::from_path(output) {
        Ok(ImageFormat::Jpeg) => DynamicImage::ImageRgba8(image.bitmap().clone())
            .to_rgb8()
            .save(output),
        _ => image.bitmap().save(output),
    };
    saved.map_err(|error| CliError::ImageWrite {
        path: output.to_path_buf(),
        error,
    })?;

    info!(key = %key, output = %output.display(), "Exported image");
    println!(
        "Wrote {}x{} to {}",
        image.pixel_width(),
        image.pixel_height(),
        output.display()
    );
    Ok(())
}

async fn clear(cache_dir: &Path) -> Result<(), CliError> {
    println!("Clearing disk cache at: {}", cache_dir.display());

    let before = disk_usage(cache_dir)?;
    let store = DiskStore::start(
        DiskStoreConfig {
            cache_dir: cache_dir.to_path_buf(),
        },
        &Handle::current(),
    )?;
    store.clear(None);
    store.shutdown().await;

    if store.stats().disk_clears == 0 {
        return Err(CliError::StoreFailed(cache_dir.display().to_string()));
    }

    println!(
        "Deleted {} files, freed {}",
        before.files,
        format_size(before.bytes)
    );
    Ok(())
}

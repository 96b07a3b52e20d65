//! Decoded image values held by the cache.
//!
//! A [`CachedImage`] is an RGBA bitmap plus the pixel density it is meant to
//! be displayed at. The disk tier persists images losslessly as PNG.

use crate::cache::types::CacheError;
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

/// A decoded bitmap and its density scale.
///
/// Cloning is cheap: the pixel buffer is shared.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedImage {
    bitmap: Arc<RgbaImage>,
    scale: f64,
}

impl CachedImage {
    /// Wrap a bitmap rendered at the given density scale.
    ///
    /// A scale that is not a positive finite number is treated as 1.0.
    pub fn new(bitmap: RgbaImage, scale: f64) -> Self {
        let scale = if scale.is_finite() && scale > 0.0 {
            scale
        } else {
            1.0
        };
        Self {
            bitmap: Arc::new(bitmap),
            scale,
        }
    }

    /// The underlying RGBA pixels.
    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }

    /// Density scale (physical pixels per logical unit).
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Width in physical pixels.
    pub fn pixel_width(&self) -> u32 {
        self.bitmap.width()
    }

    /// Height in physical pixels.
    pub fn pixel_height(&self) -> u32 {
        self.bitmap.height()
    }

    /// Logical size `(width, height)`, i.e. pixel size divided by scale.
    pub fn size(&self) -> (f64, f64) {
        (
            f64::from(self.bitmap.width()) / self.scale,
            f64::from(self.bitmap.height()) / self.scale,
        )
    }

    /// Eviction weight: `(width × scale) × (height × scale)`.
    ///
    /// This is the pixel area, independent of any encoded byte size.
    pub fn cost(&self) -> u64 {
        let (width, height) = self.size();
        ((width * self.scale) * (height * self.scale)).round() as u64
    }

    /// True when both images have identical dimensions and pixels,
    /// regardless of scale.
    pub fn same_pixels(&self, other: &CachedImage) -> bool {
        *self.bitmap == *other.bitmap
    }

    /// Encode losslessly as PNG for the disk tier.
    pub fn encode_png(&self) -> Result<Vec<u8>, CacheError> {
        if self.bitmap.width() == 0 || self.bitmap.height() == 0 {
            return Err(CacheError::Encode(format!(
                "image has no pixels ({}x{})",
                self.bitmap.width(),
                self.bitmap.height()
            )));
        }

        let mut bytes = Vec::new();
        self.bitmap
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| CacheError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    /// Decode persisted bytes into an image at the given display scale.
    pub fn decode(bytes: &[u8], scale: f64) -> Result<Self, CacheError> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| CacheError::Decode(e.to_string()))?;
        Ok(Self::new(decoded.to_rgba8(), scale))
    }
}

//! Image resizing for size variants.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageError, ImageFormat};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::models::SizeSpec;

/// Largest width or height a variant may request.
const MAX_DIMENSION: u32 = 4096;

/// Maximum input file size for image processing (50 MB).
const MAX_INPUT_SIZE: usize = 50 * 1024 * 1024;

/// Default number of resizes allowed to run at once.
pub const DEFAULT_MAX_CONCURRENT_RESIZES: usize = 4;

/// Produces the bytes of one size variant from the original image.
#[async_trait]
pub trait ImageResizer: Send + Sync {
    async fn resize(&self, original: &[u8], spec: &SizeSpec) -> Result<Vec<u8>>;
}

/// Resizer built on the `image` crate.
///
/// Variants fit inside `width` (or `maxWidth`) by `height` keeping the aspect
/// ratio and are never upscaled. Undecodable formats pass through as-is. A `quality` re-encodes as JPEG; otherwise
/// the original format is kept.
#[derive(Clone)]
pub struct ImageCrateResizer {
    /// Bounds concurrent CPU-bound work.
    permits: Arc<Semaphore>,
}

impl ImageCrateResizer {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }
}

impl Default for ImageCrateResizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT_RESIZES)
    }
}

#[async_trait]
impl ImageResizer for ImageCrateResizer {
    async fn resize(&self, original: &[u8], spec: &SizeSpec) -> Result<Vec<u8>> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| anyhow!("image resize semaphore closed"))?;

        let original = original.to_vec();
        let spec = spec.clone();
        tokio::task::spawn_blocking(move || resize_image(&original, &spec))
            .await
            .context("image resize task panicked")?
    }
}

impl std::fmt::Debug for ImageCrateResizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCrateResizer")
            .field("available_permits", &self.permits.available_permits())
            .finish()
    }
}

/// Resize `original` to fit `spec`. Synchronous and CPU-bound.
///
/// Without `width` or `maxWidth` only `height` bounds the variant. Bytes in a
/// format the `image` crate cannot decode (SVG, HEIC, ...) are returned
/// unchanged so the variant still exists.
pub fn resize_image(original: &[u8], spec: &SizeSpec) -> Result<Vec<u8>> {
    if original.len() > MAX_INPUT_SIZE {
        bail!(
            "image too large: {} bytes exceeds {MAX_INPUT_SIZE} byte limit",
            original.len()
        );
    }

    let Ok(format) = image::guess_format(original) else {
        warn!("unrecognized image format, storing variant unchanged");
        return Ok(original.to_vec());
    };
    let img = match image::load_from_memory_with_format(original, format) {
        Ok(img) => img,
        Err(ImageError::Unsupported(e)) => {
            warn!(?format, error = %e, "cannot decode image, storing variant unchanged");
            return Ok(original.to_vec());
        }
        Err(e) => return Err(e).context("failed to load image"),
    };

    let (bound_w, bound_h) = target_bounds(&img, spec.effective_width(), spec.height);
    let resized = if bound_w < img.width() || bound_h < img.height() {
        img.resize(bound_w, bound_h, FilterType::Lanczos3)
    } else {
        img
    };

    debug!(
        width = resized.width(),
        height = resized.height(),
        ?format,
        "image variant resized"
    );

    match spec.quality {
        Some(quality) => encode_jpeg(&resized, jpeg_quality(quality)),
        None => encode(&resized, format),
    }
}

/// Bounding box for the variant, clamped to the image and `MAX_DIMENSION`.
/// A missing or zero side is unbounded.
fn target_bounds(img: &DynamicImage, width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    let bound = |side: Option<u32>, actual: u32| {
        side.filter(|s| *s > 0)
            .unwrap_or(MAX_DIMENSION)
            .clamp(1, MAX_DIMENSION)
            .min(actual)
    };
    (bound(width, img.width()), bound(height, img.height()))
}

/// Map a `0.0..=1.0` quality to the JPEG `1..=100` scale.
fn jpeg_quality(quality: f64) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&DynamicImage::ImageRgb8(img.to_rgb8()))
        .context("failed to encode JPEG variant")?;
    Ok(buf)
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    if format == ImageFormat::Jpeg {
        return encode_jpeg(img, 90);
    }
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)
        .with_context(|| format!("failed to encode {format:?} variant"))?;
    Ok(buf.into_inner())
}

//! Working-resolution management for the matting path
//!
//! Matting cost grows faster than linearly with pixel count, so the image is
//! shrunk to a bounded working size first and the result is scaled back.
//! Every resize uses Lanczos3.

use crate::types::Mask;
use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};

const FILTER: FilterType = FilterType::Lanczos3;

/// Dimensions after fitting `(width, height)` inside a `base_size` square
///
/// Never upscales, keeps the aspect ratio and keeps each side at least 1.
#[must_use]
pub fn working_dimensions((width, height): (u32, u32), base_size: u32) -> (u32, u32) {
    if width <= base_size && height <= base_size {
        return (width, height);
    }
    let base = f64::from(base_size.max(1));
    let scale = (base / f64::from(width)).min(base / f64::from(height));
    let fit = |side: u32| ((f64::from(side) * scale).round() as u32).clamp(1, base_size.max(1));
    (fit(width), fit(height))
}

/// Shrink an image to the working resolution
#[must_use]
pub fn downsample(image: &RgbImage, base_size: u32) -> RgbImage {
    let (width, height) = working_dimensions(image.dimensions(), base_size);
    if (width, height) == image.dimensions() {
        return image.clone();
    }
    log::debug!(
        "Downsampling {:?} to {width}x{height} (base size {base_size})",
        image.dimensions()
    );
    imageops::resize(image, width, height, FILTER)
}

/// Resize a mask to the given dimensions
#[must_use]
pub fn resize_mask(mask: &Mask, (width, height): (u32, u32)) -> Mask {
    mask.resize(width, height)
}

/// Scale an RGBA cutout back to the original dimensions
#[must_use]
pub fn upsample(image: &RgbaImage, (width, height): (u32, u32)) -> RgbaImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FILTER)
}

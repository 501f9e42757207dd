//! Core types for cutout operations
//!
//! Grids that look alike are kept apart on purpose: a [`Mask`] is a soft 8-bit
//! likelihood, a [`Trimap`] only ever holds 0, 128 or 255, and the matting
//! stages work on normalized `f32` arrays. Conversions between them are the
//! explicit functions on each type.

use crate::error::{CutoutError, Result};
use image::{DynamicImage, GrayImage, ImageFormat, Rgba, RgbImage, RgbaImage};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;

/// Trimap value for pixels known to be background
pub const TRIMAP_BACKGROUND: u8 = 0;
/// Trimap value for pixels whose opacity is unknown
pub const TRIMAP_UNKNOWN: u8 = 128;
/// Trimap value for pixels known to be foreground
pub const TRIMAP_FOREGROUND: u8 = 255;

/// Soft segmentation mask, one 8-bit foreground likelihood per pixel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    image: GrayImage,
}

impl Mask {
    /// Wrap a grayscale image as a mask
    #[must_use]
    pub fn new(image: GrayImage) -> Self {
        Self { image }
    }

    /// Create a mask from raw row-major data
    ///
    /// # Errors
    /// - `data.len()` does not equal `width * height`
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let len = data.len();
        GrayImage::from_raw(width, height, data)
            .map(Self::new)
            .ok_or_else(|| {
                CutoutError::processing(format!(
                    "Mask data length {len} does not match dimensions {width}x{height}"
                ))
            })
    }

    /// Create a mask with every pixel set to `value`
    #[must_use]
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::new(GrayImage::from_pixel(width, height, image::Luma([value])))
    }

    /// Mask dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Value at (x, y)
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y)[0]
    }

    /// Borrow the underlying grayscale image
    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Take the underlying grayscale image
    #[must_use]
    pub fn into_image(self) -> GrayImage {
        self.image
    }

    /// Raw row-major values
    #[must_use]
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Resize the mask to new dimensions with Lanczos3 resampling
    #[must_use]
    pub fn resize(&self, new_width: u32, new_height: u32) -> Self {
        if self.dimensions() == (new_width, new_height) {
            return self.clone();
        }
        Self::new(image::imageops::resize(
            &self.image,
            new_width,
            new_height,
            image::imageops::FilterType::Lanczos3,
        ))
    }

    /// Get mask statistics
    #[must_use]
    pub fn statistics(&self) -> MaskStatistics {
        let total_pixels = self.image.as_raw().len();
        let foreground_pixels = self.image.as_raw().iter().filter(|&&x| x > 127).count();
        let background_pixels = total_pixels - foreground_pixels;
        let ratio = |count: usize| {
            if total_pixels == 0 {
                0.0
            } else {
                count as f32 / total_pixels as f32
            }
        };

        MaskStatistics {
            total_pixels,
            foreground_pixels,
            background_pixels,
            foreground_ratio: ratio(foreground_pixels),
            background_ratio: ratio(background_pixels),
        }
    }

    /// Save mask as PNG
    ///
    /// # Errors
    /// - File creation or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Statistics about a segmentation mask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaskStatistics {
    pub total_pixels: usize,
    pub foreground_pixels: usize,
    pub background_pixels: usize,
    pub foreground_ratio: f32,
    pub background_ratio: f32,
}

/// Three-class map: background (0), unknown (128), foreground (255)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trimap {
    image: GrayImage,
}

impl Trimap {
    /// Construct without checking values. Callers guarantee the value set.
    pub(crate) fn from_gray_unchecked(image: GrayImage) -> Self {
        Self { image }
    }

    /// Validate a grayscale image as a trimap
    ///
    /// # Errors
    /// - Any pixel holds a value other than 0, 128 or 255
    pub fn from_gray(image: GrayImage) -> Result<Self> {
        if let Some((x, y, pixel)) = image
            .enumerate_pixels()
            .find(|(_, _, p)| !matches!(p[0], TRIMAP_BACKGROUND | TRIMAP_UNKNOWN | TRIMAP_FOREGROUND))
        {
            return Err(CutoutError::invalid_trimap(format!(
                "value {} at ({x}, {y})",
                pixel[0]
            )));
        }
        Ok(Self { image })
    }

    /// Trimap dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    /// Value at (x, y)
    ///
    /// # Panics
    /// Panics if the coordinates are out of bounds.
    #[must_use]
    pub fn value(&self, x: u32, y: u32) -> u8 {
        self.image.get_pixel(x, y)[0]
    }

    #[must_use]
    pub fn as_image(&self) -> &GrayImage {
        &self.image
    }

    /// Count pixels per class
    #[must_use]
    pub fn statistics(&self) -> TrimapStatistics {
        let mut stats = TrimapStatistics::default();
        for &value in self.image.as_raw() {
            match value {
                TRIMAP_FOREGROUND => stats.foreground += 1,
                TRIMAP_BACKGROUND => stats.background += 1,
                _ => stats.unknown += 1,
            }
        }
        stats
    }
}

/// Pixel counts per trimap class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimapStatistics {
    pub foreground: usize,
    pub unknown: usize,
    pub background: usize,
}

/// RGB image as `f32` in [0, 1], shape (height, width, 3)
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedImage(Array3<f32>);

impl NormalizedImage {
    /// Wrap an array of shape (height, width, 3)
    ///
    /// # Errors
    /// - The last axis is not 3 channels wide
    pub fn new(data: Array3<f32>) -> Result<Self> {
        let channels = data.dim().2;
        if channels != 3 {
            return Err(CutoutError::processing(format!(
                "Normalized image must have 3 channels, got {channels}"
            )));
        }
        Ok(Self(data))
    }

    /// Divide every channel by 255
    #[must_use]
    pub fn from_rgb(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        let mut data = Array3::<f32>::zeros((height as usize, width as usize, 3));
        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                data[[y as usize, x as usize, c]] = f32::from(pixel[c]) / 255.0;
            }
        }
        Self(data)
    }

    /// Dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        let (height, width, _) = self.0.dim();
        (width as u32, height as u32)
    }

    #[must_use]
    pub fn as_array(&self) -> &Array3<f32> {
        &self.0
    }

    #[must_use]
    pub fn into_array(self) -> Array3<f32> {
        self.0
    }

    /// Stack with an alpha map into an 8-bit RGBA image
    ///
    /// Values are scaled by 255, clipped to [0, 255] and truncated.
    ///
    /// # Errors
    /// - Alpha map dimensions differ from the image
    pub fn stack_with_alpha(&self, alpha: &AlphaMap) -> Result<RgbaImage> {
        if self.dimensions() != alpha.dimensions() {
            return Err(CutoutError::matting(format!(
                "Foreground {:?} and alpha {:?} dimensions differ",
                self.dimensions(),
                alpha.dimensions()
            )));
        }
        let (width, height) = self.dimensions();
        let quantize = |v: f32| (v * 255.0).clamp(0.0, 255.0) as u8;
        let mut out = RgbaImage::new(width, height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let (row, col) = (y as usize, x as usize);
            *pixel = Rgba([
                quantize(self.0[[row, col, 0]]),
                quantize(self.0[[row, col, 1]]),
                quantize(self.0[[row, col, 2]]),
                quantize(alpha.0[[row, col]]),
            ]);
        }
        Ok(out)
    }
}

/// Trimap as `f32`: 0.0, 128/255 or 1.0
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTrimap(Array2<f32>);

impl NormalizedTrimap {
    #[must_use]
    pub fn from_trimap(trimap: &Trimap) -> Self {
        let (width, height) = trimap.dimensions();
        let data = Array2::from_shape_fn((height as usize, width as usize), |(row, col)| {
            f32::from(trimap.value(col as u32, row as u32)) / 255.0
        });
        Self(data)
    }

    /// Dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        let (height, width) = self.0.dim();
        (width as u32, height as u32)
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }

    /// True where the trimap marks known foreground
    #[must_use]
    pub fn is_foreground(value: f32) -> bool {
        value >= 1.0
    }

    /// True where the trimap marks known background
    #[must_use]
    pub fn is_background(value: f32) -> bool {
        value <= 0.0
    }
}

/// Per-pixel opacity in [0, 1], shape (height, width)
#[derive(Debug, Clone, PartialEq)]
pub struct AlphaMap(Array2<f32>);

impl AlphaMap {
    #[must_use]
    pub fn new(data: Array2<f32>) -> Self {
        Self(data)
    }

    /// Dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        let (height, width) = self.0.dim();
        (width as u32, height as u32)
    }

    #[must_use]
    pub fn as_array(&self) -> &Array2<f32> {
        &self.0
    }

    #[must_use]
    pub fn into_array(self) -> Array2<f32> {
        self.0
    }
}

/// RGBA cutout at the original input resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cutout {
    image: RgbaImage,
}

impl Cutout {
    #[must_use]
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Cutout dimensions (width, height)
    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }

    /// Encode as PNG with alpha
    ///
    /// # Errors
    /// - PNG encoding failures
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(self.image.clone())
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    /// Save as PNG
    ///
    /// # Errors
    /// - File creation or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.image.save_with_format(path, ImageFormat::Png)?;
        Ok(())
    }
}

/// Result of a single cutout operation
#[derive(Debug, Clone)]
pub struct CutoutResult {
    /// The cutout with background removed
    pub cutout: Cutout,

    /// Segmentation mask at the original resolution
    pub mask: Mask,

    /// Original image dimensions
    pub original_dimensions: (u32, u32),

    /// Whether alpha matting produced the cutout
    pub alpha_matted: bool,

    /// Model that produced the mask
    pub model_name: String,

    pub timings: ProcessingTimings,
}

impl CutoutResult {
    /// Encode the cutout as PNG, recording the encode time
    ///
    /// # Errors
    /// - PNG encoding failures
    pub fn to_png_bytes(&mut self) -> Result<Vec<u8>> {
        let start = instant::Instant::now();
        let bytes = self.cutout.to_png_bytes()?;
        let encode_ms = start.elapsed().as_millis() as u64;
        self.timings.image_encode_ms = Some(encode_ms);
        self.timings.total_ms += encode_ms;
        Ok(bytes)
    }

    /// Save the cutout as PNG
    ///
    /// # Errors
    /// - File creation or PNG encoding failures
    pub fn save_png<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.cutout.save_png(path)
    }

    /// Get a human-readable timing summary
    #[must_use]
    pub fn timing_summary(&self) -> String {
        let t = &self.timings;
        let mut summary = format!(
            "Total: {}ms | Decode: {}ms | Inference: {}ms | Compositing: {}ms",
            t.total_ms, t.image_decode_ms, t.inference_ms, t.compositing_ms
        );
        if let Some(encode) = t.image_encode_ms {
            summary.push_str(&format!(" | Encode: {encode}ms"));
        }
        summary
    }
}

/// Timing breakdown for one cutout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Model resolution through the registry (includes first load)
    pub model_load_ms: u64,

    /// Decoding input bytes
    pub image_decode_ms: u64,

    /// Segmentation inference
    pub inference_ms: u64,

    /// Naive or matting compositing
    pub compositing_ms: u64,

    /// Final PNG encoding, when requested
    pub image_encode_ms: Option<u64>,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    /// Fraction of the total spent in inference
    #[must_use]
    pub fn inference_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.inference_ms as f64 / self.total_ms as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_mask_from_raw_length_mismatch() {
        assert!(Mask::from_raw(2, 2, vec![0; 3]).is_err());
        let mask = Mask::from_raw(2, 2, vec![0, 64, 128, 255]).unwrap();
        assert_eq!(mask.dimensions(), (2, 2));
        assert_eq!(mask.value(1, 1), 255);
    }

    #[test]
    fn test_mask_statistics() {
        let mask = Mask::from_raw(2, 2, vec![0, 100, 200, 255]).unwrap();
        let stats = mask.statistics();
        assert_eq!(stats.total_pixels, 4);
        assert_eq!(stats.foreground_pixels, 2);
        assert!((stats.foreground_ratio - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_trimap_validation() {
        let good = GrayImage::from_raw(3, 1, vec![0, 128, 255]).unwrap();
        let trimap = Trimap::from_gray(good).unwrap();
        assert_eq!(
            trimap.statistics(),
            TrimapStatistics {
                foreground: 1,
                unknown: 1,
                background: 1
            }
        );

        let bad = GrayImage::from_raw(2, 1, vec![0, 127]).unwrap();
        let err = Trimap::from_gray(bad).unwrap_err();
        assert!(matches!(err, CutoutError::InvalidTrimap(_)));
    }

    #[test]
    fn test_normalized_trimap_levels() {
        let trimap = Trimap::from_gray(GrayImage::from_raw(3, 1, vec![0, 128, 255]).unwrap())
            .unwrap();
        let normalized = NormalizedTrimap::from_trimap(&trimap);
        let values = normalized.as_array();
        assert!(NormalizedTrimap::is_background(values[[0, 0]]));
        assert!((values[[0, 1]] - 128.0 / 255.0).abs() < 1e-6);
        assert!(NormalizedTrimap::is_foreground(values[[0, 2]]));
    }

    #[test]
    fn test_stack_with_alpha_clips_and_quantizes() {
        let mut rgb = Array3::<f32>::zeros((1, 2, 3));
        rgb[[0, 0, 0]] = 1.5;
        rgb[[0, 1, 2]] = -0.2;
        let image = NormalizedImage::new(rgb).unwrap();
        let alpha = AlphaMap::new(Array2::from_elem((1, 2), 0.5));

        let rgba = image.stack_with_alpha(&alpha).unwrap();
        assert_eq!(rgba.get_pixel(0, 0)[0], 255);
        assert_eq!(rgba.get_pixel(1, 0)[2], 0);
        assert_eq!(rgba.get_pixel(0, 0)[3], 127);
    }

    #[test]
    fn test_stack_with_alpha_truncates() {
        let image = NormalizedImage::new(Array3::from_elem((1, 1, 3), 0.999)).unwrap();
        let alpha = AlphaMap::new(Array2::from_elem((1, 1), 0.999));

        let rgba = image.stack_with_alpha(&alpha).unwrap();
        assert_eq!(rgba.get_pixel(0, 0).0, [254, 254, 254, 254]);
    }

    #[test]
    fn test_stack_with_alpha_keeps_byte_levels() {
        let levels: Vec<f32> = (0..=255_u8).map(|v| f32::from(v) / 255.0).collect();
        let image = NormalizedImage::new(
            Array3::from_shape_fn((1, 256, 3), |(_, col, _)| levels[col]),
        )
        .unwrap();
        let alpha = AlphaMap::new(Array2::from_shape_fn((1, 256), |(_, col)| levels[col]));

        let rgba = image.stack_with_alpha(&alpha).unwrap();
        for (x, pixel) in rgba.enumerate_pixels().map(|(x, _, p)| (x, p)) {
            let v = x as u8;
            assert_eq!(pixel.0, [v, v, v, v]);
        }
    }

    #[test]
    fn test_stack_with_alpha_dimension_mismatch() {
        let image = NormalizedImage::new(Array3::zeros((2, 2, 3))).unwrap();
        let alpha = AlphaMap::new(Array2::zeros((3, 2)));
        assert!(matches!(
            image.stack_with_alpha(&alpha),
            Err(CutoutError::Matting(_))
        ));
    }

    #[test]
    fn test_normalized_image_rejects_wrong_channels() {
        assert!(NormalizedImage::new(Array3::zeros((2, 2, 4))).is_err());
    }

    #[test]
    fn test_cutout_png_roundtrip_dimensions() {
        let cutout = Cutout::new(RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 40])));
        let bytes = cutout.to_png_bytes().unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0), &Rgba([10, 20, 30, 40]));
    }
}

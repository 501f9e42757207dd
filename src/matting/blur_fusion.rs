//! Blur-Fusion foreground color estimation
//!
//! Approximates multi-level foreground estimation with weighted box filters
//! (Forte & Pitié, "Approximate Fast Foreground Colour Estimation", ICIP 2021):
//!
//! ```text
//! F̂ = Σ(F·α) / Σα
//! B̂ = Σ(B·(1-α)) / Σ(1-α)
//! F = F̂ + α(I - αF̂ - (1-α)B̂)
//! ```
//!
//! The background estimate stays the input image across passes; only the
//! foreground is refined.

use super::{box_mean, ensure_same_dimensions, ForegroundEstimator};
use crate::error::{CutoutError, Result};
use crate::types::{AlphaMap, NormalizedImage};
use ndarray::{Array3, Axis, Zip};

const WEIGHT_EPSILON: f32 = 1e-5;

/// Foreground estimator using one box-filter pass per radius
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlurFusionForeground {
    /// Window half-widths, one pass each, applied in order
    pub radii: Vec<usize>,
}

impl Default for BlurFusionForeground {
    /// Two passes with 91 and 7 pixel windows
    fn default() -> Self {
        Self { radii: vec![45, 3] }
    }
}

impl BlurFusionForeground {
    /// # Errors
    /// - Empty radius list
    pub fn new(radii: Vec<usize>) -> Result<Self> {
        if radii.is_empty() {
            return Err(CutoutError::invalid_config(
                "Blur-Fusion needs at least one radius",
            ));
        }
        Ok(Self { radii })
    }
}

impl ForegroundEstimator for BlurFusionForeground {
    fn estimate_foreground(&self, image: &NormalizedImage, alpha: &AlphaMap) -> Result<NormalizedImage> {
        ensure_same_dimensions("Alpha", image.dimensions(), alpha.dimensions())?;

        let input = image.as_array();
        let alpha = alpha.as_array();
        let beta = alpha.mapv(|a| 1.0 - a);
        let mut foreground = input.clone();

        for &radius in &self.radii {
            let alpha_sum = box_mean(alpha.view(), radius);
            let beta_sum = box_mean(beta.view(), radius);
            let mut next = Array3::<f32>::zeros(input.dim());

            for channel in 0..3 {
                let image_c = input.index_axis(Axis(2), channel);
                let fg_c = foreground.index_axis(Axis(2), channel);

                let fg_hat = box_mean((&fg_c * alpha).view(), radius);
                let bg_hat = box_mean((&image_c * &beta).view(), radius);
                let fg_hat = &fg_hat / &alpha_sum.mapv(|s| s + WEIGHT_EPSILON);
                let bg_hat = &bg_hat / &beta_sum.mapv(|s| s + WEIGHT_EPSILON);

                Zip::from(next.index_axis_mut(Axis(2), channel))
                    .and(&image_c)
                    .and(alpha)
                    .and(&fg_hat)
                    .and(&bg_hat)
                    .for_each(|out, &i, &a, &f, &b| {
                        *out = (f + a * (i - a * f - (1.0 - a) * b)).clamp(0.0, 1.0);
                    });
            }
            foreground = next;
        }

        NormalizedImage::new(foreground)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;
    use ndarray::Array2;

    fn noisy_image(width: u32, height: u32) -> NormalizedImage {
        NormalizedImage::from_rgb(&RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 13 % 256) as u8, (y * 29 % 256) as u8, ((x + y) * 7 % 256) as u8])
        }))
    }

    #[test]
    fn test_opaque_alpha_returns_input_colors() {
        let image = noisy_image(16, 12);
        let alpha = AlphaMap::new(Array2::from_elem((12, 16), 1.0));
        let fg = BlurFusionForeground::default()
            .estimate_foreground(&image, &alpha)
            .unwrap();
        for (a, b) in fg.as_array().iter().zip(image.as_array().iter()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_transparent_alpha_is_finite() {
        let image = noisy_image(8, 8);
        let alpha = AlphaMap::new(Array2::zeros((8, 8)));
        let fg = BlurFusionForeground::new(vec![2]).unwrap()
            .estimate_foreground(&image, &alpha)
            .unwrap();
        assert!(fg.as_array().iter().all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_edge_colors_pull_toward_foreground() {
        // Red subject on a blue background with a half-transparent seam
        let width = 12;
        let rgb = RgbImage::from_fn(width, 4, |x, _| match x {
            0..=4 => image::Rgb([255, 0, 0]),
            5 => image::Rgb([128, 0, 127]),
            _ => image::Rgb([0, 0, 255]),
        });
        let alpha = Array2::from_shape_fn((4, width as usize), |(_, c)| match c {
            0..=4 => 1.0,
            5 => 0.5,
            _ => 0.0,
        });
        let fg = BlurFusionForeground::new(vec![3]).unwrap()
            .estimate_foreground(&NormalizedImage::from_rgb(&rgb), &AlphaMap::new(alpha))
            .unwrap();
        let seam = fg.as_array();
        assert!(seam[[1, 5, 0]] > seam[[1, 5, 2]]);
    }

    #[test]
    fn test_empty_radii_rejected() {
        assert!(BlurFusionForeground::new(Vec::new()).is_err());
    }
}

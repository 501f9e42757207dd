//! Guided-filter alpha estimation
//!
//! Fits `alpha ≈ a * I + b` over every window, with `I` the luminance of the
//! image and the trimap as the filtered input, then averages the
//! coefficients (He et al., "Guided Image Filtering"). Unknown pixels take
//! the locally affine prediction from their known neighbours. Known pixels
//! are pinned back to 0 or 1 afterwards.

use super::{box_mean, ensure_same_dimensions, AlphaEstimator};
use crate::error::Result;
use crate::types::{AlphaMap, NormalizedImage, NormalizedTrimap};
use ndarray::{Array2, Zip};

/// Alpha estimator based on a luminance-guided filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GuidedFilterAlpha {
    /// Window half-width; windows are `2 * radius + 1` pixels wide
    pub radius: usize,
    /// Regularization; larger values smooth across edges
    pub epsilon: f32,
}

impl Default for GuidedFilterAlpha {
    fn default() -> Self {
        Self {
            radius: 10,
            epsilon: 1e-4,
        }
    }
}

impl GuidedFilterAlpha {
    #[must_use]
    pub fn new(radius: usize, epsilon: f32) -> Self {
        Self { radius, epsilon }
    }
}

impl AlphaEstimator for GuidedFilterAlpha {
    fn estimate_alpha(&self, image: &NormalizedImage, trimap: &NormalizedTrimap) -> Result<AlphaMap> {
        ensure_same_dimensions("Trimap", image.dimensions(), trimap.dimensions())?;

        let rgb = image.as_array();
        let (height, width, _) = rgb.dim();
        let guide = Array2::from_shape_fn((height, width), |(r, c)| {
            0.299 * rgb[[r, c, 0]] + 0.587 * rgb[[r, c, 1]] + 0.114 * rgb[[r, c, 2]]
        });
        let input = trimap.as_array();

        let mean_i = box_mean(guide.view(), self.radius);
        let mean_p = box_mean(input.view(), self.radius);
        let corr_ip = box_mean((&guide * input).view(), self.radius);
        let corr_ii = box_mean((&guide * &guide).view(), self.radius);

        let mut a = Array2::<f32>::zeros((height, width));
        let mut b = Array2::<f32>::zeros((height, width));
        Zip::from(&mut a)
            .and(&mut b)
            .and(&mean_i)
            .and(&mean_p)
            .and(&corr_ip)
            .and(&corr_ii)
            .for_each(|a, b, &mi, &mp, &cip, &cii| {
                let variance = (cii - mi * mi).max(0.0);
                let covariance = cip - mi * mp;
                *a = covariance / (variance + self.epsilon);
                *b = mp - *a * mi;
            });

        let mean_a = box_mean(a.view(), self.radius);
        let mean_b = box_mean(b.view(), self.radius);

        let mut alpha = Array2::<f32>::zeros((height, width));
        Zip::from(&mut alpha)
            .and(&mean_a)
            .and(&mean_b)
            .and(&guide)
            .and(input)
            .for_each(|alpha, &ma, &mb, &g, &t| {
                *alpha = if NormalizedTrimap::is_foreground(t) {
                    1.0
                } else if NormalizedTrimap::is_background(t) {
                    0.0
                } else {
                    (ma * g + mb).clamp(0.0, 1.0)
                };
            });

        Ok(AlphaMap::new(alpha))
    }
}

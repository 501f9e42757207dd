//! Alpha and foreground estimation for the matting path
//!
//! The compositor only depends on the two traits below. Default
//! implementations are a guided-filter alpha estimator and Blur-Fusion
//! foreground estimation; other solvers can be injected through
//! [`crate::CutoutProcessor::with_estimators`].

mod blur_fusion;
mod guided_filter;

pub use blur_fusion::BlurFusionForeground;
pub use guided_filter::GuidedFilterAlpha;

use crate::error::{CutoutError, Result};
use crate::types::{AlphaMap, NormalizedImage, NormalizedTrimap};
use ndarray::{Array2, ArrayView2, Axis};

/// Solves per-pixel opacity from an image and a trimap
///
/// Implementations return a map with the image's resolution and values in
/// [0, 1], keeping trimap foreground at 1.0 and background at 0.0.
pub trait AlphaEstimator: Send + Sync {
    /// # Errors
    /// - Mismatched input dimensions
    /// - Solver failures
    fn estimate_alpha(&self, image: &NormalizedImage, trimap: &NormalizedTrimap)
        -> Result<AlphaMap>;
}

/// Recovers clean foreground colors given the opacity
pub trait ForegroundEstimator: Send + Sync {
    /// # Errors
    /// - Mismatched input dimensions
    /// - Estimation failures
    fn estimate_foreground(&self, image: &NormalizedImage, alpha: &AlphaMap)
        -> Result<NormalizedImage>;
}

pub(crate) fn ensure_same_dimensions(
    what: &str,
    expected: (u32, u32),
    actual: (u32, u32),
) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(CutoutError::matting(format!(
            "{what} dimensions {actual:?} do not match image dimensions {expected:?}"
        )))
    }
}

/// Mean over a `(2r + 1)` square window, clipped at the borders
pub(crate) fn box_mean(data: ArrayView2<'_, f32>, radius: usize) -> Array2<f32> {
    let sums = box_sum_axis(box_sum_axis(data, Axis(1), radius).view(), Axis(0), radius);
    let (height, width) = data.dim();
    let span = |i: usize, len: usize| (i + radius).min(len - 1) - i.saturating_sub(radius) + 1;
    Array2::from_shape_fn((height, width), |(row, col)| {
        sums[[row, col]] / (span(row, height) * span(col, width)) as f32
    })
}

fn box_sum_axis(data: ArrayView2<'_, f32>, axis: Axis, radius: usize) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros(data.dim());
    for (input, mut output) in data.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let len = input.len();
        let mut prefix = Vec::with_capacity(len + 1);
        prefix.push(0.0f64);
        let mut acc = 0.0f64;
        for &value in input {
            acc += f64::from(value);
            prefix.push(acc);
        }
        for (i, slot) in output.iter_mut().enumerate() {
            let start = i.saturating_sub(radius);
            let end = (i + radius).min(len - 1);
            *slot = (prefix[end + 1] - prefix[start]) as f32;
        }
    }
    out
}

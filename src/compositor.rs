//! Cutout compositing
//!
//! Both strategies combine RGB with an opacity channel into RGBA at the
//! original resolution. The naive path uses the resized mask directly; the
//! matting path solves alpha and foreground at a bounded working size.

use crate::config::AlphaMattingConfig;
use crate::error::Result;
use crate::matting::{ensure_same_dimensions, AlphaEstimator, ForegroundEstimator};
use crate::scale;
use crate::trimap::build_trimap;
use crate::types::{Cutout, Mask, NormalizedImage, NormalizedTrimap};
use image::{Rgba, RgbImage, RgbaImage};
use tracing::{span, Level};

/// Composite with the mask as the 8-bit alpha channel
///
/// The mask is resized to the image with Lanczos3 and not normalized. RGB is
/// copied unmodified; pixels with zero opacity become `[0, 0, 0, 0]`.
#[must_use]
pub fn naive_cutout(image: &RgbImage, mask: &Mask) -> Cutout {
    let (width, height) = image.dimensions();
    let mask = scale::resize_mask(mask, (width, height));

    let mut result = RgbaImage::new(width, height);
    for ((x, y, pixel), &alpha) in image.enumerate_pixels().zip(mask.as_raw()) {
        let value = if alpha > 0 {
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        } else {
            Rgba([0, 0, 0, 0])
        };
        result.put_pixel(x, y, value);
    }

    Cutout::new(result)
}

/// Composite through trimap construction and alpha matting
///
/// Works at the resolution given by `params.base_size` and returns a cutout
/// with the image's original dimensions. Estimator errors propagate as-is.
///
/// # Errors
/// - Invalid matting parameters
/// - Estimator failures, or estimator output with the wrong resolution
pub fn alpha_matting_cutout(
    image: &RgbImage,
    mask: &Mask,
    params: &AlphaMattingConfig,
    alpha_estimator: &dyn AlphaEstimator,
    foreground_estimator: &dyn ForegroundEstimator,
) -> Result<Cutout> {
    params.validate()?;
    let original_dimensions = image.dimensions();

    let working = scale::downsample(image, params.base_size);
    let working_dimensions = working.dimensions();
    let mask = scale::resize_mask(mask, working_dimensions);

    let trimap = {
        let _span = span!(
            Level::DEBUG,
            "trimap",
            width = working_dimensions.0,
            height = working_dimensions.1,
            erode = params.erode_structure_size
        )
        .entered();
        build_trimap(
            &mask,
            params.foreground_threshold,
            params.background_threshold,
            params.erode_structure_size,
        )
    };

    let normalized_image = NormalizedImage::from_rgb(&working);
    let normalized_trimap = NormalizedTrimap::from_trimap(&trimap);

    let (alpha, foreground) = {
        let _span = span!(Level::DEBUG, "matting").entered();
        let alpha = alpha_estimator.estimate_alpha(&normalized_image, &normalized_trimap)?;
        ensure_same_dimensions("Alpha", working_dimensions, alpha.dimensions())?;

        let foreground = foreground_estimator.estimate_foreground(&normalized_image, &alpha)?;
        ensure_same_dimensions("Foreground", working_dimensions, foreground.dimensions())?;
        (alpha, foreground)
    };

    let cutout = foreground.stack_with_alpha(&alpha)?;
    Ok(Cutout::new(scale::upsample(&cutout, original_dimensions)))
}

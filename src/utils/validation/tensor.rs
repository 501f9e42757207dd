//! Tensor validation utilities
//!
//! Checks for model input images and raw segmentation outputs before they are
//! turned into masks.

use crate::error::{CutoutError, Result};
use ndarray::Array4;

/// Validator for tensor shapes and values
pub struct TensorValidator;

impl TensorValidator {
    /// Largest accepted side of a model input image
    pub const MAX_DIMENSION: u32 = 16384;

    /// Validate tensor shape matches expected dimensions
    ///
    /// # Errors
    /// - Shape differs from `expected_shape`
    pub fn validate_tensor_shape(
        tensor: &Array4<f32>,
        expected_shape: (usize, usize, usize, usize),
    ) -> Result<()> {
        let actual = tensor.dim();
        if actual != expected_shape {
            let (batch, channels, height, width) = expected_shape;
            return Err(CutoutError::processing(format!(
                "Tensor shape mismatch. Expected [{}, {}, {}, {}], got [{}, {}, {}, {}]",
                batch, channels, height, width, actual.0, actual.1, actual.2, actual.3
            )));
        }
        Ok(())
    }

    /// Validate a raw segmentation output before reading channel 0
    ///
    /// # Errors
    /// - Empty batch, channel or spatial axes
    /// - Non-finite values
    pub fn validate_segmentation_output(tensor: &Array4<f32>) -> Result<()> {
        let (batch, channels, height, width) = tensor.dim();
        if batch == 0 || channels == 0 {
            return Err(CutoutError::inference(format!(
                "Segmentation output has an empty batch or channel axis: {:?}",
                tensor.shape()
            )));
        }
        if height == 0 || width == 0 {
            return Err(CutoutError::inference(format!(
                "Segmentation output has no pixels: {:?}",
                tensor.shape()
            )));
        }
        if tensor.iter().any(|value| !value.is_finite()) {
            return Err(CutoutError::inference(
                "Segmentation output contains non-finite values (NaN or infinity)",
            ));
        }
        Ok(())
    }

    /// Validate image dimensions are within reasonable bounds
    ///
    /// # Errors
    /// - Zero-sized or oversized images
    pub fn validate_image_dimensions(width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(CutoutError::processing(format!(
                "Image dimensions too small: {}x{}. Minimum: 1x1",
                width, height
            )));
        }
        if width > Self::MAX_DIMENSION || height > Self::MAX_DIMENSION {
            return Err(CutoutError::processing(format!(
                "Image dimensions too large: {}x{}. Maximum: {}x{}",
                width,
                height,
                Self::MAX_DIMENSION,
                Self::MAX_DIMENSION
            )));
        }
        Ok(())
    }
}

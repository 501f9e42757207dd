//! U²-Net input and output conversion
//!
//! Inputs are resized to the model resolution without preserving the aspect
//! ratio, scaled by the image maximum and normalized with the ImageNet
//! statistics. Outputs are min-max normalized into an 8-bit mask.

use crate::{
    error::{CutoutError, Result},
    models::{ModelKind, PreprocessingConfig},
    types::Mask,
    utils::validation::TensorValidator,
};
use image::{imageops::FilterType, GrayImage, RgbImage};
use ndarray::{s, Array4};

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Input tensor for `kind`, checked against the model's declared input shape
    ///
    /// # Errors
    /// - Any [`Self::preprocess_for_inference`] failure
    /// - Tensor shape differing from [`ModelKind::info`]
    pub fn preprocess_for_model(image: &RgbImage, kind: ModelKind) -> Result<Array4<f32>> {
        let tensor = Self::preprocess_for_inference(image, &kind.preprocessing_config())?;
        TensorValidator::validate_tensor_shape(&tensor, kind.info().input_shape)?;
        Ok(tensor)
    }

    /// Convert an RGB image into a `[1, 3, H, W]` input tensor
    ///
    /// # Errors
    /// - Empty or oversized input image
    /// - Target size that does not fit in memory indices
    pub fn preprocess_for_inference(
        image: &RgbImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        TensorValidator::validate_image_dimensions(image.width(), image.height())?;
        let [target_width, target_height] = preprocessing_config.target_size;

        let resized =
            image::imageops::resize(image, target_width, target_height, FilterType::Lanczos3);

        let max_value = resized.as_raw().iter().copied().max().unwrap_or(0);
        let scale = if max_value > 0 {
            f32::from(max_value)
        } else {
            1.0
        };

        let width = usize::try_from(target_width).map_err(|_| {
            CutoutError::processing("Target width too large for tensor allocation")
        })?;
        let height = usize::try_from(target_height).map_err(|_| {
            CutoutError::processing("Target height too large for tensor allocation")
        })?;

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;
        let mut tensor = Array4::<f32>::zeros((1, 3, height, width));
        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions match the resized image
        for (x, y, pixel) in resized.enumerate_pixels() {
            for channel in 0..3 {
                let value = f32::from(pixel[channel]) / scale;
                tensor[[0, channel, y as usize, x as usize]] =
                    (value - mean[channel]) / std[channel];
            }
        }

        Ok(tensor)
    }

    /// Turn the first channel of a raw model output into a mask
    ///
    /// Values are min-max normalized before scaling to 0..=255. A constant
    /// output has no range and maps to an all-zero mask.
    ///
    /// # Errors
    /// - Empty or non-finite output tensor
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn mask_from_output(output: &Array4<f32>) -> Result<Mask> {
        TensorValidator::validate_segmentation_output(output)?;

        let prediction = output.slice(s![0, 0, .., ..]);
        let (height, width) = prediction.dim();

        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let range = max - min;

        let data = prediction
            .iter()
            .map(|&v| {
                if range > 0.0 {
                    ((v - min) / range * 255.0).clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
            .collect::<Vec<u8>>();

        let width = u32::try_from(width)
            .map_err(|_| CutoutError::inference("Segmentation output too wide"))?;
        let height = u32::try_from(height)
            .map_err(|_| CutoutError::inference("Segmentation output too tall"))?;
        GrayImage::from_raw(width, height, data)
            .map(Mask::new)
            .ok_or_else(|| CutoutError::internal("Mask buffer does not match output shape"))
    }
}

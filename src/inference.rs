//! Segmentation model abstraction

use crate::error::Result;
use crate::models::ModelKind;
use crate::types::Mask;
use image::RgbImage;
use std::sync::Arc;

/// Shared, load-once handle to a segmentation model
pub type ModelHandle = Arc<dyn SegmentationModel>;

/// A predictor producing soft foreground masks
///
/// Masks are returned at the model's native resolution; callers resize them
/// to the source image.
pub trait SegmentationModel: Send + Sync {
    /// Model kind this predictor was loaded for
    fn kind(&self) -> ModelKind;

    /// Predict a mask for one image
    ///
    /// # Errors
    /// - Tensor conversion failures
    /// - Backend inference failures
    fn predict(&self, image: &RgbImage) -> Result<Mask>;

    /// Predict masks for a batch, one per input and in input order
    ///
    /// # Errors
    /// - Any per-image prediction failure
    fn predict_batch(&self, images: &[RgbImage]) -> Result<Vec<Mask>> {
        images.iter().map(|image| self.predict(image)).collect()
    }
}

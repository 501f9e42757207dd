//! Tract segmentation backend
//!
//! Pure Rust inference with no native runtime. The optimized plan is
//! immutable once built and can serve concurrent predictions without locking.

use crate::error::{CutoutError, Result};
use crate::inference::SegmentationModel;
use crate::models::ModelKind;
use crate::types::Mask;
use crate::utils::ImagePreprocessor;
use image::RgbImage;
use instant::Instant;
use log;
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// U²-Net model compiled into a Tract runnable plan
#[derive(Debug)]
pub struct TractSegmentationModel {
    kind: ModelKind,
    model: TractModel,
}

impl TractSegmentationModel {
    /// List all Tract execution providers with availability status and descriptions
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 Tract Backend System Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);

        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Parse, optimize and plan ONNX weights
    ///
    /// The input fact is pinned to the model resolution so the plan is fully
    /// typed before optimization.
    ///
    /// # Errors
    /// - Weights that Tract cannot parse or optimize
    pub fn from_bytes(kind: ModelKind, weights: Vec<u8>) -> Result<Self> {
        let load_start = Instant::now();
        let preprocessing = kind.preprocessing_config();
        let [width, height] = preprocessing.target_size;

        log::info!("🚀 Initializing Tract backend for {kind}");
        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(weights))
            .map_err(|e| CutoutError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(
                0,
                f32::fact([1, 3, height as usize, width as usize]).into(),
            )
            .map_err(|e| CutoutError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| CutoutError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| CutoutError::model(format!("Failed to create runnable model: {e}")))?;

        log::info!(
            "✅ Tract backend initialized in {:.2}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            kind,
            model,
        })
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = self
            .model
            .run(tvec![input_tensor.into()])
            .map_err(|e| CutoutError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| CutoutError::inference("No output tensor found"))?
            .into_arc_tensor();
        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            CutoutError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let [batch, channels, height, width] = output_data.shape()[..] else {
            return Err(CutoutError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_data.ndim()
            )));
        };
        let output = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_data.to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| CutoutError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "✅ Tract inference completed in {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(output)
    }
}

impl SegmentationModel for TractSegmentationModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict(&self, image: &RgbImage) -> Result<Mask> {
        let input = ImagePreprocessor::preprocess_for_model(image, self.kind)?;
        let output = self.infer(&input)?;
        ImagePreprocessor::mask_from_output(&output)
    }
}

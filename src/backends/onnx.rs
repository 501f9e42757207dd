//! ONNX Runtime segmentation backend
//!
//! Runs U²-Net weights through an `ort` session with CPU, CUDA or CoreML
//! execution providers. `Session::run` needs exclusive access, so the session
//! sits behind a mutex and concurrent predictions on one handle serialize.

use crate::config::{ExecutionProvider, InferenceConfig};
use crate::error::{CutoutError, Result};
use crate::inference::SegmentationModel;
use crate::models::ModelKind;
use crate::types::Mask;
use crate::utils::ImagePreprocessor;
use image::RgbImage;
use instant::Instant;
use log;
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::{self, value::Value};
use std::sync::Mutex;

/// U²-Net model backed by an ONNX Runtime session
#[derive(Debug)]
pub struct OnnxSegmentationModel {
    kind: ModelKind,
    session: Mutex<Session>,
}

impl OnnxSegmentationModel {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// Returns `(name, available, description)` tuples.
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::backends::OnnxSegmentationModel;
    ///
    /// for (name, available, description) in OnnxSegmentationModel::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "✅" } else { "❌" }, description);
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 System Hardware Analysis:");
        log::debug!("  - Platform: {os}", os = std::env::consts::OS);
        log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);

        let cuda_available =
            OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
        let coreml_available =
            OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default())
                .unwrap_or(false);
        log::debug!("  - CUDA available: {cuda_available}");
        log::debug!("  - CoreML available: {coreml_available}");

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available,
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available,
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    /// Build a session from in-memory ONNX weights
    ///
    /// # Errors
    /// - Session construction or provider registration failures
    /// - Weights that ONNX Runtime cannot parse
    pub fn from_bytes(kind: ModelKind, weights: &[u8], config: &InferenceConfig) -> Result<Self> {
        let load_start = Instant::now();

        let session_builder = Session::builder()
            .map_err(|e| CutoutError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| CutoutError::model(format!("Failed to set optimization level: {e}")))?;
        let session_builder = configure_providers(session_builder, config.execution_provider)?;

        let intra_threads = config.resolved_intra_threads();
        let inter_threads = config.resolved_inter_threads();
        let session = session_builder
            .with_parallel_execution(true)
            .map_err(|e| CutoutError::model(format!("Failed to enable parallel execution: {e}")))?
            .with_intra_threads(intra_threads)
            .map_err(|e| CutoutError::model(format!("Failed to set intra threads: {e}")))?
            .with_inter_threads(inter_threads)
            .map_err(|e| CutoutError::model(format!("Failed to set inter threads: {e}")))?
            .commit_from_memory(weights)
            .map_err(|e| {
                CutoutError::model(format!("Failed to create session for {kind}: {e}"))
            })?;

        log::debug!("✅ ONNX Runtime session created for {kind}");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!(
            "  - Threading: {intra_threads} intra-op threads, {inter_threads} inter-op threads"
        );
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            load_start.elapsed().as_secs_f64() * 1000.0
        );

        Ok(Self {
            kind,
            session: Mutex::new(session),
        })
    }

    fn infer(&self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            CutoutError::inference(format!("Failed to convert input tensor: {e}"))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| CutoutError::internal("ONNX session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| CutoutError::inference(format!("ONNX inference failed: {e}")))?;

        // U²-Net exposes several side outputs; the fused map comes first
        let keys: Vec<_> = outputs.keys().collect();
        let first_key = keys
            .first()
            .ok_or_else(|| CutoutError::inference("No output tensors found"))?;
        let output_tensor = outputs
            .get(first_key)
            .ok_or_else(|| CutoutError::inference("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| CutoutError::inference(format!("Failed to extract output tensor: {e}")))?;

        let output_shape = output_tensor.shape().to_vec();
        let [batch, channels, height, width] = output_shape[..] else {
            return Err(CutoutError::inference(format!(
                "Expected 4D output tensor, got {}D",
                output_shape.len()
            )));
        };
        let output = Array4::from_shape_vec(
            (batch, channels, height, width),
            output_tensor.view().to_owned().into_raw_vec_and_offset().0,
        )
        .map_err(|e| CutoutError::inference(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "⚡ Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
        );
        Ok(output)
    }
}

fn configure_providers(
    session_builder: SessionBuilder,
    provider: ExecutionProvider,
) -> Result<SessionBuilder> {
    let cuda_available =
        || OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
    let coreml_available = || {
        OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
    };

    match provider {
        ExecutionProvider::Auto => {
            // CUDA > CoreML > CPU
            let mut providers = Vec::new();
            if cuda_available() {
                log::info!("🚀 CUDA execution provider is available and will be used");
                providers.push(CUDAExecutionProvider::default().build());
            }
            if coreml_available() {
                log::info!("🍎 CoreML execution provider is available and will be used");
                providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
            }

            if providers.is_empty() {
                log::warn!("⚠️ No hardware acceleration available, falling back to CPU");
                Ok(session_builder)
            } else {
                log::info!(
                    "✅ Hardware acceleration enabled with {count} provider(s)",
                    count = providers.len()
                );
                session_builder.with_execution_providers(providers).map_err(|e| {
                    CutoutError::model(format!("Failed to set auto execution providers: {e}"))
                })
            }
        },
        ExecutionProvider::Cpu => {
            log::info!("Using CPU execution provider");
            Ok(session_builder)
        },
        ExecutionProvider::Cuda => {
            if cuda_available() {
                log::info!("Using CUDA execution provider");
                session_builder
                    .with_execution_providers([CUDAExecutionProvider::default().build()])
                    .map_err(|e| {
                        CutoutError::model(format!("Failed to set CUDA execution provider: {e}"))
                    })
            } else {
                log::warn!(
                    "CUDA execution provider requested but not available, falling back to CPU"
                );
                Ok(session_builder)
            }
        },
        ExecutionProvider::CoreMl => {
            if coreml_available() {
                log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                session_builder
                    .with_execution_providers([CoreMLExecutionProvider::default()
                        .with_subgraphs(true)
                        .build()])
                    .map_err(|e| {
                        CutoutError::model(format!("Failed to set CoreML execution provider: {e}"))
                    })
            } else {
                log::error!("🚫 CoreML execution provider requested but not available!");
                log::error!("  - Falling back to CPU");
                Ok(session_builder)
            }
        },
    }
}

impl SegmentationModel for OnnxSegmentationModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn predict(&self, image: &RgbImage) -> Result<Mask> {
        let input = ImagePreprocessor::preprocess_for_model(image, self.kind)?;
        let output = self.infer(&input)?;
        ImagePreprocessor::mask_from_output(&output)
    }
}

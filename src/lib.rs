#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # bgcutout
//!
//! Foreground cutouts from photos using U²-Net segmentation masks, with
//! optional alpha matting for soft edges such as hair.
//!
//! ## Features
//!
//! - **Models**: `u2net` (general), `u2netp` (lightweight), `u2net_human_seg`
//! - **Backends**: ONNX Runtime (CPU, CUDA, `CoreML`) and Tract (pure Rust)
//! - **Compositing**: naive mask-as-alpha, or trimap + guided-filter alpha +
//!   Blur-Fusion foreground at a bounded working resolution
//! - **Batching**: lazy mask prediction over compressed envelopes
//! - **CLI Integration**: optional command-line interface (`cli` feature)
//!
//! Model weights are read from `<models_dir>/<name>.onnx`, where the
//! directory is the configured one, `$U2NET_HOME`, or `~/.u2net`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgcutout::{remove, InferenceConfig, ModelRegistry, RemovalConfig};
//! use std::sync::Arc;
//!
//! # fn example() -> anyhow::Result<()> {
//! let registry = Arc::new(ModelRegistry::with_default_loader(InferenceConfig::default()));
//! let config = RemovalConfig::builder()
//!     .model_name("u2net")
//!     .alpha_matting(true)
//!     .build()?;
//!
//! let input = std::fs::read("input.jpg")?;
//! let png = remove(&input, &registry, &config)?;
//! std::fs::write("output.png", png)?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with GPU acceleration support
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): Command-line interface and progress reporting
//! - `webp-support` (default): WebP input support
//! - `tracing-json`, `tracing-files`: extra CLI log sinks

pub mod backends;
pub mod batch;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod envelope;
pub mod error;
pub mod inference;
pub mod matting;
pub mod models;
pub mod processor;
pub mod registry;
pub mod scale;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod trimap;
pub mod types;
pub mod utils;

use std::sync::Arc;
use tokio::io::AsyncRead;

// Public API exports
pub use batch::{remove_many, RemoveMany};
pub use compositor::{alpha_matting_cutout, naive_cutout};
pub use config::{
    AlphaMattingConfig, BackendType, ExecutionProvider, InferenceConfig, RemovalConfig,
    RemovalConfigBuilder,
};
pub use envelope::{decompress_mask, CompressedArray, DecodedArray, MaskEnvelope};
pub use error::{CutoutError, Result};
pub use inference::{ModelHandle, SegmentationModel};
pub use matting::{AlphaEstimator, BlurFusionForeground, ForegroundEstimator, GuidedFilterAlpha};
pub use models::{DefaultModelLoader, ModelInfo, ModelKind, ModelLoader, PreprocessingConfig};
pub use processor::CutoutProcessor;
pub use registry::ModelRegistry;
pub use trimap::build_trimap;
pub use types::{
    AlphaMap, Cutout, CutoutResult, Mask, NormalizedImage, NormalizedTrimap, ProcessingTimings,
    Trimap, TrimapStatistics,
};
pub use utils::{ExecutionProviderManager, ImagePreprocessor, ProviderInfo};

/// Remove the background from encoded image bytes
///
/// Returns PNG-encoded RGBA at the input's resolution. Decoding happens before
/// the registry is consulted, so malformed input never triggers a model load.
///
/// # Errors
/// - Invalid configuration
/// - Undecodable input
/// - Model loading, inference or matting failures
pub fn remove(
    image_bytes: &[u8],
    registry: &Arc<ModelRegistry>,
    config: &RemovalConfig,
) -> Result<Vec<u8>> {
    CutoutProcessor::new(Arc::clone(registry), config.clone())?.remove_bytes(image_bytes)
}

/// Remove the background from an async reader stream
///
/// The stream is read to the end before processing.
///
/// # Examples
///
/// ```rust,no_run
/// use bgcutout::{remove_from_reader, InferenceConfig, ModelRegistry, RemovalConfig};
/// use std::sync::Arc;
/// use tokio::fs::File;
///
/// # async fn example() -> anyhow::Result<()> {
/// let registry = Arc::new(ModelRegistry::with_default_loader(InferenceConfig::default()));
/// let file = File::open("large_image.jpg").await?;
/// let png = remove_from_reader(file, &registry, &RemovalConfig::default()).await?;
/// tokio::fs::write("output.png", png).await?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// - Stream reading failures
/// - Any [`remove`] failure
pub async fn remove_from_reader<R: AsyncRead + Unpin>(
    reader: R,
    registry: &Arc<ModelRegistry>,
    config: &RemovalConfig,
) -> Result<Vec<u8>> {
    let processor = CutoutProcessor::new(Arc::clone(registry), config.clone())?;
    processor.process_reader(reader).await?.to_png_bytes()
}

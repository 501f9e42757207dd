//! Cutout processor
//!
//! Owns the removal configuration, the injected model registry and the
//! matting estimators, and runs decode → predict → composite for each input.

use crate::batch::{self, RemoveMany};
use crate::compositor::{alpha_matting_cutout, naive_cutout};
use crate::config::RemovalConfig;
use crate::error::{CutoutError, Result};
use crate::matting::{AlphaEstimator, BlurFusionForeground, ForegroundEstimator, GuidedFilterAlpha};
use crate::registry::ModelRegistry;
use crate::scale;
use crate::types::{CutoutResult, ProcessingTimings};
use image::RgbImage;
use instant::Instant;
use std::fmt;
use std::io::{Read, Seek};
use std::sync::Arc;
use tracing::{debug as trace_debug, info as trace_info, instrument, span, Level};

/// Background removal pipeline bound to one configuration
pub struct CutoutProcessor {
    registry: Arc<ModelRegistry>,
    config: RemovalConfig,
    alpha_estimator: Box<dyn AlphaEstimator>,
    foreground_estimator: Box<dyn ForegroundEstimator>,
}

impl fmt::Debug for CutoutProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CutoutProcessor")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl CutoutProcessor {
    /// Processor with the guided-filter and Blur-Fusion estimators
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn new(registry: Arc<ModelRegistry>, config: RemovalConfig) -> Result<Self> {
        Self::with_estimators(
            registry,
            config,
            Box::new(GuidedFilterAlpha::default()),
            Box::new(BlurFusionForeground::default()),
        )
    }

    /// Processor with caller-supplied matting estimators
    ///
    /// # Errors
    /// - Invalid configuration
    pub fn with_estimators(
        registry: Arc<ModelRegistry>,
        config: RemovalConfig,
        alpha_estimator: Box<dyn AlphaEstimator>,
        foreground_estimator: Box<dyn ForegroundEstimator>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registry,
            config,
            alpha_estimator,
            foreground_estimator,
        })
    }

    #[must_use]
    pub fn config(&self) -> &RemovalConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Decode image bytes and cut out the subject
    ///
    /// Undecodable input fails before any model is loaded.
    ///
    /// # Errors
    /// - Malformed or unsupported image bytes
    /// - Model loading, inference or matting failures
    pub fn process_bytes(&self, image_bytes: &[u8]) -> Result<CutoutResult> {
        let total_start = Instant::now();
        let decode_start = Instant::now();
        let image = image::load_from_memory(image_bytes)
            .map_err(|e| CutoutError::decode(format!("Failed to decode image from bytes: {e}")))?
            .to_rgb8();
        let image_decode_ms = decode_start.elapsed().as_millis() as u64;

        let mut result = self.process_image(&image)?;
        result.timings.image_decode_ms = image_decode_ms;
        result.timings.total_ms = total_start.elapsed().as_millis() as u64;
        Ok(result)
    }

    /// Cut out the subject of a decoded image
    ///
    /// # Errors
    /// - Model loading or inference failures
    /// - Matting failures when alpha matting is enabled
    #[instrument(
        skip(self, image),
        fields(
            model = %self.config.model_name,
            alpha_matting = self.config.alpha_matting,
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn process_image(&self, image: &RgbImage) -> Result<CutoutResult> {
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::default();
        let original_dimensions = image.dimensions();

        trace_info!(model = %self.config.model_name, "🎯 Starting cutout");

        let load_start = Instant::now();
        let model = self.registry.get_model(&self.config.model_name)?;
        timings.model_load_ms = load_start.elapsed().as_millis() as u64;

        let mask = {
            let _span = span!(Level::INFO, "inference", model = %model.kind()).entered();
            let inference_start = Instant::now();
            let mask = model.predict(image)?;
            timings.inference_ms = inference_start.elapsed().as_millis() as u64;
            mask
        };
        trace_debug!(mask = ?mask.dimensions(), "Mask predicted");

        let cutout = {
            let _span = span!(
                Level::DEBUG,
                "compositing",
                width = original_dimensions.0,
                height = original_dimensions.1
            )
            .entered();
            let compositing_start = Instant::now();
            let cutout = if self.config.alpha_matting {
                alpha_matting_cutout(
                    image,
                    &mask,
                    &self.config.matting,
                    self.alpha_estimator.as_ref(),
                    self.foreground_estimator.as_ref(),
                )?
            } else {
                naive_cutout(image, &mask)
            };
            timings.compositing_ms = compositing_start.elapsed().as_millis() as u64;
            cutout
        };

        timings.total_ms = total_start.elapsed().as_millis() as u64;
        trace_info!(
            total_ms = timings.total_ms,
            inference_ms = timings.inference_ms,
            "✅ Cutout complete"
        );

        Ok(CutoutResult {
            cutout,
            mask: scale::resize_mask(&mask, original_dimensions),
            original_dimensions,
            alpha_matted: self.config.alpha_matting,
            model_name: model.kind().name().to_string(),
            timings,
        })
    }

    /// Decode, cut out and encode as PNG
    ///
    /// # Errors
    /// - Any [`Self::process_bytes`] failure
    /// - PNG encoding failures
    pub fn remove_bytes(&self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        self.process_bytes(image_bytes)?.to_png_bytes()
    }

    /// Read an async stream fully, then process it
    ///
    /// # Errors
    /// - Stream reading failures
    /// - Any [`Self::process_bytes`] failure
    pub async fn process_reader<R: tokio::io::AsyncRead + Unpin>(
        &self,
        mut reader: R,
    ) -> Result<CutoutResult> {
        use tokio::io::AsyncReadExt;

        let mut buffer = Vec::new();
        AsyncReadExt::read_to_end(&mut reader, &mut buffer).await?;
        self.process_bytes(&buffer)
    }

    /// Batched mask prediction with the configured model
    pub fn remove_many<I, R>(&self, buffers: I) -> RemoveMany<'_, R>
    where
        I: IntoIterator<Item = R>,
        R: Read + Seek,
    {
        batch::remove_many(buffers, &self.registry, &self.config.model_name)
    }
}

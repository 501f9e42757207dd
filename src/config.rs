//! Configuration types for cutout operations

use crate::error::{CutoutError, Result};
use crate::models::ModelKind;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Largest erosion structure accepted by validation
pub const MAX_ERODE_STRUCTURE_SIZE: u32 = 255;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// Inference engine used to run segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime (hardware acceleration)
    Onnx,
    /// Tract (pure Rust, CPU only)
    Tract,
}

impl Default for BackendType {
    fn default() -> Self {
        if cfg!(feature = "onnx") {
            Self::Onnx
        } else {
            Self::Tract
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Parameters for the alpha matting path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlphaMattingConfig {
    /// Mask values strictly above this are likely foreground
    pub foreground_threshold: u8,

    /// Mask values strictly below this are likely background
    pub background_threshold: u8,

    /// Side of the square erosion structure (0 disables erosion)
    pub erode_structure_size: u32,

    /// Longest side of the working resolution
    pub base_size: u32,
}

impl Default for AlphaMattingConfig {
    fn default() -> Self {
        Self {
            foreground_threshold: 240,
            background_threshold: 10,
            erode_structure_size: 10,
            base_size: 1000,
        }
    }
}

impl AlphaMattingConfig {
    /// Validate matting parameters
    ///
    /// # Errors
    /// - Background threshold not strictly below the foreground threshold
    /// - Zero base size
    /// - Erosion structure larger than [`MAX_ERODE_STRUCTURE_SIZE`]
    pub fn validate(&self) -> Result<()> {
        if self.background_threshold >= self.foreground_threshold {
            return Err(CutoutError::invalid_config(format!(
                "Background threshold ({}) must be below foreground threshold ({})",
                self.background_threshold, self.foreground_threshold
            )));
        }

        if self.base_size == 0 {
            return Err(CutoutError::config_value_error(
                "base size",
                self.base_size,
                "1 or greater",
                Some(1000),
            ));
        }

        if self.erode_structure_size > MAX_ERODE_STRUCTURE_SIZE {
            return Err(CutoutError::config_value_error(
                "erode structure size",
                self.erode_structure_size,
                "0-255",
                Some(10),
            ));
        }

        Ok(())
    }
}

/// Configuration for a cutout operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemovalConfig {
    /// Requested model name; unknown names resolve to the general model
    pub model_name: String,

    /// Use the alpha matting path instead of the naive cutout
    pub alpha_matting: bool,

    /// Matting parameters, ignored unless `alpha_matting` is set
    pub matting: AlphaMattingConfig,
}

impl Default for RemovalConfig {
    fn default() -> Self {
        Self {
            model_name: ModelKind::U2NetHumanSeg.name().to_string(),
            alpha_matting: false,
            matting: AlphaMattingConfig::default(),
        }
    }
}

impl RemovalConfig {
    /// Create a new configuration builder
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::RemovalConfig;
    ///
    /// let config = RemovalConfig::builder()
    ///     .model_name("u2netp")
    ///     .alpha_matting(true)
    ///     .foreground_threshold(230)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.matting.background_threshold, 10);
    /// ```
    #[must_use]
    pub fn builder() -> RemovalConfigBuilder {
        RemovalConfigBuilder::default()
    }

    /// Load a configuration from JSON; missing fields take their defaults
    ///
    /// # Errors
    /// - Malformed JSON
    /// - The resulting configuration fails validation
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CutoutError::invalid_config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// Matting parameters are checked even when matting is disabled so a
    /// configuration stays valid when the flag is toggled.
    ///
    /// # Errors
    /// - Empty model name
    /// - Invalid matting parameters, see [`AlphaMattingConfig::validate`]
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::RemovalConfig;
    ///
    /// let mut config = RemovalConfig::default();
    /// assert!(config.validate().is_ok());
    ///
    /// config.matting.background_threshold = 250;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(CutoutError::invalid_config("Model name must not be empty"));
        }
        self.matting.validate()
    }

    /// Model kind the configured name resolves to
    #[must_use]
    pub fn model_kind(&self) -> ModelKind {
        ModelKind::from_name(&self.model_name)
    }
}

/// Builder for `RemovalConfig`
#[derive(Debug, Default)]
pub struct RemovalConfigBuilder {
    config: RemovalConfig,
}

impl RemovalConfigBuilder {
    /// Set the model name
    #[must_use]
    pub fn model_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.model_name = name.into();
        self
    }

    /// Set the model by kind
    #[must_use]
    pub fn model(mut self, kind: ModelKind) -> Self {
        self.config.model_name = kind.name().to_string();
        self
    }

    /// Enable or disable alpha matting
    #[must_use]
    pub fn alpha_matting(mut self, enabled: bool) -> Self {
        self.config.alpha_matting = enabled;
        self
    }

    #[must_use]
    pub fn foreground_threshold(mut self, threshold: u8) -> Self {
        self.config.matting.foreground_threshold = threshold;
        self
    }

    #[must_use]
    pub fn background_threshold(mut self, threshold: u8) -> Self {
        self.config.matting.background_threshold = threshold;
        self
    }

    #[must_use]
    pub fn erode_structure_size(mut self, size: u32) -> Self {
        self.config.matting.erode_structure_size = size;
        self
    }

    #[must_use]
    pub fn base_size(mut self, size: u32) -> Self {
        self.config.matting.base_size = size;
        self
    }

    /// Replace all matting parameters at once
    #[must_use]
    pub fn matting(mut self, matting: AlphaMattingConfig) -> Self {
        self.config.matting = matting;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    /// - Any validation failure, see [`RemovalConfig::validate`]
    pub fn build(self) -> Result<RemovalConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Settings for loading and running segmentation models
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Inference engine
    pub backend_type: BackendType,

    /// Execution provider for ONNX Runtime (ignored by Tract)
    pub execution_provider: ExecutionProvider,

    /// Number of intra-op threads for inference (0 = auto)
    pub intra_threads: usize,

    /// Number of inter-op threads for inference (0 = auto)
    pub inter_threads: usize,

    /// Directory holding `<model>.onnx` files; `None` uses `U2NET_HOME` or `~/.u2net`
    pub models_dir: Option<PathBuf>,
}

impl InferenceConfig {
    #[must_use]
    pub fn with_backend(mut self, backend_type: BackendType) -> Self {
        self.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn with_execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.execution_provider = provider;
        self
    }

    /// Set both intra and inter threads (inter = threads/2, minimum 1; 0 = auto)
    #[must_use]
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.intra_threads = threads;
        self.inter_threads = if threads > 0 { (threads / 2).max(1) } else { 0 };
        self
    }

    #[must_use]
    pub fn with_models_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.models_dir = Some(dir.into());
        self
    }

    /// Intra-op thread count with auto-detection applied
    #[must_use]
    pub fn resolved_intra_threads(&self) -> usize {
        if self.intra_threads > 0 {
            self.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(8)
        }
    }

    /// Inter-op thread count with auto-detection applied
    #[must_use]
    pub fn resolved_inter_threads(&self) -> usize {
        if self.inter_threads > 0 {
            self.inter_threads
        } else {
            (std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(8)
                / 4)
            .max(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let config = RemovalConfig::default();
        assert_eq!(config.model_name, "u2net_human_seg");
        assert!(!config.alpha_matting);
        assert_eq!(config.matting.foreground_threshold, 240);
        assert_eq!(config.matting.background_threshold, 10);
        assert_eq!(config.matting.erode_structure_size, 10);
        assert_eq!(config.matting.base_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_rejects_misordered_thresholds() {
        let result = RemovalConfig::builder()
            .foreground_threshold(10)
            .background_threshold(240)
            .build();
        assert!(matches!(result, Err(CutoutError::InvalidConfig(_))));

        let equal = RemovalConfig::builder()
            .foreground_threshold(100)
            .background_threshold(100)
            .build();
        assert!(equal.is_err());
    }

    #[test]
    fn test_builder_rejects_zero_base_size() {
        let err = RemovalConfig::builder().base_size(0).build().unwrap_err();
        assert!(err.to_string().contains("base size"));
    }

    #[test]
    fn test_builder_rejects_huge_erosion() {
        assert!(RemovalConfig::builder()
            .erode_structure_size(MAX_ERODE_STRUCTURE_SIZE + 1)
            .build()
            .is_err());
        assert!(RemovalConfig::builder()
            .erode_structure_size(0)
            .build()
            .is_ok());
    }

    #[test]
    fn test_empty_model_name_rejected() {
        assert!(RemovalConfig::builder().model_name("  ").build().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            RemovalConfig::from_json(r#"{"alpha_matting": true, "matting": {"base_size": 512}}"#)
                .unwrap();
        assert!(config.alpha_matting);
        assert_eq!(config.matting.base_size, 512);
        assert_eq!(config.matting.foreground_threshold, 240);
        assert_eq!(config.model_name, "u2net_human_seg");

        assert!(RemovalConfig::from_json("{not json").is_err());
        assert!(RemovalConfig::from_json(r#"{"matting": {"base_size": 0}}"#).is_err());
    }

    #[test]
    fn test_model_kind_resolution() {
        let config = RemovalConfig::builder().model_name("u2netp").build().unwrap();
        assert_eq!(config.model_kind(), ModelKind::U2NetP);

        let config = RemovalConfig::builder().model_name("isnet").build().unwrap();
        assert_eq!(config.model_kind(), ModelKind::U2Net);
    }

    #[test]
    fn test_inference_threads() {
        let config = InferenceConfig::default().with_threads(8);
        assert_eq!(config.intra_threads, 8);
        assert_eq!(config.inter_threads, 4);
        assert_eq!(config.resolved_intra_threads(), 8);

        let auto = InferenceConfig::default().with_threads(0);
        assert!(auto.resolved_intra_threads() >= 1);
        assert!(auto.resolved_inter_threads() >= 1);
    }

    #[test]
    fn test_execution_provider_display() {
        assert_eq!(ExecutionProvider::CoreMl.to_string(), "coreml");
        assert_eq!(BackendType::Tract.to_string(), "tract");
    }
}

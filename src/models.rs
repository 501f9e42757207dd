//! Model catalogue and on-disk model loading
//!
//! Three U²-Net variants are known. Weights are read from
//! `<models_dir>/<name>.onnx`, where the directory is taken from the
//! inference configuration, the `U2NET_HOME` environment variable, or
//! `~/.u2net`, in that order.

#[cfg(any(feature = "onnx", feature = "tract"))]
use crate::config::BackendType;
use crate::config::InferenceConfig;
use crate::error::{CutoutError, Result};
use crate::inference::ModelHandle;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment variable overriding the model directory
pub const MODELS_DIR_ENV: &str = "U2NET_HOME";

/// Directory under the home directory used when nothing else is configured
pub const DEFAULT_MODELS_DIR_NAME: &str = ".u2net";

/// Supported segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    /// General-purpose salient object segmentation
    #[serde(rename = "u2net")]
    U2Net,
    /// Lightweight variant
    #[serde(rename = "u2netp")]
    U2NetP,
    /// Human segmentation
    #[serde(rename = "u2net_human_seg")]
    U2NetHumanSeg,
}

impl ModelKind {
    /// All known kinds
    pub const ALL: [Self; 3] = [Self::U2Net, Self::U2NetP, Self::U2NetHumanSeg];

    /// Resolve a requested name. Unrecognized names fall back to [`ModelKind::U2Net`].
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name {
            "u2netp" => Self::U2NetP,
            "u2net_human_seg" => Self::U2NetHumanSeg,
            "u2net" => Self::U2Net,
            other => {
                log::debug!("Unknown model name '{other}', using u2net");
                Self::U2Net
            },
        }
    }

    /// Canonical name, also the file stem of the weights
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2Net => "u2net",
            Self::U2NetP => "u2netp",
            Self::U2NetHumanSeg => "u2net_human_seg",
        }
    }

    /// File name of the ONNX weights
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::U2Net => "General-purpose salient object segmentation",
            Self::U2NetP => "Lightweight U2-Net for constrained hardware",
            Self::U2NetHumanSeg => "U2-Net fine-tuned for human segmentation",
        }
    }

    /// Preprocessing shared by the U²-Net family
    #[must_use]
    pub fn preprocessing_config(self) -> PreprocessingConfig {
        PreprocessingConfig::default()
    }

    /// Static model information
    #[must_use]
    pub fn info(self) -> ModelInfo {
        let [width, height] = self.preprocessing_config().target_size;
        let (width, height) = (width as usize, height as usize);
        ModelInfo {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Model information and metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    pub name: String,
    pub description: String,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// Input preprocessing for a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input size [width, height]
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            target_size: [320, 320],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }
}

/// Loads a segmentation model for a resolved kind
///
/// Implementations may be slow; the registry guarantees at most one
/// successful load per kind.
pub trait ModelLoader: Send + Sync {
    /// Load the model
    ///
    /// # Errors
    /// - Weights missing or unreadable
    /// - Backend initialization failures
    fn load(&self, kind: ModelKind) -> Result<ModelHandle>;
}

/// Resolve the model directory from configuration, environment and home directory
///
/// # Errors
/// - No directory configured and the home directory cannot be determined
pub fn resolve_models_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    models_dir_from(
        explicit,
        std::env::var_os(MODELS_DIR_ENV),
        dirs::home_dir(),
    )
}

fn models_dir_from(
    explicit: Option<&Path>,
    env_value: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env_value.filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    home.map(|h| h.join(DEFAULT_MODELS_DIR_NAME)).ok_or_else(|| {
        CutoutError::model(format!(
            "Cannot determine model directory: set {MODELS_DIR_ENV} or configure models_dir"
        ))
    })
}

/// Loads ONNX weights from the model directory into the configured backend
#[derive(Debug, Clone, Default)]
pub struct DefaultModelLoader {
    config: InferenceConfig,
}

impl DefaultModelLoader {
    #[must_use]
    pub fn new(config: InferenceConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    /// Path the weights for `kind` are read from
    ///
    /// # Errors
    /// - The model directory cannot be resolved
    pub fn model_path(&self, kind: ModelKind) -> Result<PathBuf> {
        Ok(resolve_models_dir(self.config.models_dir.as_deref())?.join(kind.file_name()))
    }

    fn read_weights(&self, kind: ModelKind) -> Result<Vec<u8>> {
        let path = self.model_path(kind)?;
        if !path.is_file() {
            return Err(CutoutError::model_error_with_context(
                "load",
                &path,
                "file not found",
                &[
                    "download the weights into the model directory",
                    "set U2NET_HOME",
                    "pass --models-dir",
                ],
            ));
        }
        std::fs::read(&path).map_err(|e| CutoutError::file_io_error("read model", &path, &e))
    }
}

impl ModelLoader for DefaultModelLoader {
    #[allow(unreachable_patterns)]
    fn load(&self, kind: ModelKind) -> Result<ModelHandle> {
        let weights = self.read_weights(kind)?;
        log::info!(
            "Loading {kind} ({:.2} MB) with {} backend",
            weights.len() as f64 / (1024.0 * 1024.0),
            self.config.backend_type
        );

        match self.config.backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(std::sync::Arc::new(
                crate::backends::OnnxSegmentationModel::from_bytes(kind, &weights, &self.config)?,
            )),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(std::sync::Arc::new(
                crate::backends::TractSegmentationModel::from_bytes(kind, weights)?,
            )),
            other => Err(CutoutError::model(format!(
                "Backend '{other}' is not compiled into this build"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_name_resolution() {
        assert_eq!(ModelKind::from_name("u2netp"), ModelKind::U2NetP);
        assert_eq!(ModelKind::from_name("u2net_human_seg"), ModelKind::U2NetHumanSeg);
        assert_eq!(ModelKind::from_name("u2net"), ModelKind::U2Net);
        assert_eq!(ModelKind::from_name("unknown"), ModelKind::U2Net);
        assert_eq!(ModelKind::from_name(""), ModelKind::U2Net);
        assert_eq!(ModelKind::from_name("U2NETP"), ModelKind::U2Net);
    }

    #[test]
    fn test_names_roundtrip() {
        for kind in ModelKind::ALL {
            assert_eq!(ModelKind::from_name(kind.name()), kind);
        }
        assert_eq!(ModelKind::U2NetHumanSeg.file_name(), "u2net_human_seg.onnx");
    }

    #[test]
    fn test_model_info_shapes() {
        let info = ModelKind::U2NetP.info();
        assert_eq!(info.input_shape, (1, 3, 320, 320));
        assert_eq!(info.output_shape, (1, 1, 320, 320));
    }

    #[test]
    fn test_models_dir_precedence() {
        let explicit = PathBuf::from("/explicit");
        let home = Some(PathBuf::from("/home/user"));

        let dir = models_dir_from(Some(&explicit), Some("/env".into()), home.clone()).unwrap();
        assert_eq!(dir, explicit);

        let dir = models_dir_from(None, Some("/env".into()), home.clone()).unwrap();
        assert_eq!(dir, PathBuf::from("/env"));

        let dir = models_dir_from(None, Some(OsString::new()), home.clone()).unwrap();
        assert_eq!(dir, PathBuf::from("/home/user/.u2net"));

        assert!(models_dir_from(None, None, None).is_err());
    }

    #[test]
    fn test_default_loader_missing_weights() {
        let temp = tempfile::tempdir().unwrap();
        let loader = DefaultModelLoader::new(InferenceConfig::default().with_models_dir(temp.path()));

        assert_eq!(
            loader.model_path(ModelKind::U2NetP).unwrap(),
            temp.path().join("u2netp.onnx")
        );

        let err = loader.load(ModelKind::U2NetP).err().unwrap();
        assert!(matches!(err, CutoutError::Model(_)));
        assert!(err.to_string().contains("u2netp.onnx"));
    }

    #[cfg(not(any(feature = "onnx", feature = "tract")))]
    #[test]
    fn test_default_loader_without_backends() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("u2net.onnx"), b"weights").unwrap();
        let loader = DefaultModelLoader::new(InferenceConfig::default().with_models_dir(temp.path()));

        let err = loader.load(ModelKind::U2Net).err().unwrap();
        assert!(matches!(err, CutoutError::Model(_)));
        assert!(err.to_string().contains("not compiled"));
    }
}

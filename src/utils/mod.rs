//! Shared helpers for the segmentation backends and the CLI

pub mod preprocessing;
pub mod providers;
pub mod validation;

pub use preprocessing::ImagePreprocessor;
pub use providers::{ExecutionProviderManager, ProviderInfo};
pub use validation::TensorValidator;

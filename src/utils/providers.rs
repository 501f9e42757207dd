//! Execution provider parsing and discovery

use crate::{
    config::{BackendType, ExecutionProvider},
    error::{CutoutError, Result},
};

/// Information about an execution provider
#[derive(Debug, Clone)]
pub struct ProviderInfo {
    pub name: String,
    pub backend_type: BackendType,
    pub execution_provider: ExecutionProvider,
    pub available: bool,
    pub description: String,
}

/// Utility for parsing and listing execution providers
pub struct ExecutionProviderManager;

impl ExecutionProviderManager {
    /// Parse execution provider string in format "backend:provider"
    ///
    /// A bare backend name selects that backend's default provider.
    ///
    /// # Examples
    /// ```rust
    /// use bgcutout::utils::ExecutionProviderManager;
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("onnx:auto")?;
    /// let (backend, provider) = ExecutionProviderManager::parse_provider_string("tract:cpu")?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// - Unknown backend or provider names
    pub fn parse_provider_string(provider_str: &str) -> Result<(BackendType, ExecutionProvider)> {
        let Some((backend, provider)) = provider_str.split_once(':') else {
            return match provider_str {
                "onnx" => Ok((BackendType::Onnx, ExecutionProvider::Auto)),
                "tract" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                _ => Err(CutoutError::invalid_config(
                    "Invalid provider format. Use backend:provider (e.g., onnx:auto, tract:cpu)",
                )),
            };
        };

        match backend {
            "onnx" => {
                let execution_provider = match provider {
                    "auto" => ExecutionProvider::Auto,
                    "cpu" => ExecutionProvider::Cpu,
                    "cuda" => ExecutionProvider::Cuda,
                    "coreml" => ExecutionProvider::CoreMl,
                    _ => {
                        return Err(CutoutError::invalid_config(format!(
                            "Unknown ONNX provider: {}. Supported: auto, cpu, cuda, coreml",
                            provider
                        )));
                    },
                };
                Ok((BackendType::Onnx, execution_provider))
            },
            "tract" => match provider {
                "cpu" => Ok((BackendType::Tract, ExecutionProvider::Cpu)),
                _ => Err(CutoutError::invalid_config(format!(
                    "Unknown Tract provider: {}. Tract only supports 'cpu'",
                    provider
                ))),
            },
            _ => Err(CutoutError::invalid_config(format!(
                "Unknown backend: {}. Supported backends: onnx, tract",
                backend
            ))),
        }
    }

    /// List every backend/provider combination with its availability
    #[must_use]
    pub fn list_all_providers() -> Vec<ProviderInfo> {
        let mut providers = Vec::new();

        #[cfg(feature = "onnx")]
        {
            let availability: std::collections::HashMap<String, bool> =
                crate::backends::OnnxSegmentationModel::list_providers()
                    .into_iter()
                    .map(|(name, available, _)| (name.to_lowercase(), available))
                    .collect();
            let lookup = |name: &str| availability.get(name).copied().unwrap_or(false);

            providers.push(ProviderInfo {
                name: "onnx:auto".to_string(),
                backend_type: BackendType::Onnx,
                execution_provider: ExecutionProvider::Auto,
                available: availability.values().any(|&available| available),
                description: "ONNX Runtime with auto-selected provider".to_string(),
            });
            providers.push(ProviderInfo {
                name: "onnx:cpu".to_string(),
                backend_type: BackendType::Onnx,
                execution_provider: ExecutionProvider::Cpu,
                available: lookup("cpu"),
                description: "ONNX Runtime CPU execution".to_string(),
            });
            providers.push(ProviderInfo {
                name: "onnx:cuda".to_string(),
                backend_type: BackendType::Onnx,
                execution_provider: ExecutionProvider::Cuda,
                available: lookup("cuda"),
                description: "ONNX Runtime CUDA GPU acceleration".to_string(),
            });
            providers.push(ProviderInfo {
                name: "onnx:coreml".to_string(),
                backend_type: BackendType::Onnx,
                execution_provider: ExecutionProvider::CoreMl,
                available: lookup("coreml"),
                description: "ONNX Runtime CoreML (Apple Silicon) acceleration".to_string(),
            });
        }

        #[cfg(not(feature = "onnx"))]
        for (provider, execution_provider) in [
            ("auto", ExecutionProvider::Auto),
            ("cpu", ExecutionProvider::Cpu),
            ("cuda", ExecutionProvider::Cuda),
            ("coreml", ExecutionProvider::CoreMl),
        ] {
            providers.push(ProviderInfo {
                name: format!("onnx:{provider}"),
                backend_type: BackendType::Onnx,
                execution_provider,
                available: false,
                description: "ONNX Runtime (feature disabled)".to_string(),
            });
        }

        providers.push(ProviderInfo {
            name: "tract:cpu".to_string(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            available: cfg!(feature = "tract"),
            description: if cfg!(feature = "tract") {
                "Pure Rust CPU inference via Tract".to_string()
            } else {
                "Pure Rust CPU inference via Tract (feature disabled)".to_string()
            },
        });

        providers
    }

    /// Convert backend type and execution provider back to string
    #[must_use]
    pub fn provider_to_string(backend_type: BackendType, provider: ExecutionProvider) -> String {
        let backend_str = match backend_type {
            BackendType::Onnx => "onnx",
            BackendType::Tract => "tract",
        };

        let provider_str = match provider {
            ExecutionProvider::Auto => "auto",
            ExecutionProvider::Cpu => "cpu",
            ExecutionProvider::Cuda => "cuda",
            ExecutionProvider::CoreMl => "coreml",
        };

        format!("{}:{}", backend_str, provider_str)
    }
}

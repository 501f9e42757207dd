//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::config::{InferenceConfig, RemovalConfig};
use crate::utils::ExecutionProviderManager;
use anyhow::{Context, Result};
use std::path::PathBuf;

/// Convert CLI arguments into library configurations
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the removal configuration
    ///
    /// A `--config` file is loaded first; explicit flags then override it.
    pub(crate) fn removal_config(cli: &Cli) -> Result<RemovalConfig> {
        let mut config = match &cli.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                RemovalConfig::from_json(&json)
                    .with_context(|| format!("Invalid config file: {}", path.display()))?
            },
            None => RemovalConfig::default(),
        };

        if let Some(model) = &cli.model {
            config.model_name.clone_from(model);
        }
        if cli.alpha_matting {
            config.alpha_matting = true;
        }
        if let Some(threshold) = cli.foreground_threshold {
            config.matting.foreground_threshold = threshold;
        }
        if let Some(threshold) = cli.background_threshold {
            config.matting.background_threshold = threshold;
        }
        if let Some(size) = cli.erode_size {
            config.matting.erode_structure_size = size;
        }
        if let Some(size) = cli.base_size {
            config.matting.base_size = size;
        }

        config
            .validate()
            .context("Invalid alpha matting options")?;
        Ok(config)
    }

    /// Build the inference configuration from `--execution-provider`,
    /// `--threads` and `--models-dir`
    pub(crate) fn inference_config(cli: &Cli) -> Result<InferenceConfig> {
        let (backend_type, provider) =
            ExecutionProviderManager::parse_provider_string(&cli.execution_provider)
                .context("Invalid execution provider")?;

        let mut config = InferenceConfig::default()
            .with_backend(backend_type)
            .with_execution_provider(provider)
            .with_threads(cli.threads);
        if let Some(dir) = &cli.models_dir {
            config = config.with_models_dir(PathBuf::from(dir));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendType, ExecutionProvider};
    use clap::Parser;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("bgcutout").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["photo.jpg"]);
        let removal = CliConfigBuilder::removal_config(&cli).unwrap();
        assert_eq!(removal, RemovalConfig::default());

        let inference = CliConfigBuilder::inference_config(&cli).unwrap();
        assert_eq!(inference.backend_type, BackendType::Onnx);
        assert_eq!(inference.execution_provider, ExecutionProvider::Auto);
        assert_eq!(inference.intra_threads, 0);
        assert!(inference.models_dir.is_none());
    }

    #[test]
    fn test_matting_flags_and_aliases() {
        let cli = parse(&[
            "photo.jpg",
            "-a",
            "--af",
            "200",
            "--ab",
            "20",
            "--ae",
            "5",
            "--az",
            "640",
            "-m",
            "u2netp",
        ]);
        let config = CliConfigBuilder::removal_config(&cli).unwrap();
        assert!(config.alpha_matting);
        assert_eq!(config.model_name, "u2netp");
        assert_eq!(config.matting.foreground_threshold, 200);
        assert_eq!(config.matting.background_threshold, 20);
        assert_eq!(config.matting.erode_structure_size, 5);
        assert_eq!(config.matting.base_size, 640);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let cli = parse(&["photo.jpg", "--af", "5", "--ab", "50"]);
        assert!(CliConfigBuilder::removal_config(&cli).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model_name": "u2net", "alpha_matting": true, "matting": {{"base_size": 300}}}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap();

        let cli = parse(&["photo.jpg", "--config", path, "--az", "400"]);
        let config = CliConfigBuilder::removal_config(&cli).unwrap();
        assert_eq!(config.model_name, "u2net");
        assert!(config.alpha_matting);
        assert_eq!(config.matting.base_size, 400);
    }

    #[test]
    fn test_inference_options() {
        let cli = parse(&[
            "photo.jpg",
            "-e",
            "tract:cpu",
            "-t",
            "4",
            "--models-dir",
            "/opt/models",
        ]);
        let config = CliConfigBuilder::inference_config(&cli).unwrap();
        assert_eq!(config.backend_type, BackendType::Tract);
        assert_eq!(config.intra_threads, 4);
        assert_eq!(config.inter_threads, 2);
        assert_eq!(config.models_dir, Some(PathBuf::from("/opt/models")));

        let cli = parse(&["photo.jpg", "-e", "invalid:provider"]);
        assert!(CliConfigBuilder::inference_config(&cli).is_err());
    }
}

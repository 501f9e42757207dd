//! Background removal CLI tool
//!
//! Command-line interface for cutting out foreground subjects from images.

use super::config::CliConfigBuilder;
use crate::{
    processor::CutoutProcessor,
    registry::ModelRegistry,
    tracing_config::{init_cli_tracing, spans},
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info as trace_info, Instrument};

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];

/// Suffix appended to the input stem for generated output names
const OUTPUT_SUFFIX: &str = ".out";

/// Foreground cutout CLI tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgcutout")]
pub struct Cli {
    /// Input image, directory, or "-" for stdin
    #[arg(value_name = "INPUT", required_unless_present = "show_providers")]
    pub input: Option<String>,

    /// Output file (single input) or directory (directory input). Use "-" for stdout.
    #[arg(value_name = "OUTPUT")]
    pub output: Option<String>,

    /// Model name (u2net, u2netp, u2net_human_seg) [default: u2net_human_seg]
    #[arg(short, long)]
    pub model: Option<String>,

    /// Refine mask edges with alpha matting
    #[arg(short, long)]
    pub alpha_matting: bool,

    /// Mask values above this are treated as likely foreground [default: 240]
    #[arg(long = "alpha-matting-foreground-threshold", visible_alias = "af")]
    pub foreground_threshold: Option<u8>,

    /// Mask values below this are treated as likely background [default: 10]
    #[arg(long = "alpha-matting-background-threshold", visible_alias = "ab")]
    pub background_threshold: Option<u8>,

    /// Erosion structure size for the trimap, 0 disables erosion [default: 10]
    #[arg(long = "alpha-matting-erode-size", visible_alias = "ae")]
    pub erode_size: Option<u32>,

    /// Longest side of the matting working resolution [default: 1000]
    #[arg(long = "alpha-matting-base-size", visible_alias = "az")]
    pub base_size: Option<u32>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Directory holding <model>.onnx files [default: $U2NET_HOME or ~/.u2net]
    #[arg(long, value_name = "PATH")]
    pub models_dir: Option<String>,

    /// Number of threads (0 = auto-detect optimal threading)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// JSON file with a removal configuration; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Process directory recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// Pattern for directory processing (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Show execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,
}

/// Main CLI entry point
pub async fn main() -> Result<()> {
    let cli = Cli::parse();
    let session_id = uuid::Uuid::new_v4().to_string();
    let _tracing_guard = init_cli_tracing(cli.verbose, &session_id)?;

    debug!(?cli, "Parsed arguments");

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    let removal_config = CliConfigBuilder::removal_config(&cli)?;
    let inference_config = CliConfigBuilder::inference_config(&cli)?;
    let provider = ExecutionProviderManager::provider_to_string(
        inference_config.backend_type,
        inference_config.execution_provider,
    );
    let session_span = spans::session(&session_id, &removal_config.model_name, &provider);

    let registry = Arc::new(ModelRegistry::with_default_loader(inference_config));
    let processor = CutoutProcessor::new(registry, removal_config)?;

    let start_time = Instant::now();
    let processed_count = process_inputs(&cli, &processor)
        .instrument(session_span)
        .await?;

    trace_info!(
        processed_count,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "✅ Done"
    );
    Ok(())
}

/// Display execution provider diagnostics
fn show_provider_diagnostics() {
    println!("Execution providers:");
    for provider in ExecutionProviderManager::list_all_providers() {
        let status = if provider.available { "✅" } else { "❌" };
        println!("  {status} {:<12} {}", provider.name, provider.description);
    }

    println!();
    println!("Models:");
    for kind in crate::models::ModelKind::ALL {
        println!("  {:<16} {}", kind.name(), kind.description());
    }
}

/// Dispatch on the input kind, returning the number of images written
async fn process_inputs(cli: &Cli, processor: &CutoutProcessor) -> Result<usize> {
    let input = cli
        .input
        .as_deref()
        .context("No input given (use \"-\" for stdin)")?;

    if input == "-" {
        process_stdin(cli.output.as_deref(), processor).await?;
        return Ok(1);
    }

    let path = PathBuf::from(input);
    if path.is_file() {
        let output = match cli.output.as_deref() {
            Some(output) => OutputTarget::from_arg(output),
            None => OutputTarget::File(generate_output_path(&path, None)),
        };
        process_file(processor, &path, &output).await?;
        Ok(1)
    } else if path.is_dir() {
        process_directory(cli, processor, &path).await
    } else {
        anyhow::bail!(
            "Input path does not exist or is not accessible: {}",
            path.display()
        );
    }
}

/// Where a single cutout is written
#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(arg))
        }
    }

    async fn write(&self, png: &[u8]) -> Result<()> {
        match self {
            Self::Stdout => write_stdout(png),
            Self::File(path) => tokio::fs::write(path, png)
                .await
                .with_context(|| format!("Failed to write output file: {}", path.display())),
        }
    }
}

/// Process image bytes from stdin; output defaults to stdout
async fn process_stdin(output: Option<&str>, processor: &CutoutProcessor) -> Result<()> {
    info!("Reading image from stdin");

    let mut result = processor
        .process_reader(tokio::io::stdin())
        .await
        .context("Failed to process image from stdin")?;
    debug!("{}", result.timing_summary());

    let png = result.to_png_bytes()?;
    output
        .map_or(OutputTarget::Stdout, OutputTarget::from_arg)
        .write(&png)
        .await
}

/// Cut out one file and write the PNG
async fn process_file(
    processor: &CutoutProcessor,
    input_path: &Path,
    output: &OutputTarget,
) -> Result<()> {
    let span = spans::file_processing(input_path);
    async {
        let bytes = tokio::fs::read(input_path)
            .await
            .with_context(|| format!("Failed to read input file: {}", input_path.display()))?;

        let mut result = processor
            .process_bytes(&bytes)
            .with_context(|| format!("Failed to process {}", input_path.display()))?;
        debug!("{}", result.timing_summary());

        let png = result.to_png_bytes()?;
        output.write(&png).await?;

        if let OutputTarget::File(path) = output {
            info!("Saved {} -> {}", input_path.display(), path.display());
        }
        Ok::<_, anyhow::Error>(())
    }
    .instrument(span)
    .await
}

/// Process every image in a directory, continuing past per-file failures
async fn process_directory(cli: &Cli, processor: &CutoutProcessor, dir: &Path) -> Result<usize> {
    let output_dir = match cli.output.as_deref() {
        Some("-") => anyhow::bail!("Cannot use stdout (-) as output when processing a directory"),
        Some(output) => {
            let output_path = PathBuf::from(output);
            if output_path.is_file() {
                anyhow::bail!(
                    "Output path exists and is a file, not a directory: {}",
                    output_path.display()
                );
            }
            std::fs::create_dir_all(&output_path).with_context(|| {
                format!(
                    "Failed to create output directory: {}",
                    output_path.display()
                )
            })?;
            Some(output_path)
        },
        None => None,
    };

    let mut files = find_image_files(dir, cli.recursive, cli.pattern.as_deref())?;
    if files.is_empty() {
        warn!("No supported image files found in {}", dir.display());
        return Ok(0);
    }

    // Sort files alphanumerically for consistent processing order
    files.sort();
    info!("Found {} image file(s) to process", files.len());

    let span = spans::batch_processing(files.len());
    async {
        let progress = if files.len() > 1 {
            let pb = ProgressBar::new(files.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template(
                        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                    )?
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        let batch_start_time = Instant::now();
        let mut processed_count = 0;
        let mut failed_count = 0;

        for input_file in &files {
            if let Some(pb) = &progress {
                pb.set_message(format!("Processing {}", input_file.display()));
            }

            let output = OutputTarget::File(generate_output_path(input_file, output_dir.as_deref()));
            match process_file(processor, input_file, &output).await {
                Ok(()) => processed_count += 1,
                Err(e) => {
                    error!("❌ Failed to process {}: {e:#}", input_file.display());
                    failed_count += 1;
                },
            }

            if let Some(pb) = &progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_with_message(format!(
                "Completed! Processed: {processed_count}, Failed: {failed_count}"
            ));
        }

        if failed_count > 0 {
            warn!("Some files failed to process. Processed: {processed_count}, Failed: {failed_count}");
        }

        let batch_total_time = batch_start_time.elapsed();
        info!("📊 Batch processing summary:");
        info!("  ├─ Files processed: {}", processed_count);
        info!("  ├─ Files failed: {}", failed_count);
        info!("  └─ Total time: {:.2}s", batch_total_time.as_secs_f64());

        Ok::<_, anyhow::Error>(processed_count)
    }
    .instrument(span)
    .await
}

/// Write image data to stdout
fn write_stdout(data: &[u8]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    stdout
        .write_all(data)
        .context("Failed to write image data to stdout")?;
    stdout.flush().context("Failed to flush stdout")?;
    Ok(())
}

/// Find image files in a directory, skipping previously generated outputs
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_image_file(path) && !is_generated_output(path) && matches_pattern(path, pattern) {
            files.push(path.to_path_buf());
        }
    }

    Ok(files)
}

/// Check if file is an image based on extension
fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn is_generated_output(path: &Path) -> bool {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.ends_with(OUTPUT_SUFFIX))
}

/// Check if file matches the given pattern
fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}

/// `<stem>.out.png` in `output_dir`, or next to the input
fn generate_output_path(input_path: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input_path.file_stem().unwrap_or_default();
    let dir = output_dir
        .or_else(|| input_path.parent())
        .unwrap_or(Path::new("."));

    dir.join(format!("{}{OUTPUT_SUFFIX}.png", stem.to_string_lossy()))
}

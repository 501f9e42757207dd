//! Foreground cutout CLI binary

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bgcutout::cli::main().await
}

//! Annotate a directory of artwork images into a resumable CSV ledger.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use artwork_annotator::{
    BatchConfig, BatchRunner, Provider, ResponseFormat, RetryPolicy, VisionClient, VisionConfig,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "artwork-annotator", version, about)]
struct Cli {
    /// Directory containing the images
    #[arg(long, env = "ANNOTATOR_IMAGE_DIR", default_value = "kapok_tree_images")]
    image_dir: PathBuf,

    /// CSV ledger to append to
    #[arg(short, long, env = "ANNOTATOR_OUTPUT", default_value = "artwork_descriptions_claude.csv")]
    output: PathBuf,

    /// Vision API: claude or gemini
    #[arg(long, env = "ANNOTATOR_PROVIDER", default_value = "claude")]
    provider: Provider,

    /// Model name (defaults per provider)
    #[arg(long, env = "ANNOTATOR_MODEL")]
    model: Option<String>,

    #[arg(long, default_value_t = 1024)]
    max_tokens: u32,

    #[arg(long, default_value_t = 0.0)]
    temperature: f32,

    /// Seconds to wait after each API call
    #[arg(long, env = "ANNOTATOR_DELAY", default_value_t = 1.0)]
    delay: f64,

    /// Attempts per image before recording a failure
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Reply format to request: json or sections
    #[arg(long, default_value = "json")]
    format: ResponseFormat,

    /// Remove failed rows from the ledger and analyze those images again
    #[arg(long)]
    retry_failed: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "artwork_annotator=debug"
    } else {
        "artwork_annotator=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut vision = VisionConfig::for_provider(cli.provider)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .response_format(cli.format)
        .with_env_overrides();
    if let Some(model) = cli.model {
        vision = vision.model(model);
    }
    if vision.api_key.is_none() {
        anyhow::bail!(
            "No API key found; set {}",
            cli.provider.api_key_vars().join(" or ")
        );
    }

    let delay = Duration::try_from_secs_f64(cli.delay)
        .with_context(|| format!("invalid --delay {}", cli.delay))?;

    let batch = BatchConfig::new(&cli.image_dir, &cli.output)
        .with_request_delay(delay)
        .with_retry(RetryPolicy::default().with_max_attempts(cli.max_retries))
        .with_retry_failed(cli.retry_failed)
        .with_progress(!cli.no_progress);

    tracing::info!(model = %vision.model, "Annotating {}", cli.image_dir.display());

    let client = VisionClient::new(vision);
    let summary = BatchRunner::new(batch)
        .run(&client)
        .await
        .context("batch run failed")?;

    println!(
        "Done: {} analyzed, {} failed, {} skipped. Results in {}",
        summary.succeeded(),
        summary.failed,
        summary.already_done,
        cli.output.display()
    );
    Ok(())
}

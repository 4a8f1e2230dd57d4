//! Video enhancement worker binary.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::filter::{Directive, LevelFilter};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lumen_ai::{AiServices, GeminiClient};
use lumen_models::{EnhanceConfig, RunId};
use lumen_worker::config::enhance_config_from_env;
use lumen_worker::{Pipeline, WorkerConfig};

#[derive(Parser)]
#[command(name = "lumen-worker", about = "Enhance short videos frame group by frame group")]
#[command(version)]
struct Cli {
    /// Input video
    input: PathBuf,

    /// Output video [default: <input>_enhanced.mp4]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Where to write the JSON run report [default: output with .json]
    #[arg(long)]
    report: Option<PathBuf>,

    /// JSON file with enhancement settings; LUMEN_* variables override it
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        eprintln!("rustls crypto provider already installed");
    }

    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("Enhancement failed: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    // Colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    let env_filter = ["lumen_worker=info", "lumen_media=info", "lumen_ai=info"]
        .into_iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(env_filter, |filter, directive| filter.add_directive(directive));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = WorkerConfig::from_env();
    if let Some(path) = &cli.config {
        let raw = tokio::fs::read_to_string(path).await?;
        let from_file: EnhanceConfig = serde_json::from_str(&raw)?;
        config.enhance = enhance_config_from_env(from_file);
    }
    info!("Worker config: {:?}", config);

    let output = cli.output.unwrap_or_else(|| default_output(&cli.input));
    let report_path = cli.report.unwrap_or_else(|| output.with_extension("json"));

    let client = GeminiClient::from_env()?;
    let services = AiServices::from_provider(Arc::new(client));

    // Ctrl-C aborts any running FFmpeg process
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received shutdown signal, cancelling");
            cancel_tx.send(true).ok();
        }
    });

    let pipeline = Pipeline::new(config, services).with_cancel(cancel_rx);
    let report = pipeline.run(RunId::new(), &cli.input, &output).await?;

    tokio::fs::write(&report_path, serde_json::to_vec_pretty(&report)?).await?;
    info!(
        output = %output.display(),
        report = %report_path.display(),
        degraded = report.is_degraded(),
        "Enhancement finished"
    );
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    input.with_file_name(format!(
        "{}_enhanced.{}",
        stem,
        lumen_models::encoding::OUTPUT_CONTAINER_EXT
    ))
}
